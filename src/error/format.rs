use crate::error::{ErrorContext, LockError};

/// Renders the error together with its details and suggestion, one section per paragraph.
pub fn format_error_chain(error: &LockError) -> String {
    let context = ErrorContext::new(error);
    context.to_string()
}

/// Single-line rendering used for log records.
pub fn format_error_line(error: &LockError) -> String {
    let context = ErrorContext::new(error);
    match &context.details {
        Some(details) => format!("{error} ({})", details.replace('\n', " ")),
        None => error.to_string(),
    }
}
