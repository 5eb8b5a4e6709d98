// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::LockError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a LockError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a LockError) -> Self {
        let (suggestion, details) = match error {
            LockError::AccessDenied { resource, reason } => {
                let suggestion = Some(
                    "Call check_permission before opening a stream and request a mode that \
                     allows the operation (EXCLUSIVE, or UPGRADE_WRITE_ONCE for a single write)."
                        .to_string(),
                );
                let details = Some(format!("Resource {resource}: {reason}"));
                (suggestion, details)
            }
            LockError::ProtocolViolation { resource, .. } => {
                let suggestion = Some(format!(
                    "Read '{resource}' again through check_permission(.., false) after the \
                     upgrade is granted, then request write permission."
                ));
                let details = None;
                (suggestion, details)
            }
            LockError::OpenStreams { resources, .. } => {
                let suggestion = Some(
                    "Close every guarded stream returned by report_grant before closing the \
                     granted access."
                        .to_string(),
                );
                let details = Some(format!(
                    "Open streams on:\n{}",
                    resources
                        .iter()
                        .map(|r| format!("  - {r}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                ));
                (suggestion, details)
            }
            LockError::Snapshot { details, .. } => {
                let suggestion = Some(
                    "Check that the snapshot directory exists, is writable, and has enough free \
                     space."
                        .to_string(),
                );
                let details = Some(details.clone());
                (suggestion, details)
            }
            LockError::ConfigError(msg) => {
                let suggestion = Some(
                    "Check lockwarden.toml and the LOCKWARDEN_* environment variables."
                        .to_string(),
                );
                let details = Some(format!("Configuration issue: {msg}"));
                (suggestion, details)
            }
            LockError::Io(_) => (None, None),
        };

        Self {
            error,
            suggestion,
            details,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
