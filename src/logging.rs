/// Initialize the logger with the specified verbosity level
///
/// # Arguments
/// * `verbose` - Verbosity level (0=warn, 1=info, 2=debug, 3+=trace)
///
/// `RUST_LOG` takes precedence over the verbosity-derived filter. Calling this
/// more than once is harmless; later calls leave the first logger in place.
pub fn setup_logger(verbose: u8) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(filter_for(verbose)),
    )
    .format_timestamp_millis()
    .format_target(false)
    .try_init();
}

fn filter_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "lockwarden=warn",
        1 => "lockwarden=info",
        2 => "lockwarden=debug",
        _ => "lockwarden=trace",
    }
}
