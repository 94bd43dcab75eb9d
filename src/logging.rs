use tracing_subscriber::EnvFilter;

/// Initialize structured logging on stderr, keeping stdout for result lines.
///
/// `RUST_LOG` wins over `log_level` when it is set.
pub fn init(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
