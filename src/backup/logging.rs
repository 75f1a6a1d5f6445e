use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber, writing to stderr so stdout only
/// ever carries the destination URL.
///
/// `RUST_LOG` wins when set, otherwise `debug` or `info`.
pub fn init(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
