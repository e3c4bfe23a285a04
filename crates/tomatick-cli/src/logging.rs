use tomatick_core::Config;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins; otherwise the `[logging] filter` from the config file is
/// used. A missing config file is not created here.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let configured = match Config::load_existing() {
            Ok(Some(config)) => config.logging.filter,
            _ => "warn".into(),
        };
        EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
