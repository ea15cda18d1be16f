use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging for a host application embedding meshguard.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("meshguard=debug")
        } else {
            EnvFilter::new("meshguard=info")
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    info!("meshguard logging initialized");
    Ok(())
}

/// Initialize logging, falling back to stderr if a subscriber is already
/// installed (e.g. when meshguard is embedded in a host that configures its
/// own tracing subscriber).
pub fn init_logging_safe() {
    if let Err(e) = init_logging() {
        eprintln!(
            "warning: failed to install meshguard tracing subscriber: {}",
            e
        );
    }
}
