use tracing_subscriber::EnvFilter;

/// Install the global subscriber. The fmt layer also picks up `log`
/// records from velt-script, so everything lands in one place.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
