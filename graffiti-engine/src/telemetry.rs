//! Process-wide `tracing` subscriber setup for binaries embedding this
//! client core. Every crate here emits spans and events through `tracing`
//! alone; wiring them to an actual sink is a one-time process-startup
//! concern that belongs at the top of the dependency graph, not in any
//! individual crate.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Installs the global `tracing` subscriber: `RUST_LOG`-driven filtering
/// (defaulting to `info`) over an `stderr` fmt layer. Call once, near the
/// start of `main`.
pub fn init_tracing() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
