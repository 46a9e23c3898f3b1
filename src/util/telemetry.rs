//! Tracing bootstrap for loop diagnostics.

/// Installs a default env-filtered `tracing` subscriber when the embedding
/// process has not configured one, so loop lifecycle events (worker
/// start/stop, captured callback failures, shutdown progress) are visible
/// out of the box. A subscriber already set by the host wins; this helper
/// then does nothing.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
