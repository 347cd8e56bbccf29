use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=quarry_lower=debug`
/// (pass summaries) or `RUST_LOG=quarry_lower=trace` (per-clause detail).
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            let tree = tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true);
            // Another subscriber may already be installed by the host.
            let _ = tracing_subscriber::registry()
                .with(tree)
                .with(filter)
                .try_init();
        }
    });
}
