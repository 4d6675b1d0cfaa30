use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "lovefinder_core=debug,lovefinder_store=info,warn";

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the default filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    if installed.is_ok() {
        tracing::info!("Starting Lovefinder client core");
    }
}
