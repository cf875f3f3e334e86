pub mod core;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
pub use commands::plugin;

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gameshelf_lib=debug")),
        )
        .try_init();
}
