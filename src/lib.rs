pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::launch::Identity;
pub use crate::core::pipeline::{resolve_and_launch, LaunchOptions};

/// Initialize structured logging. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,morpheus_launcher_lib=debug")),
        )
        .init();
}
