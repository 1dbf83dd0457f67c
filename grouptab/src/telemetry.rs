//! Tracing initialization: a fmt subscriber filtered by `RUST_LOG`.
//!
//! Without `RUST_LOG` the filter defaults to `info`, which includes one line per HTTP request
//! and the state transitions logged by the services (invitations, promotions, removals, expense
//! changes, group deletion). Denied authorization predicates are logged at `debug`.
//!
//! ```bash
//! RUST_LOG=grouptab=debug,tower_http=info grouptab -f config.yaml
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
