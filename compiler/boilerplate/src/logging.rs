use std::sync::Once;

use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber.
///
/// Uses `RUST_LOG` when set, else `filter`. Without either, nothing is
/// installed and a later call may still install one. Only the first call
/// that has directives takes effect; returns whether this call installed
/// the subscriber.
///
/// Enable engine output with `RUST_LOG=bp_dispatch=debug,bp_cache=debug`.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let Some(filter) = env_filter(std::env::var("RUST_LOG").ok(), filter) else {
        return false;
    };
    let mut installed = false;
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*};

        // Another subscriber may already be installed by the host.
        installed = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .try_init()
            .is_ok();
    });
    installed
}

/// Filter from `RUST_LOG` (`env`) or configured directives, `RUST_LOG`
/// first. Unparsable directives fall back to `warn`.
fn env_filter(env: Option<String>, filter: Option<&str>) -> Option<EnvFilter> {
    let directives = env.as_deref().or(filter)?;
    Some(EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("warn")))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
