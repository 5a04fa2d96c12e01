//! Opt-in log output for binaries and tests that embed the queue.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a formatting subscriber filtered by `RUST_LOG` (default
/// `toolqueue=info`).
///
/// Returns `false` if a global subscriber was already installed, in which
/// case that one keeps receiving the queue's events.
pub fn init_logging() -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolqueue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
