//! Tracing subscriber setup
//!
//! rowstream logs through `tracing` under these targets:
//!
//! | Target | Events |
//! |--------|--------|
//! | `rowstream::stream` | registration, stream start / finish / failure |
//! | `rowstream::fetch` | paging plan, per-batch fetches |
//! | `rowstream::mutation` | chunk inserts, per-window key reads and mutations |
//! | `rowstream::txn` | transaction open / commit / rollback |
//!
//! The helpers below install a `tracing-subscriber` fmt layer and need the
//! `logging` feature; without it they do nothing.

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, EnvFilter};

/// Install a subscriber logging rowstream at `info`
///
/// `RUST_LOG` takes precedence when set.
#[cfg(feature = "logging")]
pub fn init() -> bool {
    init_with_level("info")
}

/// Install a subscriber logging rowstream at `level`
///
/// Returns false if a global subscriber was already installed.
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rowstream={}", level)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .is_ok()
}

/// Install a debug-level subscriber that writes through the test harness
#[cfg(feature = "logging")]
pub fn init_test() -> bool {
    fmt()
        .with_env_filter(EnvFilter::new("rowstream=debug"))
        .with_test_writer()
        .try_init()
        .is_ok()
}

// Stubs when the logging feature is disabled
#[cfg(not(feature = "logging"))]
#[allow(missing_docs)]
pub fn init() -> bool {
    false
}

#[cfg(not(feature = "logging"))]
#[allow(missing_docs)]
pub fn init_with_level(_level: &str) -> bool {
    false
}

#[cfg(not(feature = "logging"))]
#[allow(missing_docs)]
pub fn init_test() -> bool {
    false
}
