//! Opt-in `tracing` output for binaries and tests.
//!
//! The crate reports skipped batch records and duplicate certificate
//! extensions at `warn`, and derived identifiers at `debug`. Nothing is
//! printed until a subscriber is installed, either by the application or by
//! one of the functions here.
//!
//! ```rust,no_run
//! onion_desc::logging::init();
//! // RUST_LOG=onion_desc=debug shows each derived descriptor id
//! ```

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "onion_desc=info";

/// Installs a subscriber filtered by `RUST_LOG`, or [`DEFAULT_FILTER`].
///
/// Returns `false` if a global subscriber was already set, in which case
/// that one stays in place.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

/// Installs a subscriber showing this crate's events at `level` and above.
pub fn init_with_level(level: Level) -> bool {
    install(EnvFilter::new(directive(level)))
}

fn directive(level: Level) -> String {
    format!("onion_desc={}", level.as_str().to_ascii_lowercase())
}

fn install(filter: EnvFilter) -> bool {
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
