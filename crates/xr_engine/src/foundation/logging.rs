//! Logging utilities and the programmer-contract layer
//!
//! Diagnostics go through the `log` facade. Contract violations (misuse of an
//! API by the calling code, as opposed to expected absence or unready assets)
//! are reported with [`dfatal!`](crate::dfatal): the message is always logged
//! at `error` level and, when fatal contracts are enabled, the call panics.
//!
//! Fatal contracts default to on in debug builds and off in release builds,
//! so the violating call degrades to a logged no-op in release.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

pub use log::{debug, error, info, trace, warn};

static FATAL_CONTRACTS: AtomicBool = AtomicBool::new(cfg!(debug_assertions));

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    // A logger may already be installed by the host application.
    let _ = env_logger::try_init();
}

/// Initialize the logging system with an explicit default level
pub fn init_with_level(level: log::LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

/// Enable or disable panicking on contract violations
pub fn set_fatal_contracts(enabled: bool) {
    FATAL_CONTRACTS.store(enabled, Ordering::Relaxed);
}

/// Whether contract violations currently panic
pub fn fatal_contracts() -> bool {
    FATAL_CONTRACTS.load(Ordering::Relaxed)
}

#[doc(hidden)]
pub fn contract_violation(args: fmt::Arguments<'_>) {
    log::error!("{args}");
    if fatal_contracts() {
        panic!("{args}");
    }
}

/// Report a programmer-contract violation.
///
/// Logs at `error` level, then panics if fatal contracts are enabled. Callers
/// must leave their state untouched after invoking this so the release
/// behaviour is a clean no-op.
#[macro_export]
macro_rules! dfatal {
    ($($arg:tt)+) => {
        $crate::foundation::logging::contract_violation(format_args!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init_with_level(log::LevelFilter::Debug);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "bad call 7"))]
    fn test_contract_violation_follows_build_profile() {
        crate::dfatal!("bad call {}", 7);
    }
}
