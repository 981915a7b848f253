//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence; `default_level` (e.g. `"info"`) applies when it
/// is unset. Calling this more than once is harmless.
pub fn init(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// Initialize logging for unit tests, capturing output per test
#[cfg(test)]
pub(crate) fn init_test() {
    let _ = env_logger::builder().is_test(true).try_init();
}
