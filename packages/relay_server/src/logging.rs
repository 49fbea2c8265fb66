//! Log initialization for the relay binary.

#[cfg(debug_assertions)]
const DEFAULT_LOG_LEVEL: &str = "relay=trace,relay_server=trace";
#[cfg(not(debug_assertions))]
const DEFAULT_LOG_LEVEL: &str = "relay=info,relay_server=info";

/// Filter directives from `RELAY_LOG`, then `RUST_LOG`, then the build default.
#[must_use]
pub fn log_filter(var: impl Fn(&str) -> Option<String>) -> String {
    var("RELAY_LOG")
        .or_else(|| var("RUST_LOG"))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// # Errors
///
/// * If a global logger has already been installed
pub fn init() -> Result<(), log::SetLoggerError> {
    let filter = log_filter(|name| std::env::var(name).ok());

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filter)
        .try_init()
}
