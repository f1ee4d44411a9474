use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` value onto a `tracing` filter directive.
///
/// Unknown values are passed through so `RUST_LOG`-style directives such as
/// `"energy_data=debug"` keep working.
pub fn normalise_log_level(log_level: &str) -> String {
    let upper = log_level.to_uppercase();
    match upper.as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised. Output goes
/// to stderr so stdout carries only the JSON response.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let directive = normalise_log_level(log_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_log_level_named_levels() {
        assert_eq!(normalise_log_level("DEBUG"), "debug");
        assert_eq!(normalise_log_level("info"), "info");
        assert_eq!(normalise_log_level("WARNING"), "warn");
        assert_eq!(normalise_log_level("ERROR"), "error");
        assert_eq!(normalise_log_level("critical"), "error");
    }

    #[test]
    fn test_critical_is_quieter_than_debug() {
        use tracing_subscriber::filter::LevelFilter;
        let critical = EnvFilter::new(normalise_log_level("CRITICAL"));
        assert_eq!(critical.max_level_hint(), Some(LevelFilter::ERROR));
        let debug = EnvFilter::new(normalise_log_level("DEBUG"));
        assert_eq!(debug.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_normalise_log_level_passthrough() {
        assert_eq!(normalise_log_level("energy_data=trace"), "energy_data=trace");
    }

    #[test]
    fn test_setup_logging_twice_is_an_error_not_a_panic() {
        // The first call may race with other tests; the second must not panic.
        let _ = setup_logging("INFO");
        assert!(setup_logging("INFO").is_err());
    }
}
