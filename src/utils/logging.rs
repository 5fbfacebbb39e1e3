use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Filter directive for this crate at the configured level.
/// `RUST_LOG`, when set, takes precedence.
pub fn filter_directive(level: Level) -> String {
    format!(
        "manga_pipeline={},reqwest=warn",
        match level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        }
    )
}

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_tracing(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_per_level() {
        assert_eq!(filter_directive(Level::DEBUG), "manga_pipeline=debug,reqwest=warn");
        assert!(filter_directive(Level::WARN).starts_with("manga_pipeline=warn"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing(Level::INFO);
        init_tracing(Level::DEBUG);
    }
}
