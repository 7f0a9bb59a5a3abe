use std::fmt::Display;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_LEVEL_ENV_VAR: &str = "PANGEA_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Level from `PANGEA_LOG_LEVEL`, `warn` when unset or unrecognised.
/// `--debug` always wins.
pub fn level(debug: bool) -> LogLevel {
    if debug {
        return LogLevel::Debug;
    }
    std::env::var(LOG_LEVEL_ENV_VAR)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LogLevel::Warning)
}

/// Default filter directive; the AWS SDK stays at warn unless asked for.
pub fn directive(level: LogLevel) -> String {
    format!("pangea={},aws_config=warn,aws_smithy_runtime=warn,hyper=warn", level)
}

/// Install the global subscriber. `RUST_LOG` overrides the computed filter.
/// Output goes to stderr so `--json` output on stdout stays parseable.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(level(debug))));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(debug),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_debug_flag_wins() {
        assert_eq!(level(true), LogLevel::Debug);
    }

    #[test]
    fn test_directive() {
        assert!(directive(LogLevel::Info).starts_with("pangea=info"));
        assert!(directive(LogLevel::Warning).starts_with("pangea=warn"));
    }
}
