//! Engine configuration
//!
//! Every setting can come from the command line or the environment. A `.env`
//! file is honoured when present.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::ids::SessionId;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Coupon service connection settings.
#[derive(Debug, Clone, Args)]
pub struct RemoteConfig {
    /// Base URL of the coupon service, e.g. `http://localhost:8069`.
    #[arg(long = "coupon-service-url", env = "COUPON_SERVICE_URL")]
    pub url: String,

    /// Request timeout in seconds.
    #[arg(
        long = "coupon-service-timeout-seconds",
        env = "COUPON_SERVICE_TIMEOUT_SECONDS",
        default_value_t = 10u64
    )]
    pub timeout_seconds: u64,

    /// Session cookie sent with every request.
    #[arg(
        long = "coupon-service-session-cookie",
        env = "COUPON_SERVICE_SESSION_COOKIE"
    )]
    pub session_cookie: Option<String>,
}

/// Point of sale rewards engine configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "pos-rewards", about = "Point of sale promotions & coupons", long_about = None)]
pub struct EngineConfig {
    /// Apply coupon and promotion programs.
    #[arg(
        long,
        env = "POS_USE_COUPON_PROGRAMS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub use_coupon_programs: bool,

    /// Point of sale session id.
    #[arg(long, env = "POS_SESSION_ID")]
    pub session_id: u64,

    /// YAML program catalog loaded when the session opens.
    #[arg(long, env = "POS_CATALOG_PATH")]
    pub catalog_path: Option<PathBuf>,

    /// Coupon service settings.
    #[command(flatten)]
    pub remote: RemoteConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

/// Runtime settings consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Terminal session passed along with scanned codes
    pub session: SessionId,

    /// Whether programs are applied at all
    pub use_coupon_programs: bool,
}

impl EngineSettings {
    /// Settings for an enabled engine on `session`.
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            use_coupon_programs: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Runtime settings derived from this configuration.
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            session: SessionId::new(self.session_id),
            use_coupon_programs: self.use_coupon_programs,
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_arguments() -> TestResult {
        let config = EngineConfig::try_parse_from([
            "pos-rewards",
            "--session-id",
            "12",
            "--coupon-service-url",
            "http://localhost:8069",
            "--use-coupon-programs",
            "false",
            "--log-format",
            "json",
        ])?;

        assert_eq!(config.session_id, 12);
        assert_eq!(config.remote.url, "http://localhost:8069");
        assert_eq!(config.remote.timeout_seconds, 10);
        assert_eq!(config.logging.log_format, LogFormat::Json);
        assert_eq!(
            config.settings(),
            EngineSettings {
                session: SessionId::new(12),
                use_coupon_programs: false,
            }
        );

        Ok(())
    }

    #[test]
    fn missing_service_url_is_an_error() {
        let result = EngineConfig::try_parse_from(["pos-rewards", "--session-id", "1"]);

        assert!(result.is_err());
    }
}
