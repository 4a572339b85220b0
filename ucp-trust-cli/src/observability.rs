//! Logging setup and the key-store health report.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use std::io;

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log format configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for terminals.
    Pretty,
    /// One JSON object per line for log aggregation.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything other than `json` is [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }

    /// Resolves the format from `LOG_FORMAT`, falling back to the configured value.
    #[must_use]
    pub fn resolve(configured: &str) -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(value) if !value.is_empty() => Self::parse(&value),
            _ => Self::parse(configured),
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the level is `info`, or `debug`
/// with `verbose`.
pub fn init_observability(format: LogFormat, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(verbose)
                        .with_span_events(FmtSpan::NONE)
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            subscriber
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(io::stderr),
                )
                .init();
        }
    }
}

/// Overall health of a scope's signing identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Ready to sign and verify.
    Healthy,
    /// Usable, but something needs attention.
    Degraded,
    /// Cannot sign.
    Unhealthy,
}

impl HealthStatus {
    /// Returns string representation for JSON serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckStatus {
    /// Check passed.
    Pass,
    /// Check failed.
    Fail,
    /// Degraded but operational.
    Warn,
}

impl HealthCheckStatus {
    /// Returns string representation for JSON serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Warn => "warn",
        }
    }
}

/// Individual health check result.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Check name.
    pub name: String,
    /// Check status.
    pub status: HealthCheckStatus,
    /// Details.
    pub message: String,
}

impl HealthCheck {
    /// Creates a passing check.
    #[must_use]
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Pass, message: message.into() }
    }

    /// Creates a warning.
    #[must_use]
    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Warn, message: message.into() }
    }

    /// Creates a failing check.
    #[must_use]
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), status: HealthCheckStatus::Fail, message: message.into() }
    }
}

/// Health report printed by `ucp-trust doctor`.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// CLI version.
    pub version: String,
    /// Scope inspected.
    pub scope: String,
    /// Key store location.
    pub key_store: String,
    /// Individual checks.
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Builds a report, deriving the overall status from `checks`.
    #[must_use]
    pub fn new(scope: &str, key_store: &str, checks: Vec<HealthCheck>) -> Self {
        Self {
            status: Self::compute_status(&checks),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            scope: scope.to_owned(),
            key_store: key_store.to_owned(),
            checks,
        }
    }

    /// Serializes the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::json!({
            "status": self.status.as_str(),
            "version": self.version,
            "scope": self.scope,
            "key_store": self.key_store,
            "checks": self.checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status.as_str(),
                "message": c.message,
            })).collect::<Vec<_>>(),
        });

        serde_json::to_string_pretty(&json)
    }

    /// Any failure is unhealthy, any warning degraded.
    #[must_use]
    pub fn compute_status(checks: &[HealthCheck]) -> HealthStatus {
        if checks.iter().any(|c| c.status == HealthCheckStatus::Fail) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthCheckStatus::Warn) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
    }

    #[test]
    fn test_health_status_compute() {
        let pass = HealthCheck::pass("a", "ok");
        let warn = HealthCheck::warn("b", "hmm");
        let fail = HealthCheck::fail("c", "bad");

        assert_eq!(HealthReport::compute_status(&[]), HealthStatus::Healthy);
        assert_eq!(HealthReport::compute_status(&[pass.clone()]), HealthStatus::Healthy);
        assert_eq!(
            HealthReport::compute_status(&[pass.clone(), warn.clone()]),
            HealthStatus::Degraded
        );
        assert_eq!(HealthReport::compute_status(&[pass, warn, fail]), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_report_to_json() {
        let report = HealthReport::new(
            "store-1",
            "/tmp/keys.toml",
            vec![
                HealthCheck::pass("private_key", "P-256 key loaded"),
                HealthCheck::warn("key_id", "no key id stored"),
            ],
        );

        let json = report.to_json().expect("JSON serialization should succeed");
        assert!(json.contains("\"status\": \"degraded\""));
        assert!(json.contains("\"scope\": \"store-1\""));
        assert!(json.contains("\"key_store\": \"/tmp/keys.toml\""));
        assert!(json.contains("\"name\": \"private_key\""));
        assert!(json.contains("\"status\": \"warn\""));
        assert!(json.contains("\"message\": \"no key id stored\""));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(HealthStatus::Healthy.as_str(), "healthy");
        assert_eq!(HealthStatus::Degraded.as_str(), "degraded");
        assert_eq!(HealthStatus::Unhealthy.as_str(), "unhealthy");
        assert_eq!(HealthCheckStatus::Pass.as_str(), "pass");
        assert_eq!(HealthCheckStatus::Fail.as_str(), "fail");
        assert_eq!(HealthCheckStatus::Warn.as_str(), "warn");
    }
}
