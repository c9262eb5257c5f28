//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Nothing in the request path reads environment variables.
//!
//! [`TriageConfig::from_lookup`] takes a key lookup function rather than reading the process
//! environment directly, so binaries pass `|k| std::env::var(k).ok()` and tests pass a map.

use crate::classifier::{Severity, Thresholds};
use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_SMTP_PORT, TWILIO_API_BASE,
};
use crate::error::{TriageError, TriageResult};
use crate::notify::{SmtpSettings, TwilioSettings};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct TriageConfig {
    data_dir: PathBuf,
    thresholds: Thresholds,
    alert_min_severity: Severity,
    http_timeout: Duration,
    ml_service_url: Option<String>,
    sms: Option<TwilioSettings>,
    email: Option<SmtpSettings>,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> TriageResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| TriageError::Config(format!("{key}={raw:?}: {e}"))),
        None => Ok(None),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn thresholds_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> TriageResult<Thresholds> {
    let mut t = Thresholds::default();
    let overrides: [(&str, &mut f64); 5] = [
        ("SPMR_SPO2_EMERGENCY_BELOW", &mut t.spo2_emergency_below),
        ("SPMR_TEMP_EMERGENCY_ABOVE", &mut t.temp_emergency_above),
        ("SPMR_HR_EMERGENCY_ABOVE", &mut t.hr_emergency_above),
        ("SPMR_SPO2_WARNING_BELOW", &mut t.spo2_warning_below),
        ("SPMR_HR_WARNING_ABOVE", &mut t.hr_warning_above),
    ];
    for (key, slot) in overrides {
        if let Some(value) = parse_var::<f64>(lookup, key)? {
            if !value.is_finite() {
                return Err(TriageError::Config(format!("{key} must be a finite number")));
            }
            *slot = value;
        }
    }
    Ok(t)
}

fn sms_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Option<TwilioSettings> {
    let to_number = non_empty(lookup, "TARGET_PHONE")?;
    let credentials = (
        non_empty(lookup, "TWILIO_ACCOUNT_SID"),
        non_empty(lookup, "TWILIO_AUTH_TOKEN"),
        non_empty(lookup, "TWILIO_FROM_NUMBER"),
    );
    match credentials {
        (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioSettings {
            account_sid,
            auth_token,
            from_number,
            to_number,
            api_base: non_empty(lookup, "TWILIO_API_BASE")
                .unwrap_or_else(|| TWILIO_API_BASE.into()),
        }),
        _ => {
            tracing::warn!(
                "TARGET_PHONE is set but Twilio credentials are incomplete; SMS disabled"
            );
            None
        }
    }
}

fn email_from_lookup(
    lookup: &impl Fn(&str) -> Option<String>,
) -> TriageResult<Option<SmtpSettings>> {
    let Some(to_address) = non_empty(lookup, "ALERT_EMAIL_TO") else {
        return Ok(None);
    };
    let port = parse_var::<u16>(lookup, "SMTP_PORT")?.unwrap_or(DEFAULT_SMTP_PORT);
    let credentials = (
        non_empty(lookup, "SMTP_HOST"),
        non_empty(lookup, "SMTP_USER"),
        non_empty(lookup, "SMTP_PASS"),
    );
    match credentials {
        (Some(host), Some(username), Some(password)) => Ok(Some(SmtpSettings {
            host,
            port,
            username,
            password,
            to_address,
        })),
        _ => {
            tracing::warn!(
                "ALERT_EMAIL_TO is set but SMTP settings are incomplete; email disabled"
            );
            Ok(None)
        }
    }
}

impl TriageConfig {
    /// Resolve configuration from a key lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns `TriageError::Config` if any override is present but unparseable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TriageResult<Self> {
        let data_dir = non_empty(&lookup, "SPMR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let alert_min_severity = parse_var::<Severity>(&lookup, "SPMR_ALERT_MIN_SEVERITY")?
            .unwrap_or(Severity::Emergency);
        let timeout_secs = parse_var::<u64>(&lookup, "SPMR_HTTP_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(TriageError::Config(
                "SPMR_HTTP_TIMEOUT_SECS must be at least 1".into(),
            ));
        }

        Ok(Self {
            data_dir,
            thresholds: thresholds_from_lookup(&lookup)?,
            alert_min_severity,
            http_timeout: Duration::from_secs(timeout_secs),
            ml_service_url: non_empty(&lookup, "ML_SERVICE_URL"),
            sms: sms_from_lookup(&lookup),
            email: email_from_lookup(&lookup)?,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn alert_min_severity(&self) -> Severity {
        self.alert_min_severity
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn ml_service_url(&self) -> Option<&str> {
        self.ml_service_url.as_deref()
    }

    pub fn sms(&self) -> Option<&TwilioSettings> {
        self.sms.as_ref()
    }

    pub fn email(&self) -> Option<&SmtpSettings> {
        self.email.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = TriageConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(cfg.data_dir(), Path::new("spmr_data"));
        assert_eq!(cfg.thresholds(), &Thresholds::default());
        assert_eq!(cfg.alert_min_severity(), Severity::Emergency);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(5));
        assert!(cfg.ml_service_url().is_none());
        assert!(cfg.sms().is_none());
        assert!(cfg.email().is_none());
    }

    #[test]
    fn threshold_overrides_are_applied() {
        let cfg = TriageConfig::from_lookup(lookup(&[
            ("SPMR_HR_EMERGENCY_ABOVE", "130"),
            ("SPMR_SPO2_WARNING_BELOW", " 93.5 "),
        ]))
        .unwrap();

        assert_eq!(cfg.thresholds().hr_emergency_above, 130.0);
        assert_eq!(cfg.thresholds().spo2_warning_below, 93.5);
        assert_eq!(cfg.thresholds().spo2_emergency_below, 90.0);
    }

    #[test]
    fn unparseable_override_is_a_config_error() {
        let err = TriageConfig::from_lookup(lookup(&[("SPMR_TEMP_EMERGENCY_ABOVE", "hot")]))
            .unwrap_err();
        assert!(
            matches!(err, TriageError::Config(msg) if msg.contains("SPMR_TEMP_EMERGENCY_ABOVE"))
        );

        let err =
            TriageConfig::from_lookup(lookup(&[("SPMR_ALERT_MIN_SEVERITY", "Alert")])).unwrap_err();
        assert!(matches!(err, TriageError::Config(_)));

        let err =
            TriageConfig::from_lookup(lookup(&[("SPMR_HTTP_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(matches!(err, TriageError::Config(_)));
    }

    #[test]
    fn sms_requires_destination_and_credentials() {
        let partial = TriageConfig::from_lookup(lookup(&[
            ("TARGET_PHONE", "+15551234567"),
            ("TWILIO_ACCOUNT_SID", "AC1"),
        ]))
        .unwrap();
        assert!(partial.sms().is_none());

        let full = TriageConfig::from_lookup(lookup(&[
            ("TARGET_PHONE", "+15551234567"),
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_FROM_NUMBER", "+15550000000"),
        ]))
        .unwrap();
        let sms = full.sms().expect("sms should be configured");
        assert_eq!(sms.to_number, "+15551234567");
        assert_eq!(sms.api_base, "https://api.twilio.com");
    }

    #[test]
    fn email_uses_default_port() {
        let cfg = TriageConfig::from_lookup(lookup(&[
            ("ALERT_EMAIL_TO", "oncall@example.com"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "alerts@example.com"),
            ("SMTP_PASS", "pw"),
        ]))
        .unwrap();
        let email = cfg.email().expect("email should be configured");
        assert_eq!(email.port, 587);
        assert_eq!(email.to_address, "oncall@example.com");
    }
}
