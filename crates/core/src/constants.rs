//! Constants used throughout the SPMR core crate.
//!
//! This module contains storage layout names, defaults and clinical rule constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for triage data storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "spmr_data";

/// Directory name holding one subdirectory per patient.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Per-patient directory name for stored vital readings.
pub const VITALS_DIR_NAME: &str = "vitals";

/// Per-patient directory name for stored alerts.
pub const ALERTS_DIR_NAME: &str = "alerts";

/// Timeout applied to outbound classifier and notification calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

/// Default SMTP submission port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Base URL of the Twilio REST API.
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

// Rule engine outputs, in priority order.

pub const LOW_SPO2_SCORE: f64 = 0.99;
pub const LOW_SPO2_REASON: &str = "Low SpO2";

pub const HIGH_FEVER_SCORE: f64 = 0.95;
pub const HIGH_FEVER_REASON: &str = "High fever";

pub const VERY_HIGH_HR_SCORE: f64 = 0.90;
pub const VERY_HIGH_HR_REASON: &str = "Very high HR";

pub const WARNING_SCORE: f64 = 0.80;
pub const WARNING_REASON: &str = "Low SpO2 or high HR";

pub const NORMAL_SCORE: f64 = 0.20;
pub const NORMAL_REASON: &str = "Within thresholds";
