//! Vital-sign readings.
//!
//! A reading is one timestamped measurement event for a patient. Any of the four vital fields
//! may be missing; a partial reading is still a valid reading.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spmr_types::PatientId;
use uuid::Uuid;

/// The four vital signs the classifier looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Heart rate, beats per minute.
    pub hr: Option<f64>,
    /// Oxygen saturation, percent.
    pub spo2: Option<f64>,
    /// Body temperature, degrees Celsius.
    pub temp: Option<f64>,
    /// Respiratory rate, breaths per minute.
    pub rr: Option<f64>,
}

impl VitalSigns {
    /// Extracts vital signs from a submitted JSON object.
    ///
    /// Numbers and numeric strings are accepted. Any other value, a non-finite number, or a
    /// missing key leaves that field absent.
    pub fn from_json(value: &Value) -> Self {
        let field = |key: &str| -> Option<f64> {
            let parsed = match value.get(key)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed.filter(|v| v.is_finite())
        };

        Self {
            hr: field("hr"),
            spo2: field("spo2"),
            temp: field("temp"),
            rr: field("rr"),
        }
    }
}

/// A reading that has been validated but not yet stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewReading {
    pub patient_id: PatientId,
    pub timestamp: DateTime<Utc>,
    pub vitals: VitalSigns,
    /// The submitted vitals payload, kept verbatim for audit.
    pub raw: String,
}

/// A persisted reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub vitals: VitalSigns,
    pub raw: String,
}

impl VitalReading {
    pub fn from_new(id: Uuid, reading: NewReading) -> Self {
        Self {
            id,
            patient_id: reading.patient_id,
            timestamp: reading.timestamp,
            vitals: reading.vitals,
            raw: reading.raw,
        }
    }
}

/// Resolves a submitted timestamp, falling back to `now` when it is absent or unparseable.
///
/// Accepts RFC 3339, ISO 8601 date-times without an offset (taken as UTC), and bare dates
/// (taken as midnight UTC).
pub fn resolve_timestamp(input: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return now;
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return naive.and_utc();
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return midnight.and_utc();
    }

    tracing::debug!("unparseable reading timestamp {:?}, using submission time", raw);
    now
}
