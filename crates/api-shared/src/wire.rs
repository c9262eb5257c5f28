//! JSON request and response bodies shared by the REST API and the CLI.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use spmr_core::{
    Alert, Analysis, Classification, TriageOutcome, TriageSubmission, VitalReading, VitalSigns,
};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body, also used for 401/403 responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub msg: String,
}

impl ErrorRes {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Body of `POST /vitals`.
///
/// `vitals` is captured as the submitted JSON text so it can be stored byte for byte.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SaveVitalsReq {
    /// Patient identifier, as an integer or a string.
    #[schema(value_type = String, example = "17")]
    #[serde(default)]
    pub patient_id: Option<Value>,
    /// Object with any of `hr`, `spo2`, `temp`, `rr`.
    #[schema(value_type = Object)]
    #[serde(default)]
    pub vitals: Option<Box<RawValue>>,
    /// ISO 8601 timestamp. Submission time is used when it is absent, not a string, or
    /// unparseable.
    #[schema(value_type = Option<String>)]
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl SaveVitalsReq {
    /// Normalises the patient id to a string; numbers are accepted as their decimal form.
    pub fn patient_id_text(&self) -> Option<String> {
        match self.patient_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The timestamp when it was sent as a string; any other JSON type is ignored.
    pub fn timestamp_text(&self) -> Option<String> {
        match self.timestamp.as_ref()? {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl From<SaveVitalsReq> for TriageSubmission {
    fn from(req: SaveVitalsReq) -> Self {
        TriageSubmission {
            patient_id: req.patient_id_text(),
            timestamp: req.timestamp_text(),
            vitals: req.vitals.map(|raw| raw.get().to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VitalsDto {
    pub hr: Option<f64>,
    pub spo2: Option<f64>,
    pub temp: Option<f64>,
    pub rr: Option<f64>,
}

impl From<VitalSigns> for VitalsDto {
    fn from(v: VitalSigns) -> Self {
        Self {
            hr: v.hr,
            spo2: v.spo2,
            temp: v.temp,
            rr: v.rr,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRes {
    pub label: String,
    pub score: f64,
    pub reason: String,
    pub timestamp: String,
    pub reading_id: String,
    pub alert_triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SaveVitalsRes {
    pub status: String,
    pub analysis: AnalysisRes,
}

impl From<&TriageOutcome> for SaveVitalsRes {
    fn from(outcome: &TriageOutcome) -> Self {
        Self {
            status: "ok".into(),
            analysis: AnalysisRes {
                label: outcome.classification.label.to_string(),
                score: outcome.classification.score,
                reason: outcome.classification.reason.clone(),
                timestamp: outcome.reading.timestamp.to_rfc3339(),
                reading_id: outcome.reading.id.to_string(),
                alert_triggered: outcome.dispatch.triggered(),
                alert_message: outcome.dispatch.alert_message().map(str::to_string),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClassificationDto {
    pub label: String,
    pub score: f64,
    pub reason: String,
}

impl From<&Classification> for ClassificationDto {
    fn from(c: &Classification) -> Self {
        Self {
            label: c.label.to_string(),
            score: c.score,
            reason: c.reason.clone(),
        }
    }
}

/// Response of `GET /patients/{id}/analysis`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LatestAnalysisRes {
    pub patient_id: String,
    pub timestamp: String,
    pub vitals: VitalsDto,
    pub analysis: ClassificationDto,
}

impl From<&Analysis> for LatestAnalysisRes {
    fn from(a: &Analysis) -> Self {
        Self {
            patient_id: a.reading.patient_id.to_string(),
            timestamp: a.reading.timestamp.to_rfc3339(),
            vitals: a.reading.vitals.into(),
            analysis: (&a.classification).into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReadingRes {
    pub id: String,
    pub patient_id: String,
    pub timestamp: String,
    pub vitals: VitalsDto,
    pub raw: String,
}

impl From<&VitalReading> for ReadingRes {
    fn from(r: &VitalReading) -> Self {
        Self {
            id: r.id.to_string(),
            patient_id: r.patient_id.to_string(),
            timestamp: r.timestamp.to_rfc3339(),
            vitals: r.vitals.into(),
            raw: r.raw.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListReadingsRes {
    pub readings: Vec<ReadingRes>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AlertRes {
    pub id: String,
    pub patient_id: String,
    pub timestamp: String,
    pub severity: String,
    pub message: String,
    pub sent_sms: bool,
    pub sent_email: bool,
}

impl From<&Alert> for AlertRes {
    fn from(a: &Alert) -> Self {
        Self {
            id: a.id.to_string(),
            patient_id: a.patient_id.to_string(),
            timestamp: a.timestamp.to_rfc3339(),
            severity: a.severity.to_string(),
            message: a.message.clone(),
            sent_sms: a.sent_sms,
            sent_email: a.sent_email,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListAlertsRes {
    pub alerts: Vec<AlertRes>,
}
