//! Alert records.

use crate::classifier::Severity;
use crate::notify::ChannelKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spmr_types::PatientId;
use uuid::Uuid;

/// An alert that has been composed but not yet stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAlert {
    pub patient_id: PatientId,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// A persisted alert with its per-channel delivery flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub patient_id: PatientId,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub sent_sms: bool,
    #[serde(default)]
    pub sent_email: bool,
}

impl Alert {
    pub fn from_new(id: Uuid, alert: NewAlert) -> Self {
        Self {
            id,
            patient_id: alert.patient_id,
            timestamp: alert.timestamp,
            severity: alert.severity,
            message: alert.message,
            sent_sms: false,
            sent_email: false,
        }
    }

    pub fn set_outcome(&mut self, channel: ChannelKind, success: bool) {
        match channel {
            ChannelKind::Sms => self.sent_sms = success,
            ChannelKind::Email => self.sent_email = success,
        }
    }
}
