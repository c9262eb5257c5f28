//! Alert dispatch.
//!
//! For a classification at or above the alerting threshold the dispatcher:
//!
//! 1. persists an [`Alert`] before any notification is attempted,
//! 2. attempts every configured channel, each under its own timeout, without short-circuiting,
//! 3. records the per-channel outcome against the stored alert.
//!
//! Channel failures never escape this module; they only show up as `false` delivery flags.

use crate::alert::{Alert, NewAlert};
use crate::classifier::{Classification, Severity};
use crate::notify::{AlertNotice, ChannelOutcome, NotificationChannel};
use crate::store::{run_blocking, TriageStore};
use chrono::Utc;
use spmr_types::PatientId;
use std::sync::Arc;
use std::time::Duration;

/// What happened to one classification.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Severity below the alerting threshold.
    NotRaised,
    /// Alert stored; `outcomes` has one entry per configured channel.
    Raised {
        alert: Alert,
        outcomes: Vec<ChannelOutcome>,
    },
    /// The alert could not be stored, so no notification was attempted.
    PersistFailed { message: String, error: String },
}

impl DispatchOutcome {
    pub fn alert_message(&self) -> Option<&str> {
        match self {
            DispatchOutcome::NotRaised => None,
            DispatchOutcome::Raised { alert, .. } => Some(&alert.message),
            DispatchOutcome::PersistFailed { message, .. } => Some(message),
        }
    }

    pub fn triggered(&self) -> bool {
        !matches!(self, DispatchOutcome::NotRaised)
    }
}

#[derive(Clone)]
pub struct AlertDispatcher {
    store: Arc<dyn TriageStore>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    min_severity: Severity,
    timeout: Duration,
}

/// `"ALERT: Patient 7 -> Emergency. Reason: Low SpO2. Also triggered: High fever"`
pub fn compose_message(
    patient_id: &PatientId,
    classification: &Classification,
    also_triggered: &[&str],
) -> String {
    let mut parts = vec![
        format!("ALERT: Patient {} -> {}", patient_id, classification.label),
        format!("Reason: {}", classification.reason),
    ];
    if !also_triggered.is_empty() {
        parts.push(format!("Also triggered: {}", also_triggered.join(", ")));
    }
    parts.join(". ")
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn TriageStore>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        min_severity: Severity,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            channels,
            min_severity,
            timeout,
        }
    }

    pub fn should_alert(&self, classification: &Classification) -> bool {
        classification.label >= self.min_severity
    }

    pub async fn dispatch(
        &self,
        patient_id: &PatientId,
        classification: &Classification,
    ) -> DispatchOutcome {
        self.dispatch_with_findings(patient_id, classification, &[])
            .await
    }

    /// Like [`dispatch`](Self::dispatch), listing `also_triggered` conditions in the message.
    pub async fn dispatch_with_findings(
        &self,
        patient_id: &PatientId,
        classification: &Classification,
        also_triggered: &[&str],
    ) -> DispatchOutcome {
        if !self.should_alert(classification) {
            return DispatchOutcome::NotRaised;
        }

        let message = compose_message(patient_id, classification, also_triggered);
        let new_alert = NewAlert {
            patient_id: patient_id.clone(),
            timestamp: Utc::now(),
            severity: classification.label,
            message: message.clone(),
        };

        let mut alert = match run_blocking(&self.store, move |s| s.save_alert(new_alert)).await {
            Ok(alert) => alert,
            Err(e) => {
                tracing::error!("failed to persist alert for patient {}: {}", patient_id, e);
                return DispatchOutcome::PersistFailed {
                    message,
                    error: e.to_string(),
                };
            }
        };
        tracing::info!(alert_id = %alert.id, "alert raised: {}", alert.message);

        let notice = AlertNotice {
            subject: format!("SPMR Alert: {}", classification.label),
            body: message,
        };

        let mut outcomes = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            outcomes.push(self.attempt(channel.as_ref(), &notice).await);
        }

        for outcome in &outcomes {
            alert.set_outcome(outcome.channel, outcome.success);
            let (owner, alert_id) = (alert.patient_id.clone(), alert.id);
            let (channel, success) = (outcome.channel, outcome.success);
            let recorded = run_blocking(&self.store, move |s| {
                s.update_alert_outcome(&owner, alert_id, channel, success)
            })
            .await;
            if let Err(e) = recorded {
                tracing::error!(
                    alert_id = %alert.id,
                    "failed to record {} outcome: {}",
                    outcome.channel,
                    e
                );
            }
        }

        DispatchOutcome::Raised { alert, outcomes }
    }

    async fn attempt(
        &self,
        channel: &dyn NotificationChannel,
        notice: &AlertNotice,
    ) -> ChannelOutcome {
        let kind = channel.kind();
        match tokio::time::timeout(self.timeout, channel.send(notice)).await {
            Ok(Ok(delivery)) => {
                let detail = delivery.reference.unwrap_or_else(|| "sent".into());
                tracing::info!("{} notification delivered: {}", kind, detail);
                ChannelOutcome {
                    channel: kind,
                    success: true,
                    detail,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("{} notification failed: {}", kind, e);
                ChannelOutcome {
                    channel: kind,
                    success: false,
                    detail: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!("{} notification timed out after {:?}", kind, self.timeout);
                ChannelOutcome {
                    channel: kind,
                    success: false,
                    detail: format!("timed out after {:?}", self.timeout),
                }
            }
        }
    }
}
