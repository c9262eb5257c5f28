//! The triage pipeline: validate, persist, classify, maybe alert.
//!
//! Ordering within one submission is fixed: the reading is durably stored before it is
//! classified, and the alert (if any) is stored before notifications are attempted. Only a
//! failure to store the reading fails the submission; classifier and channel problems are
//! recovered locally.

use crate::alert::Alert;
use crate::classifier::{triggered_conditions, Classification};
use crate::config::TriageConfig;
use crate::dispatcher::{AlertDispatcher, DispatchOutcome};
use crate::error::{TriageError, TriageResult};
use crate::ml::{Classifier, HttpClassifier};
use crate::notify::{build_channels, NotificationChannel};
use crate::store::{run_blocking, TriageStore};
use crate::vitals::{resolve_timestamp, NewReading, VitalReading, VitalSigns};
use chrono::Utc;
use serde_json::Value;
use spmr_types::PatientId;
use std::sync::Arc;

/// A raw vitals submission, before validation.
#[derive(Clone, Debug, Default)]
pub struct TriageSubmission {
    pub patient_id: Option<String>,
    /// JSON text of the submitted `vitals` value, exactly as received. Stored verbatim.
    pub vitals: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TriageOutcome {
    pub reading: VitalReading,
    pub classification: Classification,
    pub dispatch: DispatchOutcome,
}

/// Result of re-evaluating a patient's latest stored reading.
#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub reading: VitalReading,
    pub classification: Classification,
}

struct Inner {
    store: Arc<dyn TriageStore>,
    classifier: Classifier,
    dispatcher: AlertDispatcher,
}

/// Entry point for triage requests. Cheap to clone.
#[derive(Clone)]
pub struct TriageService {
    inner: Arc<Inner>,
}

impl TriageService {
    pub fn new(
        store: Arc<dyn TriageStore>,
        classifier: Classifier,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                classifier,
                dispatcher,
            }),
        }
    }

    /// Wires the classifier and notification channels described by `cfg` around `store`.
    ///
    /// # Errors
    ///
    /// Returns `TriageError::Config` if an HTTP client or mail transport cannot be built.
    pub fn from_config(cfg: &TriageConfig, store: Arc<dyn TriageStore>) -> TriageResult<Self> {
        let classifier = match cfg.ml_service_url() {
            Some(url) => {
                let service = HttpClassifier::new(url, cfg.http_timeout())
                    .map_err(|e| TriageError::Config(e.to_string()))?;
                tracing::info!("external classification service enabled at {}", url);
                Classifier::with_service(*cfg.thresholds(), Arc::new(service))
            }
            None => Classifier::rules_only(*cfg.thresholds()),
        };

        let channels: Vec<Arc<dyn NotificationChannel>> =
            build_channels(cfg).map_err(|e| TriageError::Config(e.to_string()))?;
        for channel in &channels {
            tracing::info!("{} notifications enabled", channel.kind());
        }

        let dispatcher = AlertDispatcher::new(
            store.clone(),
            channels,
            cfg.alert_min_severity(),
            cfg.http_timeout(),
        );
        Ok(Self::new(store, classifier, dispatcher))
    }

    /// Validates a submission into a storable reading without touching the store.
    pub fn validate(submission: TriageSubmission) -> TriageResult<NewReading> {
        let patient_id = submission
            .patient_id
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| TriageError::Validation("patient_id and vitals required".into()))?;
        let patient_id = PatientId::parse(&patient_id)
            .map_err(|e| TriageError::Validation(format!("invalid patient_id: {e}")))?;

        let raw = submission
            .vitals
            .ok_or_else(|| TriageError::Validation("patient_id and vitals required".into()))?;
        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| TriageError::Validation(format!("vitals is not valid JSON: {e}")))?;
        match &parsed {
            Value::Object(map) if !map.is_empty() => {}
            Value::Object(_) | Value::Null => {
                return Err(TriageError::Validation(
                    "patient_id and vitals required".into(),
                ))
            }
            _ => return Err(TriageError::Validation("vitals must be a JSON object".into())),
        }

        Ok(NewReading {
            patient_id,
            timestamp: resolve_timestamp(submission.timestamp.as_deref(), Utc::now()),
            vitals: VitalSigns::from_json(&parsed),
            raw,
        })
    }

    /// Runs one submission through the full triage pipeline.
    ///
    /// # Errors
    ///
    /// - `TriageError::Validation` if the patient id or vitals are missing; nothing is stored.
    /// - `TriageError::Store` if the reading could not be persisted; nothing is classified.
    pub async fn submit(&self, submission: TriageSubmission) -> TriageResult<TriageOutcome> {
        let new_reading = Self::validate(submission)?;
        let reading = run_blocking(&self.inner.store, move |s| s.save_reading(new_reading))
            .await
            .map_err(|e| {
                tracing::error!("failed to persist reading: {}", e);
                TriageError::Store(e)
            })?;

        let classification = self.inner.classifier.evaluate(&reading.vitals).await;
        tracing::debug!(
            reading_id = %reading.id,
            "patient {} classified {} ({})",
            reading.patient_id,
            classification.label,
            classification.reason
        );

        let findings = triggered_conditions(&reading.vitals, self.inner.classifier.thresholds());
        let also: Vec<&str> = findings
            .iter()
            .filter(|hit| hit.label == classification.label && hit.reason != classification.reason)
            .map(|hit| hit.reason)
            .collect();

        let dispatch = self
            .inner
            .dispatcher
            .dispatch_with_findings(&reading.patient_id, &classification, &also)
            .await;

        Ok(TriageOutcome {
            reading,
            classification,
            dispatch,
        })
    }

    /// Classifies the most recent stored reading for a patient, without raising alerts.
    pub async fn latest_analysis(&self, patient_id: &PatientId) -> TriageResult<Option<Analysis>> {
        let pid = patient_id.clone();
        let latest = run_blocking(&self.inner.store, move |s| s.latest_reading(&pid)).await?;
        let Some(reading) = latest else {
            return Ok(None);
        };
        let classification = self.inner.classifier.evaluate(&reading.vitals).await;
        Ok(Some(Analysis {
            reading,
            classification,
        }))
    }

    /// Stored readings for a patient, oldest first.
    pub async fn readings(&self, patient_id: &PatientId) -> TriageResult<Vec<VitalReading>> {
        let pid = patient_id.clone();
        Ok(run_blocking(&self.inner.store, move |s| s.list_readings(&pid)).await?)
    }

    /// Stored alerts for a patient, oldest first, with their delivery flags.
    pub async fn alerts(&self, patient_id: &PatientId) -> TriageResult<Vec<Alert>> {
        let pid = patient_id.clone();
        Ok(run_blocking(&self.inner.store, move |s| s.list_alerts(&pid)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::NewAlert;
    use crate::classifier::{Severity, Thresholds};
    use crate::dispatcher::tests::{Behaviour, ScriptedChannel};
    use crate::error::{StoreError, StoreResult};
    use crate::notify::ChannelKind;
    use crate::store::MemoryTriageStore;
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;

    fn service_with(
        store: Arc<dyn TriageStore>,
        channels: Vec<Arc<dyn NotificationChannel>>,
    ) -> TriageService {
        let dispatcher = AlertDispatcher::new(
            store.clone(),
            channels,
            Severity::Emergency,
            Duration::from_millis(200),
        );
        TriageService::new(
            store,
            Classifier::rules_only(Thresholds::default()),
            dispatcher,
        )
    }

    fn submission(patient: &str, vitals: Value) -> TriageSubmission {
        TriageSubmission {
            patient_id: Some(patient.into()),
            vitals: Some(vitals.to_string()),
            timestamp: None,
        }
    }

    struct ReadOnlyStore;

    impl TriageStore for ReadOnlyStore {
        fn save_reading(&self, _reading: NewReading) -> StoreResult<VitalReading> {
            Err(StoreError::FileWrite(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
        fn save_alert(&self, _alert: NewAlert) -> StoreResult<Alert> {
            unreachable!("no alert without a stored reading")
        }
        fn update_alert_outcome(
            &self,
            _: &PatientId,
            id: Uuid,
            _: ChannelKind,
            _: bool,
        ) -> StoreResult<()> {
            Err(StoreError::AlertNotFound(id))
        }
        fn list_readings(&self, _patient_id: &PatientId) -> StoreResult<Vec<VitalReading>> {
            Ok(Vec::new())
        }
        fn list_alerts(&self, _patient_id: &PatientId) -> StoreResult<Vec<Alert>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn emergency_reading_is_stored_and_alerted() {
        let store = Arc::new(MemoryTriageStore::new());
        let sms = ScriptedChannel::new(ChannelKind::Sms, Behaviour::Succeed);
        let service = service_with(store.clone(), vec![sms]);

        let outcome = service
            .submit(submission("12", json!({"hr": 150, "spo2": 85, "temp": 37})))
            .await
            .expect("submission should succeed");

        assert_eq!(outcome.classification.label, Severity::Emergency);
        assert_eq!(outcome.classification.reason, "Low SpO2");
        assert_eq!(
            outcome.dispatch.alert_message(),
            Some("ALERT: Patient 12 -> Emergency. Reason: Low SpO2. Also triggered: Very high HR")
        );

        let patient = PatientId::parse("12").unwrap();
        assert_eq!(store.list_readings(&patient).unwrap(), vec![outcome.reading.clone()]);
        let alerts = store.list_alerts(&patient).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].sent_sms);
        assert!(!alerts[0].sent_email);
    }

    #[tokio::test]
    async fn warning_reading_is_stored_without_alert() {
        let store = Arc::new(MemoryTriageStore::new());
        let service = service_with(store.clone(), vec![]);

        let outcome = service
            .submit(submission("12", json!({"hr": 125})))
            .await
            .unwrap();

        assert_eq!(outcome.classification.label, Severity::Warning);
        assert_eq!(outcome.classification.reason, "Low SpO2 or high HR");
        assert_eq!(outcome.dispatch, DispatchOutcome::NotRaised);
        assert_eq!(store.alert_count().unwrap(), 0);
        assert_eq!(outcome.reading.raw, r#"{"hr":125}"#);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_persistence() {
        let store = Arc::new(MemoryTriageStore::new());
        let service = service_with(store.clone(), vec![]);

        let cases = [
            TriageSubmission {
                patient_id: None,
                vitals: Some(r#"{"hr": 80}"#.into()),
                timestamp: None,
            },
            TriageSubmission {
                patient_id: Some("  ".into()),
                vitals: Some(r#"{"hr": 80}"#.into()),
                timestamp: None,
            },
            submission("12", json!({})),
            submission("12", json!([80])),
            submission("12", Value::Null),
            TriageSubmission {
                patient_id: Some("12".into()),
                vitals: Some("{\"hr\":".into()),
                timestamp: None,
            },
            TriageSubmission {
                patient_id: Some("12".into()),
                vitals: None,
                timestamp: None,
            },
        ];
        for case in cases {
            let err = service.submit(case).await.unwrap_err();
            assert!(matches!(err, TriageError::Validation(_)));
        }

        let patient = PatientId::parse("12").unwrap();
        assert!(store.list_readings(&patient).unwrap().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_rejects_the_submission() {
        let service = service_with(Arc::new(ReadOnlyStore), vec![]);

        let err = service
            .submit(submission("12", json!({"spo2": 80})))
            .await
            .unwrap_err();

        assert!(matches!(err, TriageError::Store(StoreError::FileWrite(_))));
    }

    #[tokio::test]
    async fn submitted_timestamp_is_kept() {
        let store = Arc::new(MemoryTriageStore::new());
        let service = service_with(store, vec![]);

        let outcome = service
            .submit(TriageSubmission {
                patient_id: Some("12".into()),
                vitals: Some(r#"{"temp": 36.8}"#.into()),
                timestamp: Some("2024-02-29T23:59:00Z".into()),
            })
            .await
            .unwrap();

        assert_eq!(outcome.reading.timestamp.to_rfc3339(), "2024-02-29T23:59:00+00:00");
    }

    #[tokio::test]
    async fn submitted_vitals_text_is_stored_verbatim() {
        let store = Arc::new(MemoryTriageStore::new());
        let service = service_with(store.clone(), vec![]);
        let submitted = r#"{"spo2": 98, "hr": 7.0e1, "note": "post-walk"}"#;

        let outcome = service
            .submit(TriageSubmission {
                patient_id: Some("12".into()),
                vitals: Some(submitted.into()),
                timestamp: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome.reading.raw, submitted);
        assert_eq!(outcome.reading.vitals.hr, Some(70.0));
        assert_eq!(outcome.reading.vitals.spo2, Some(98.0));

        let stored = service.readings(&PatientId::parse("12").unwrap()).await.unwrap();
        assert_eq!(stored[0].raw, submitted);
    }

    #[tokio::test]
    async fn latest_analysis_reclassifies_newest_reading() {
        let store = Arc::new(MemoryTriageStore::new());
        let service = service_with(store.clone(), vec![]);
        let patient = PatientId::parse("p9").unwrap();

        assert_eq!(service.latest_analysis(&patient).await.unwrap(), None);

        for (ts, vitals) in [
            ("2024-01-01T08:00:00Z", json!({"temp": 41})),
            ("2024-01-01T09:00:00Z", json!({"temp": 37})),
        ] {
            service
                .submit(TriageSubmission {
                    patient_id: Some("p9".into()),
                    vitals: Some(vitals.to_string()),
                    timestamp: Some(ts.into()),
                })
                .await
                .unwrap();
        }
        let alerts_before = store.alert_count().unwrap();

        let analysis = service
            .latest_analysis(&patient)
            .await
            .unwrap()
            .expect("reading exists");
        assert_eq!(analysis.reading.vitals.temp, Some(37.0));
        assert_eq!(analysis.classification.label, Severity::Normal);
        assert_eq!(store.alert_count().unwrap(), alerts_before);
    }
}
