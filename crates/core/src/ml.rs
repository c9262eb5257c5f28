//! Optional external classification service with rule-engine fallback.
//!
//! When a service is configured its answer replaces the rule-engine result. Any failure
//! (network error, timeout, non-2xx status, malformed body) falls back to the rules, so
//! triage never depends on the service being reachable.

use crate::classifier::{classify, Classification, Severity, Thresholds};
use crate::vitals::VitalSigns;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classification service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classification service returned status {0}")]
    Status(u16),
    #[error("classification service returned unknown label {0:?}")]
    UnknownLabel(String),
    #[error("classification service returned score {0} outside [0, 1]")]
    ScoreOutOfRange(f64),
}

#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn classify(&self, vitals: &VitalSigns) -> Result<Classification, ClassifierError>;
}

#[derive(Deserialize)]
struct ServiceResponse {
    label: String,
    score: f64,
    #[serde(default)]
    reason: String,
}

/// JSON-over-HTTP classification service.
///
/// Sends `{"vitals": {"hr", "spo2", "temp", "rr"}}` and expects
/// `{"label", "score", "reason"}` back.
#[derive(Clone, Debug)]
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ClassificationService for HttpClassifier {
    async fn classify(&self, vitals: &VitalSigns) -> Result<Classification, ClassifierError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "vitals": vitals }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let body: ServiceResponse = response.json().await?;
        let label = body
            .label
            .parse::<Severity>()
            .map_err(|e| ClassifierError::UnknownLabel(e.0))?;
        if !(0.0..=1.0).contains(&body.score) {
            return Err(ClassifierError::ScoreOutOfRange(body.score));
        }

        Ok(Classification {
            label,
            score: body.score,
            reason: body.reason,
        })
    }
}

/// Classifies readings, preferring the external service when one is configured.
#[derive(Clone)]
pub struct Classifier {
    thresholds: Thresholds,
    service: Option<Arc<dyn ClassificationService>>,
}

impl Classifier {
    /// Rule engine only.
    pub fn rules_only(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            service: None,
        }
    }

    pub fn with_service(thresholds: Thresholds, service: Arc<dyn ClassificationService>) -> Self {
        Self {
            thresholds,
            service: Some(service),
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Rule-engine result for the configured thresholds.
    pub fn rules(&self, vitals: &VitalSigns) -> Classification {
        classify(vitals, &self.thresholds)
    }

    pub async fn evaluate(&self, vitals: &VitalSigns) -> Classification {
        let Some(service) = &self.service else {
            return self.rules(vitals);
        };

        match service.classify(vitals).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("classification service unavailable, using rules: {}", e);
                self.rules(vitals)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reading() -> VitalSigns {
        VitalSigns {
            hr: Some(150.0),
            spo2: Some(85.0),
            temp: Some(37.0),
            rr: None,
        }
    }

    async fn classifier_for(server: &MockServer) -> Classifier {
        let url = format!("{}/predict", server.uri());
        let service =
            HttpClassifier::new(url, Duration::from_secs(5)).expect("client should build");
        Classifier::with_service(Thresholds::default(), Arc::new(service))
    }

    #[tokio::test]
    async fn uses_service_result_when_available() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(json!({
                "vitals": {"hr": 150.0, "spo2": 85.0, "temp": 37.0, "rr": null}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "label": "Critical",
                "score": 0.97,
                "reason": "model: hypoxia"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = classifier_for(&server).await.evaluate(&reading()).await;

        assert_eq!(result.label, Severity::Critical);
        assert_eq!(result.score, 0.97);
        assert_eq!(result.reason, "model: hypoxia");
    }

    #[tokio::test]
    async fn server_error_falls_back_to_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let classifier = classifier_for(&server).await;
        let result = classifier.evaluate(&reading()).await;

        assert_eq!(result, classify(&reading(), &Thresholds::default()));
        assert_eq!(result.reason, "Low SpO2");
    }

    #[tokio::test]
    async fn malformed_body_falls_back_to_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"label": "Alert", "score": 0.5})),
            )
            .mount(&server)
            .await;

        let classifier = classifier_for(&server).await;
        assert_eq!(
            classifier.evaluate(&reading()).await,
            classifier.rules(&reading())
        );
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"label": "Normal", "score": 7.0, "reason": "?"})),
            )
            .mount(&server)
            .await;

        let service = HttpClassifier::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = service.classify(&reading()).await.unwrap_err();
        assert!(matches!(err, ClassifierError::ScoreOutOfRange(s) if s == 7.0));
    }

    #[tokio::test]
    async fn slow_service_times_out_and_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"label": "Normal", "score": 0.1, "reason": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let service = HttpClassifier::new(server.uri(), Duration::from_millis(50)).unwrap();
        let classifier = Classifier::with_service(Thresholds::default(), Arc::new(service));

        assert_eq!(classifier.evaluate(&reading()).await.reason, "Low SpO2");
    }

    #[tokio::test]
    async fn unreachable_service_falls_back_to_rules() {
        // Nothing listens on port 9 (discard) in the test environment.
        let service =
            HttpClassifier::new("http://127.0.0.1:9/predict", Duration::from_secs(1)).unwrap();
        let classifier = Classifier::with_service(Thresholds::default(), Arc::new(service));
        let warning = VitalSigns {
            hr: Some(125.0),
            ..VitalSigns::default()
        };

        let result = classifier.evaluate(&warning).await;
        assert_eq!(result.label, Severity::Warning);
        assert_eq!(result.reason, "Low SpO2 or high HR");
    }
}
