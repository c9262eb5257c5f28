//! Durable storage of readings and alerts.
//!
//! The triage path only needs three writes (`save_reading`, `save_alert`,
//! `update_alert_outcome`); the read operations back the query endpoints and the CLI.
//! Every write touches a single record, so implementations only need single-record atomicity.
//!
//! Implementations are synchronous. Async callers go through [`run_blocking`] so file I/O
//! never runs on a runtime worker.

mod file;
mod memory;

pub use file::FileTriageStore;
pub use memory::MemoryTriageStore;

use crate::alert::{Alert, NewAlert};
use crate::error::{StoreError, StoreResult};
use crate::notify::ChannelKind;
use crate::vitals::{NewReading, VitalReading};
use spmr_types::PatientId;
use std::sync::Arc;
use uuid::Uuid;

pub trait TriageStore: Send + Sync {
    fn save_reading(&self, reading: NewReading) -> StoreResult<VitalReading>;

    fn save_alert(&self, alert: NewAlert) -> StoreResult<Alert>;

    fn update_alert_outcome(
        &self,
        patient_id: &PatientId,
        alert_id: Uuid,
        channel: ChannelKind,
        success: bool,
    ) -> StoreResult<()>;

    /// Readings for a patient, oldest first.
    fn list_readings(&self, patient_id: &PatientId) -> StoreResult<Vec<VitalReading>>;

    /// Alerts for a patient, oldest first.
    fn list_alerts(&self, patient_id: &PatientId) -> StoreResult<Vec<Alert>>;

    fn latest_reading(&self, patient_id: &PatientId) -> StoreResult<Option<VitalReading>> {
        Ok(self.list_readings(patient_id)?.pop())
    }
}

/// Runs one store operation on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(store: &Arc<dyn TriageStore>, op: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn TriageStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
