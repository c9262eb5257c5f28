//! In-memory storage, for tests and ephemeral runs.

use super::TriageStore;
use crate::alert::{Alert, NewAlert};
use crate::error::{StoreError, StoreResult};
use crate::notify::ChannelKind;
use crate::vitals::{NewReading, VitalReading};
use spmr_types::PatientId;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default, Debug)]
struct Records {
    readings: Vec<VitalReading>,
    alerts: Vec<Alert>,
}

#[derive(Default, Debug)]
pub struct MemoryTriageStore {
    records: Mutex<Records>,
}

impl MemoryTriageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> StoreResult<MutexGuard<'_, Records>> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored alerts across all patients.
    pub fn alert_count(&self) -> StoreResult<usize> {
        Ok(self.records()?.alerts.len())
    }
}

impl TriageStore for MemoryTriageStore {
    fn save_reading(&self, reading: NewReading) -> StoreResult<VitalReading> {
        let reading = VitalReading::from_new(Uuid::new_v4(), reading);
        self.records()?.readings.push(reading.clone());
        Ok(reading)
    }

    fn save_alert(&self, alert: NewAlert) -> StoreResult<Alert> {
        let alert = Alert::from_new(Uuid::new_v4(), alert);
        self.records()?.alerts.push(alert.clone());
        Ok(alert)
    }

    fn update_alert_outcome(
        &self,
        patient_id: &PatientId,
        alert_id: Uuid,
        channel: ChannelKind,
        success: bool,
    ) -> StoreResult<()> {
        let mut records = self.records()?;
        let alert = records
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && &a.patient_id == patient_id)
            .ok_or(StoreError::AlertNotFound(alert_id))?;
        alert.set_outcome(channel, success);
        Ok(())
    }

    fn list_readings(&self, patient_id: &PatientId) -> StoreResult<Vec<VitalReading>> {
        let mut readings: Vec<VitalReading> = self
            .records()?
            .readings
            .iter()
            .filter(|r| &r.patient_id == patient_id)
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.timestamp);
        Ok(readings)
    }

    fn list_alerts(&self, patient_id: &PatientId) -> StoreResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .records()?
            .alerts
            .iter()
            .filter(|a| &a.patient_id == patient_id)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.timestamp);
        Ok(alerts)
    }
}
