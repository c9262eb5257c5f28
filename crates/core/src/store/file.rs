//! JSON file storage.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   patients/
//!     <patient_id>/
//!       vitals/<uuid>.json
//!       alerts/<uuid>.json
//! ```
//!
//! Each record is written to a temporary sibling and renamed into place, so a reader never
//! observes a half-written file.

use super::TriageStore;
use crate::alert::{Alert, NewAlert};
use crate::constants::{ALERTS_DIR_NAME, PATIENTS_DIR_NAME, VITALS_DIR_NAME};
use crate::error::{StoreError, StoreResult};
use crate::notify::ChannelKind;
use crate::vitals::{NewReading, VitalReading};
use serde::de::DeserializeOwned;
use serde::Serialize;
use spmr_types::PatientId;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug)]
pub struct FileTriageStore {
    data_dir: PathBuf,
    // Serialises read-modify-write of alert files.
    alert_lock: Mutex<()>,
}

impl FileTriageStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            alert_lock: Mutex::new(()),
        }
    }

    fn patients_dir(&self) -> PathBuf {
        self.data_dir.join(PATIENTS_DIR_NAME)
    }

    fn patient_dir(&self, patient_id: &PatientId) -> PathBuf {
        self.patients_dir().join(patient_id.as_str())
    }

    fn record_path(dir: &Path, id: Uuid) -> PathBuf {
        dir.join(format!("{}.json", id.simple()))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(StoreError::DirCreation)?;
    }
    let json = serde_json::to_vec_pretty(value).map_err(StoreError::Serialization)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(StoreError::FileWrite)?;
    fs::rename(&tmp, path).map_err(StoreError::FileWrite)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let contents = fs::read_to_string(path).map_err(StoreError::FileRead)?;
    serde_json::from_str(&contents).map_err(|source| StoreError::Deserialization {
        path: path.to_path_buf(),
        source,
    })
}

fn read_dir_records<T: DeserializeOwned>(dir: &Path) -> StoreResult<Vec<T>> {
    let entries = match fs::read_dir(dir) {
        Ok(it) => it,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::FileRead(e)),
    };

    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        records.push(read_json(&path)?);
    }
    Ok(records)
}

impl TriageStore for FileTriageStore {
    fn save_reading(&self, reading: NewReading) -> StoreResult<VitalReading> {
        let reading = VitalReading::from_new(Uuid::new_v4(), reading);
        let dir = self.patient_dir(&reading.patient_id).join(VITALS_DIR_NAME);
        write_json(&Self::record_path(&dir, reading.id), &reading)?;
        Ok(reading)
    }

    fn save_alert(&self, alert: NewAlert) -> StoreResult<Alert> {
        let alert = Alert::from_new(Uuid::new_v4(), alert);
        let dir = self.patient_dir(&alert.patient_id).join(ALERTS_DIR_NAME);
        write_json(&Self::record_path(&dir, alert.id), &alert)?;
        Ok(alert)
    }

    fn update_alert_outcome(
        &self,
        patient_id: &PatientId,
        alert_id: Uuid,
        channel: ChannelKind,
        success: bool,
    ) -> StoreResult<()> {
        let dir = self.patient_dir(patient_id).join(ALERTS_DIR_NAME);
        let path = Self::record_path(&dir, alert_id);
        let _guard = self.alert_lock.lock().map_err(|_| StoreError::Poisoned)?;
        if !path.is_file() {
            return Err(StoreError::AlertNotFound(alert_id));
        }
        let mut alert: Alert = read_json(&path)?;
        alert.set_outcome(channel, success);
        write_json(&path, &alert)
    }

    fn list_readings(&self, patient_id: &PatientId) -> StoreResult<Vec<VitalReading>> {
        let mut readings: Vec<VitalReading> =
            read_dir_records(&self.patient_dir(patient_id).join(VITALS_DIR_NAME))?;
        readings.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(readings)
    }

    fn list_alerts(&self, patient_id: &PatientId) -> StoreResult<Vec<Alert>> {
        let mut alerts: Vec<Alert> =
            read_dir_records(&self.patient_dir(patient_id).join(ALERTS_DIR_NAME))?;
        alerts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(alerts)
    }
}
