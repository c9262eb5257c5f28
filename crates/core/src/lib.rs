//! # SPMR Core
//!
//! Core business logic for the SPMR remote-monitoring backend.
//!
//! This crate contains the vital-sign triage engine and its collaborators:
//! - Rule-based severity classification, with an optional external classifier in front of it
//! - Alert dispatch with pluggable SMS and email channels
//! - JSON file storage of readings and alerts under `SPMR_DATA_DIR`
//!
//! **No API concerns**: Authentication, HTTP servers, or wire formats belong in `api-rest` or
//! `api-shared`.

pub mod alert;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod ml;
pub mod notify;
pub mod store;
pub mod triage;
pub mod vitals;

pub use alert::{Alert, NewAlert};
pub use classifier::{classify, triggered_conditions, Classification, Severity, Thresholds};
pub use config::TriageConfig;
pub use dispatcher::{AlertDispatcher, DispatchOutcome};
pub use error::{StoreError, StoreResult, TriageError, TriageResult};
pub use ml::{ClassificationService, Classifier, HttpClassifier};
pub use notify::{ChannelKind, ChannelOutcome, NotificationChannel};
pub use store::{FileTriageStore, MemoryTriageStore, TriageStore};
pub use triage::{Analysis, TriageOutcome, TriageService, TriageSubmission};
pub use vitals::{NewReading, VitalReading, VitalSigns};

pub use spmr_types::{NonEmptyText, PatientId, TextError};
