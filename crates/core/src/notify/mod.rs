//! Notification channels for alert delivery.
//!
//! Channels are pluggable: the dispatcher holds zero or more [`NotificationChannel`] trait
//! objects and attempts each one independently. A channel that is not configured is simply not
//! built, which keeps "not configured" distinct from "failed".

mod email;
mod sms;

pub use email::{SmtpEmail, SmtpSettings};
pub use sms::{TwilioSettings, TwilioSms};

use crate::config::TriageConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Sms,
    Email,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelKind::Sms => "sms",
            ChannelKind::Email => "email",
        })
    }
}

/// What a channel is asked to deliver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertNotice {
    pub subject: String,
    pub body: String,
}

/// A successful delivery. `reference` is the provider's message id when it returns one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub reference: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("transport error: {0}")]
    Transport(String),
}

pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, notice: &AlertNotice) -> NotifyResult<Delivery>;
}

/// Per-channel delivery result recorded against an alert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: ChannelKind,
    pub success: bool,
    pub detail: String,
}

/// Builds the channels that are fully configured.
pub fn build_channels(cfg: &TriageConfig) -> NotifyResult<Vec<Arc<dyn NotificationChannel>>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if let Some(settings) = cfg.sms() {
        channels.push(Arc::new(TwilioSms::new(settings.clone(), cfg.http_timeout())?));
    }
    if let Some(settings) = cfg.email() {
        channels.push(Arc::new(SmtpEmail::new(settings.clone(), cfg.http_timeout())?));
    }

    Ok(channels)
}
