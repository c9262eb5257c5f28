//! SMS delivery through the Twilio Messages API.

use super::{AlertNotice, ChannelKind, Delivery, NotificationChannel, NotifyError, NotifyResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    /// Destination phone number.
    pub to_number: String,
    /// API root, normally [`crate::constants::TWILIO_API_BASE`].
    pub api_base: String,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Clone, Debug)]
pub struct TwilioSms {
    client: reqwest::Client,
    settings: TwilioSettings,
}

impl TwilioSms {
    pub fn new(settings: TwilioSettings, timeout: Duration) -> NotifyResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, settings })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid
        )
    }
}

#[async_trait]
impl NotificationChannel for TwilioSms {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, notice: &AlertNotice) -> NotifyResult<Delivery> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[
                ("To", self.settings.to_number.as_str()),
                ("From", self.settings.from_number.as_str()),
                ("Body", notice.body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let message: MessageResource = response.json().await?;
        Ok(Delivery {
            reference: Some(message.sid),
        })
    }
}
