//! Email delivery over an authenticated STARTTLS SMTP relay.

use super::{AlertNotice, ChannelKind, Delivery, NotificationChannel, NotifyError, NotifyResult};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Destination address.
    pub to_address: String,
}

pub struct SmtpEmail {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to_address: String,
}

fn mailbox(address: &str) -> NotifyResult<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

impl SmtpEmail {
    /// Builds the transport. No connection is opened until the first send.
    pub fn new(settings: SmtpSettings, timeout: Duration) -> NotifyResult<Self> {
        let from = mailbox(&settings.username)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from,
            to_address: settings.to_address,
        })
    }

    fn compose(&self, notice: &AlertNotice) -> NotifyResult<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(mailbox(&self.to_address)?)
            .subject(notice.subject.as_str())
            .body(notice.body.clone())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl NotificationChannel for SmtpEmail {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, notice: &AlertNotice) -> NotifyResult<Delivery> {
        let message = self.compose(notice)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let reference = response.message().next().map(str::to_string);
        Ok(Delivery { reference })
    }
}
