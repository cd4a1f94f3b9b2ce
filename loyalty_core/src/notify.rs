use async_channel::{Receiver, Sender};
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AppConfig, TwilioConfig},
    error::{LoyaltyError, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub body: String,
}

/// Fire-and-forget handle the service uses to queue outbound SMS.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: Sender<Notification>,
}

impl Outbox {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self { sender }
    }

    /// Outbox over an unbounded channel, plus the receiver for the worker.
    pub fn unbounded() -> (Self, Receiver<Notification>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self::new(sender), receiver)
    }

    /// Never blocks and never fails the caller; state is already committed.
    pub fn queue(&self, to: &str, body: impl Into<String>) {
        let notification = Notification {
            to: to.to_string(),
            body: body.into(),
        };
        if let Err(e) = self.sender.try_send(notification) {
            log::warn!("notification dropped for {}: {}", to, e);
        }
    }
}

pub enum SmsProvider {
    Stub,
    Twilio(TwilioSms),
}

impl SmsProvider {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match config.sms_provider.as_str() {
            "twilio" => {
                let twilio = config
                    .twilio
                    .clone()
                    .ok_or(LoyaltyError::NotConfigured("twilio credentials"))?;
                Ok(SmsProvider::Twilio(TwilioSms::new(twilio)))
            }
            _ => Ok(SmsProvider::Stub),
        }
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<()> {
        match self {
            SmsProvider::Stub => {
                log::info!("[stub-sms] -> {}: {}", to, body);
                Ok(())
            }
            SmsProvider::Twilio(twilio) => twilio.send(to, body).await,
        }
    }
}

pub struct TwilioSms {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSms {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub async fn send(&self, to: &str, body: &str) -> Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", self.config.from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LoyaltyError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Sends queued messages until every sender is gone or `shutdown` fires. On
/// shutdown the outbox is closed and whatever is still queued is flushed
/// before returning. A failed send is logged and skipped. Returns the number
/// of messages delivered.
pub async fn run_notification_worker(
    receiver: Receiver<Notification>,
    provider: SmsProvider,
    shutdown: CancellationToken,
) -> anyhow::Result<u64> {
    let mut sent = 0u64;
    loop {
        tokio::select! {
            next = receiver.recv() => match next {
                Ok(notification) => sent += deliver(&provider, notification).await,
                Err(_) => {
                    log::info!("notification outbox closed after {} message(s)", sent);
                    return Ok(sent);
                }
            },
            _ = shutdown.cancelled() => break,
        }
    }

    receiver.close();
    let pending = receiver.len();
    log::info!("Notification worker received shutdown signal; flushing {} queued message(s)", pending);
    while let Ok(notification) = receiver.try_recv() {
        sent += deliver(&provider, notification).await;
    }
    log::info!("notification outbox flushed after {} message(s)", sent);
    Ok(sent)
}

async fn deliver(provider: &SmsProvider, notification: Notification) -> u64 {
    match provider.send(&notification.to, &notification.body).await {
        Ok(()) => 1,
        Err(e) => {
            log::error!("sms to {} failed: {}", notification.to, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twilio_without_credentials_is_not_configured() {
        let config = AppConfig {
            sms_provider: "twilio".into(),
            ..AppConfig::default()
        };
        assert!(matches!(
            SmsProvider::from_config(&config),
            Err(LoyaltyError::NotConfigured(_))
        ));
    }

    #[test]
    fn queue_after_worker_gone_does_not_panic() {
        let (outbox, receiver) = Outbox::unbounded();
        drop(receiver);
        outbox.queue("5551234567", "hello");
    }

    #[tokio::test]
    async fn worker_drains_and_stops_when_senders_drop() {
        let (outbox, receiver) = Outbox::unbounded();
        outbox.queue("5551234567", "one");
        outbox.queue("5551234567", "two");
        drop(outbox);
        let sent = run_notification_worker(receiver, SmsProvider::Stub, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn shutdown_flushes_queued_messages() {
        let (outbox, receiver) = Outbox::unbounded();
        for body in ["one", "two", "three"] {
            outbox.queue("5551234567", body);
        }
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let sent = run_notification_worker(receiver, SmsProvider::Stub, shutdown)
            .await
            .unwrap();
        assert_eq!(sent, 3);

        // outbox is closed once the worker has shut down
        outbox.queue("5551234567", "late");
    }
}
