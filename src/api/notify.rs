//! Outbound notification collaborators: email and device push.
//!
//! Senders are synchronous trait objects; delivery happens on blocking
//! worker threads, fire-and-forget, so a slow or failing provider never
//! stalls a request. The default senders for local dev log the payload
//! and return `Ok`.

use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

/// One push notification addressed to a device token.
#[derive(Clone, Debug)]
pub struct PushNote {
    pub device_token: String,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

/// Device push delivery abstraction.
pub trait PushSender: Send + Sync {
    /// Deliver a note or return an error.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails.
    fn send(&self, note: &PushNote) -> Result<()>;
}

/// Local dev sender that logs instead of calling a push provider.
#[derive(Clone, Debug)]
pub struct LogPushSender;

impl PushSender for LogPushSender {
    fn send(&self, note: &PushNote) -> Result<()> {
        info!(
            device_token = %note.device_token,
            title = %note.title,
            "push send stub"
        );
        Ok(())
    }
}

/// FCM HTTP sender.
pub struct FcmPushSender {
    server_key: SecretString,
    endpoint: String,
}

impl FcmPushSender {
    #[must_use]
    pub fn new(server_key: SecretString) -> Self {
        Self {
            server_key,
            endpoint: "https://fcm.googleapis.com/fcm/send".to_string(),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn payload(note: &PushNote) -> serde_json::Value {
        json!({
            "to": note.device_token.as_str(),
            "notification": {
                "title": note.title.as_str(),
                "body": note.body.as_str(),
            },
            "data": &note.data,
        })
    }
}

impl PushSender for FcmPushSender {
    // Runs on a blocking worker thread; see `fan_out`.
    fn send(&self, note: &PushNote) -> Result<()> {
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("key={}", self.server_key.expose_secret()),
            )
            .json(&Self::payload(note))
            .send()?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("fcm rejected push: {status}"))
        }
    }
}

/// Deliver a batch of notes off the request path.
///
/// Failures are logged and dropped; notifications are best-effort.
pub fn fan_out(sender: Arc<dyn PushSender>, notes: Vec<PushNote>) {
    if notes.is_empty() {
        return;
    }
    tokio::task::spawn_blocking(move || {
        for note in &notes {
            if let Err(err) = sender.send(note) {
                error!("failed to deliver push: {err:#}");
            }
        }
    });
}

/// Deliver one email off the request path, best-effort.
pub fn send_email(sender: Arc<dyn EmailSender>, message: EmailMessage) {
    tokio::task::spawn_blocking(move || {
        if let Err(err) = sender.send(&message) {
            error!("failed to deliver email: {err:#}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_senders_accept_payloads() {
        let email = LogEmailSender;
        assert!(email
            .send(&EmailMessage {
                to: "member@example.com".to_string(),
                subject: "Password reset".to_string(),
                body: "link".to_string(),
            })
            .is_ok());

        let push = LogPushSender;
        assert!(push
            .send(&PushNote {
                device_token: "token".to_string(),
                title: "New post".to_string(),
                body: "hello".to_string(),
                data: HashMap::new(),
            })
            .is_ok());
    }

    #[test]
    fn fcm_payload_carries_notification_and_data() {
        let mut data = HashMap::new();
        data.insert("board_id".to_string(), "3".to_string());
        data.insert("post_id".to_string(), "17".to_string());

        let payload = FcmPushSender::payload(&PushNote {
            device_token: "device-1".to_string(),
            title: "New post".to_string(),
            body: "hello".to_string(),
            data,
        });

        assert_eq!(payload["to"], "device-1");
        assert_eq!(payload["notification"]["title"], "New post");
        assert_eq!(payload["data"]["post_id"], "17");
    }
}
