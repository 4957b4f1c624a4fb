//! Delivery of one-time codes to account holders.
//!
//! The workflow hands the code off and moves on. Senders report failures,
//! but a failed delivery never fails the forgot-password request.

use crate::observability::hash_for_correlation;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Timeout for a single webhook delivery.
const WEBHOOK_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("delivery request failed: {0}")]
    Transport(String),

    #[error("delivery rejected with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_otp(&self, email: &str, code: &SecretString) -> Result<(), NotificationError>;
}

/// Logs that a code was issued. The code itself is never written out.
///
/// Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn send_otp(&self, email: &str, _code: &SecretString) -> Result<(), NotificationError> {
        info!(
            target: "auth.notify",
            email_hash = %hash_for_correlation(email),
            "OTP issued, no delivery channel configured"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct OtpMessage<'a> {
    email: &'a str,
    otp_code: &'a str,
    subject: &'static str,
}

/// Posts codes as JSON to an external mailer.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSender for WebhookNotifier {
    #[instrument(skip_all)]
    async fn send_otp(&self, email: &str, code: &SecretString) -> Result<(), NotificationError> {
        let message = OtpMessage {
            email,
            otp_code: code.expose_secret(),
            subject: "Email Verification",
        };

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                // The webhook URL may carry an API key.
                let e = e.without_url();
                warn!(target: "auth.notify", error = %e, "Webhook request failed");
                NotificationError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "auth.notify", status = status.as_u16(), "Webhook rejected OTP delivery");
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        info!(
            target: "auth.notify",
            email_hash = %hash_for_correlation(email),
            "OTP delivered"
        );
        Ok(())
    }
}

/// Recording sender for tests.
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Scheduler yields granted to a delivery task before a lookup gives up.
    const DELIVERY_WAIT_YIELDS: usize = 1_000;

    #[derive(Debug, Clone, Default)]
    pub struct RecordingNotifier {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Records the message, then reports a transport failure.
        pub fn failing() -> Self {
            Self {
                sent: Arc::default(),
                fail: true,
            }
        }

        /// All (email, code) pairs handed to this sender, oldest first.
        pub async fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().await.clone()
        }

        /// Most recent code sent to `email`, waiting for a first delivery.
        ///
        /// Deliveries run on a spawned task, so the lookup yields to the
        /// runtime until a code shows up.
        pub async fn last_code_for(&self, email: &str) -> Option<String> {
            for _ in 0..DELIVERY_WAIT_YIELDS {
                let last = self
                    .sent
                    .lock()
                    .await
                    .iter()
                    .rev()
                    .find(|(to, _)| to == email)
                    .map(|(_, code)| code.clone());
                if last.is_some() {
                    return last;
                }
                tokio::task::yield_now().await;
            }
            None
        }

        /// The `n`th code (1-based) sent to `email`, waiting until it has
        /// been delivered.
        pub async fn nth_code_for(&self, email: &str, n: usize) -> Option<String> {
            let index = n.checked_sub(1)?;
            for _ in 0..DELIVERY_WAIT_YIELDS {
                let code = self
                    .sent
                    .lock()
                    .await
                    .iter()
                    .filter(|(to, _)| to == email)
                    .nth(index)
                    .map(|(_, code)| code.clone());
                if code.is_some() {
                    return code;
                }
                tokio::task::yield_now().await;
            }
            None
        }
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn send_otp(
            &self,
            email: &str,
            code: &SecretString,
        ) -> Result<(), NotificationError> {
            self.sent
                .lock()
                .await
                .push((email.to_string(), code.expose_secret().to_string()));
            if self.fail {
                return Err(NotificationError::Transport("mock failure".to_string()));
            }
            Ok(())
        }
    }
}
