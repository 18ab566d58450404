use std::time::Duration;

use anyhow::{Context, Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushError, WebPushMessage,
    WebPushMessageBuilder,
};

use super::models::{DeliveryOutcome, PushSubscription};
use crate::core::{VapidConfig, VapidPrivateKey};

/// Sends one payload to one subscription. Failures are reported as a
/// `DeliveryOutcome`, never as an error or panic.
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryOutcome;
}

enum SigningKey {
    Base64(String),
    Pem(Vec<u8>),
}

/// Web push delivery (RFC 8030) with VAPID authentication (RFC 8292).
///
/// The `web-push` crate handles payload encryption and signing, the
/// request itself goes out on a shared `reqwest::Client` so the response
/// status can be classified here.
pub struct WebPushDeliveryClient {
    http: reqwest::Client,
    subject: String,
    key: SigningKey,
    ttl: u32,
}

impl WebPushDeliveryClient {
    pub fn new(vapid: &VapidConfig, send_timeout: Duration, ttl: u32) -> Result<Self, Error> {
        let key = match &vapid.private_key {
            VapidPrivateKey::Base64(key) => SigningKey::Base64(key.clone()),
            VapidPrivateKey::PemPath(path) => SigningKey::Pem(
                std::fs::read(path)
                    .with_context(|| format!("Failed to read VAPID key {}", path.display()))?,
            ),
        };
        let http = reqwest::Client::builder()
            .timeout(send_timeout)
            .build()
            .context("Failed to build push HTTP client")?;

        Ok(Self {
            http,
            subject: vapid.subject.clone(),
            key,
            ttl,
        })
    }

    fn build_message(
        &self,
        subscription: &PushSubscription,
        payload: &[u8],
    ) -> Result<WebPushMessage, WebPushError> {
        let subscription_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.p256dh,
            &subscription.auth,
        );

        let mut sig_builder = match &self.key {
            SigningKey::Base64(key) => {
                VapidSignatureBuilder::from_base64(key, &subscription_info)?
            }
            SigningKey::Pem(pem) => {
                VapidSignatureBuilder::from_pem(pem.as_slice(), &subscription_info)?
            }
        };
        sig_builder.add_claim("sub", self.subject.as_str());
        let signature = sig_builder.build()?;

        let mut builder = WebPushMessageBuilder::new(&subscription_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.ttl);
        builder.build()
    }
}

#[async_trait]
impl PushClient for WebPushDeliveryClient {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryOutcome {
        let message = match self.build_message(subscription, payload) {
            Ok(message) => message,
            Err(e) => return DeliveryOutcome::transient(format!("Invalid push message: {}", e)),
        };

        let mut request = self
            .http
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return DeliveryOutcome::transient("Push request timed out");
            }
            Err(e) => return DeliveryOutcome::transient(format!("Push request failed: {}", e)),
        };

        let status = response.status();
        match classify_status(status) {
            DeliveryOutcome::TransientFailure { .. } => {
                let body = response.text().await.unwrap_or_default();
                DeliveryOutcome::transient(format!("Push service returned {}: {}", status, body))
            }
            outcome => outcome,
        }
    }
}

/// Maps a push service response status to an outcome. Only 404 and 410
/// are definitive; rate limiting and server errors may clear up.
pub fn classify_status(status: StatusCode) -> DeliveryOutcome {
    match status {
        s if s.is_success() => DeliveryOutcome::Delivered,
        StatusCode::NOT_FOUND | StatusCode::GONE => DeliveryOutcome::Gone,
        s => DeliveryOutcome::transient(format!("Push service returned {}", s)),
    }
}
