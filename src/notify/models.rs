use serde::{Deserialize, Serialize};

/// A browser push subscription. `endpoint` is the unique key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    // Milliseconds since the epoch, as reported by the browser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
}

impl PushSubscription {
    pub fn new(endpoint: &str, p256dh: &str, auth: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            p256dh: p256dh.to_string(),
            auth: auth.to_string(),
            expiration_time: None,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
/// Application specific notification data. The service worker reads
/// this in the `notificationclick` event.
pub struct PushNotificationData {
    // The URL to open when the notification is clicked
    pub url: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PushNotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    // When a tag is set, sending new notifications with the same tag
    // will update the user's notification if they have not interacted
    // with it yet.
    pub tag: Option<String>,
    pub data: PushNotificationData,
}

impl PushNotificationPayload {
    pub fn new(title: &str, body: &str, url: Option<&str>, tag: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            tag: tag.map(|s| s.to_string()),
            data: PushNotificationData {
                url: url.map(|u| u.to_string()).unwrap_or("/".to_string()),
            },
        }
    }
}

/// Result of a single delivery attempt to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The push service says the endpoint will never accept messages again
    Gone,
    TransientFailure { reason: String },
}

impl DeliveryOutcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        DeliveryOutcome::TransientFailure {
            reason: reason.into(),
        }
    }
}

/// Aggregate counts for one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Endpoints reported gone
    pub gone: usize,
    /// Gone endpoints deleted from the store
    pub removed: usize,
    pub transient: usize,
}
