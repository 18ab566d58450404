//! Public types for the push API

use serde::{Deserialize, Serialize};

use crate::notify::FanoutReport;

#[derive(Deserialize, Debug)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// The JSON form of a browser `PushSubscription`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionRequest {
    pub endpoint: String,
    #[serde(default)]
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

#[derive(Serialize, Debug)]
pub struct SubscriptionResponse {
    pub success: bool,
    pub endpoint: String,
}

#[derive(Deserialize, Debug)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub tag: Option<String>,
    // Mail side channel recipient. Accepted for compatibility, mail is
    // not sent from here.
    pub email: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct NotificationResponse {
    pub success: bool,
    pub report: FanoutReport,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VapidPublicKeyResponse {
    pub public_key: String,
}
