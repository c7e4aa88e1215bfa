//! Push message shaping.
//!
//! Every outbound push carries the same static platform blocks: Android gets a
//! high-priority hint plus a notification channel, iOS gets an APNs alert with
//! a sound and badge hint. Only title, body and data vary per message.

use std::collections::BTreeMap;

use serde::Serialize;

use herald_common::types::NotificationContent;

/// Click action the mobile client routes on.
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

/// Content of one push, shared by every token of a multicast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// FCM data values must be strings.
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    /// Flatten notification content into a push message.
    ///
    /// `type` and `click_action` are always present; payload entries follow and
    /// may override them. Strings pass through, every other value is sent as
    /// its JSON text.
    pub fn from_content(content: &NotificationContent) -> Self {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), content.notification_type.clone());
        data.insert("click_action".to_string(), CLICK_ACTION.to_string());

        for (key, value) in &content.data {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            data.insert(key.clone(), text);
        }

        Self {
            title: content.title.clone(),
            body: content.body.clone(),
            data,
        }
    }
}

/// FCM HTTP v1 request body.
#[derive(Debug, Serialize)]
pub struct FcmMessage<'a> {
    pub message: FcmMessageContent<'a>,
}

#[derive(Debug, Serialize)]
pub struct FcmMessageContent<'a> {
    pub token: &'a str,
    pub notification: FcmNotification<'a>,
    pub data: &'a BTreeMap<String, String>,
    pub android: AndroidConfig<'a>,
    pub apns: ApnsConfig<'a>,
}

#[derive(Debug, Serialize)]
pub struct FcmNotification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AndroidConfig<'a> {
    pub priority: &'static str,
    pub notification: AndroidNotification<'a>,
}

#[derive(Debug, Serialize)]
pub struct AndroidNotification<'a> {
    pub click_action: &'static str,
    pub channel_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ApnsConfig<'a> {
    pub headers: ApnsHeaders,
    pub payload: ApnsPayload<'a>,
}

#[derive(Debug, Serialize)]
pub struct ApnsHeaders {
    #[serde(rename = "apns-priority")]
    pub priority: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApnsPayload<'a> {
    pub aps: Aps<'a>,
}

#[derive(Debug, Serialize)]
pub struct Aps<'a> {
    pub alert: FcmNotification<'a>,
    pub sound: &'static str,
    pub badge: u32,
}

impl<'a> FcmMessage<'a> {
    /// Address `message` to a single device token.
    pub fn for_token(token: &'a str, message: &'a PushMessage, android_channel_id: &'a str) -> Self {
        Self {
            message: FcmMessageContent {
                token,
                notification: FcmNotification {
                    title: &message.title,
                    body: &message.body,
                },
                data: &message.data,
                android: AndroidConfig {
                    priority: "high",
                    notification: AndroidNotification {
                        click_action: CLICK_ACTION,
                        channel_id: android_channel_id,
                    },
                },
                apns: ApnsConfig {
                    headers: ApnsHeaders { priority: "10" },
                    payload: ApnsPayload {
                        aps: Aps {
                            alert: FcmNotification {
                                title: &message.title,
                                body: &message.body,
                            },
                            sound: "default",
                            badge: 1,
                        },
                    },
                },
            },
        }
    }
}
