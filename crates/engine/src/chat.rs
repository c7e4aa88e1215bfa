//! Chat-message producer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use herald_common::types::{Payload, kind};

use crate::fanout::{DispatchRequest, FanoutEngine};

/// Longest message preview, in characters, before truncation.
const PREVIEW_CHARS: usize = 100;

/// A message posted to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub participants: Vec<Uuid>,
    pub text: String,
}

impl ChatMessage {
    fn recipients(&self) -> Vec<Uuid> {
        self.participants
            .iter()
            .copied()
            .filter(|p| *p != self.sender_id)
            .collect()
    }

    fn preview(&self) -> String {
        if self.text.chars().count() <= PREVIEW_CHARS {
            return self.text.clone();
        }
        let mut preview: String = self.text.chars().take(PREVIEW_CHARS).collect();
        preview.push('…');
        preview
    }

    fn request(&self) -> DispatchRequest {
        let mut data = Payload::new();
        data.insert(
            "conversation_id".into(),
            Value::String(self.conversation_id.to_string()),
        );
        data.insert("message_id".into(), Value::String(self.message_id.to_string()));
        data.insert("sender_id".into(), Value::String(self.sender_id.to_string()));

        DispatchRequest::new(self.recipients(), self.sender_name.clone(), self.preview())
            .with_kind(kind::CHAT_MESSAGE)
            .with_data(data)
    }
}

pub struct ChatMessageProducer {
    engine: Arc<FanoutEngine>,
}

impl ChatMessageProducer {
    pub fn new(engine: Arc<FanoutEngine>) -> Self {
        Self { engine }
    }

    /// Submit in the background. Returns the number of recipients targeted.
    pub fn notify(&self, message: &ChatMessage) -> usize {
        let request = message.request();
        let count = request.recipients.len();
        if count == 0 {
            tracing::debug!(conversation_id = %message.conversation_id, "No chat recipients besides sender");
            return 0;
        }
        self.engine.submit(request);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(text: &str) -> ChatMessage {
        let sender = Uuid::new_v4();
        ChatMessage {
            conversation_id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            sender_id: sender,
            sender_name: "Dana".to_string(),
            participants: vec![sender, Uuid::new_v4()],
            text: text.to_string(),
        }
    }

    #[test]
    fn test_sender_is_not_a_recipient() {
        let m = message("hi");
        let request = m.request();
        assert_eq!(request.recipients.len(), 1);
        assert!(!request.recipients.contains(&m.sender_id));
        assert_eq!(request.content.title, "Dana");
        assert_eq!(request.content.notification_type, kind::CHAT_MESSAGE);
        assert_eq!(request.content.data["sender_id"], m.sender_id.to_string());
    }

    #[test]
    fn test_long_text_is_truncated() {
        let long = "é".repeat(150);
        let preview = message(&long).preview();
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));

        assert_eq!(message("short").preview(), "short");
    }
}
