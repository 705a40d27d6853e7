//! Notifications and consultation chat.

use carebook_core::models::{ChatMessage, Notification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationRes {
    pub id: i64,
    pub user_id: i64,
    #[schema(example = "appointment_created")]
    pub kind: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationRes {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            kind: n.kind.as_str().to_string(),
            message: n.message,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageReq {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub id: i64,
    pub consultation_id: i64,
    pub sender_id: i64,
    pub sender_role: String,
    pub recipient_id: i64,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

impl From<ChatMessage> for MessageRes {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            consultation_id: m.consultation_id,
            sender_id: m.sender_id,
            sender_role: m.sender_role.to_string(),
            recipient_id: m.recipient_id,
            message: m.message.into_inner(),
            sent_at: m.sent_at,
            is_read: m.is_read,
        }
    }
}
