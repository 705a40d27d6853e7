use carebook_types::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// A message exchanged inside a consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub consultation_id: i64,
    pub sender_id: i64,
    pub sender_role: Role,
    /// The other participant of the consultation.
    pub recipient_id: i64,
    pub message: NonEmptyText,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub consultation_id: i64,
    pub message: String,
}
