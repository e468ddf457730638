//! Messaging domain models.
//!
//! Peer messages flow between stacks (direct or broadcast); user messages
//! come from human visitors chatting with a team.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a peer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Broadcast,
    Direct,
    Visitor,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Direct => "direct",
            Self::Visitor => "visitor",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "broadcast" => Some(Self::Broadcast),
            "direct" => Some(Self::Direct),
            "visitor" => Some(Self::Visitor),
            _ => None,
        }
    }
}

/// A message between stacks. Absent `to_stack_id` means broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from_stack_id: Option<Uuid>,
    pub to_stack_id: Option<Uuid>,
    pub message_type: MessageType,
    pub content: String,
    /// Stacks that have consumed this message. Append-only set.
    pub read_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn direct(from: Uuid, to: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_stack_id: Some(from),
            to_stack_id: Some(to),
            message_type: MessageType::Direct,
            content: content.into(),
            read_by: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn broadcast(from: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_stack_id: Some(from),
            to_stack_id: None,
            message_type: MessageType::Broadcast,
            content: content.into(),
            read_by: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_read_by(&self, stack_id: Uuid) -> bool {
        self.read_by.contains(&stack_id)
    }
}

/// A chat message from a human visitor to a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: Uuid,
    /// The stack this visitor is talking to.
    pub team_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub processed: bool,
    /// Links to the communicator's reply once processed.
    pub response_id: Option<Uuid>,
}

impl UserMessage {
    pub fn new(team_id: Uuid, sender_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            team_id,
            sender_name: sender_name.into(),
            content: content.into(),
            sent_at: Utc::now(),
            processed: false,
            response_id: None,
        }
    }
}
