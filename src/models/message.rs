// File: message.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TeamMessage {
    pub message_id: String,
    pub team_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TeamMessage {
    pub fn new(team_id: &str, sender_id: &str, sender_name: &str, content: &str) -> Self {
        TeamMessage {
            message_id: Uuid::new_v4().to_string(),
            team_id: team_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            content: content.trim().to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}
