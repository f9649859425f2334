use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TEAM_SIZE_LIMIT;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Team {
    pub team_id: String,
    pub name: String,
    pub leader_id: String,
    /// Ordered roster, leader first. Never empty, never above the size limit.
    pub member_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn is_full(&self) -> bool {
        self.member_ids.len() >= TEAM_SIZE_LIMIT
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == user_id)
    }

    pub fn role_of(&self, user_id: &str) -> Option<TeamRole> {
        if self.leader_id == user_id {
            Some(TeamRole::Leader)
        } else if self.has_member(user_id) {
            Some(TeamRole::Member)
        } else {
            None
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Leader,
    Member,
}
