use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Leader asks a candidate to join.
    Invite,
    /// Candidate asks a team's leader to be let in.
    Request,
}

/// A pending invite or join request. Resolving it (accept or decline)
/// deletes the record, so every stored notification is pending.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub notification_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub team_id: String,
    pub from_user_id: String,
    /// Invitee for invites, the team leader for requests.
    pub to_user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, team_id: &str, from_user_id: &str, to_user_id: &str) -> Self {
        Notification {
            notification_id: uuid::Uuid::new_v4().to_string(),
            kind,
            team_id: team_id.to_string(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            created_at: Utc::now(),
        }
    }

    /// The user who ends up on the team if this is accepted.
    pub fn joining_user_id(&self) -> &str {
        match self.kind {
            NotificationKind::Invite => &self.to_user_id,
            NotificationKind::Request => &self.from_user_id,
        }
    }

    /// Whether this record is an invite to `user_id` or a request from them.
    pub fn concerns_candidate(&self, user_id: &str) -> bool {
        self.joining_user_id() == user_id
    }
}

/// A notification enriched for display in the recipient's inbox.
#[derive(Debug, Serialize, Clone)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub team_name: Option<String>,
    pub from_user_name: Option<String>,
    pub status: &'static str,
    /// Accepting would disband a team the joining user leads.
    pub requires_confirmation: bool,
}
