use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures of the membership coordinator and the reconciler. Every variant
/// is raised before any mutation becomes visible.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MembershipError {
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Team not found: {0}")]
    TeamNotFound(String),
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),
    #[error("An account with this email already exists.")]
    EmailTaken,
    #[error("Team name cannot be empty")]
    EmptyTeamName,
    #[error("Only the team leader can do this")]
    NotLeader,
    #[error("User is not a member of this team")]
    NotMember,
    #[error("This notification is not addressed to you")]
    NotAddressee,
    #[error("The team leader cannot leave; disband the team instead")]
    LeaderCannotLeave,
    #[error("The team leader cannot be removed from the team")]
    CannotRemoveLeader,
    #[error("User already belongs to a team")]
    AlreadyOnTeam,
    #[error("User is already a member of this team")]
    AlreadyMember,
    #[error("Team is full")]
    TeamFull,
    #[error("Joining will disband the team you lead; confirm to continue")]
    ConfirmationRequired,
}

impl MembershipError {
    pub fn code(&self) -> &'static str {
        match self {
            MembershipError::UserNotFound(_) => "USER_NOT_FOUND",
            MembershipError::TeamNotFound(_) => "TEAM_NOT_FOUND",
            MembershipError::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            MembershipError::EmailTaken => "EMAIL_TAKEN",
            MembershipError::EmptyTeamName => "EMPTY_TEAM_NAME",
            MembershipError::NotLeader => "NOT_LEADER",
            MembershipError::NotMember => "NOT_A_MEMBER",
            MembershipError::NotAddressee => "NOT_ADDRESSEE",
            MembershipError::LeaderCannotLeave => "LEADER_CANNOT_LEAVE",
            MembershipError::CannotRemoveLeader => "CANNOT_REMOVE_LEADER",
            MembershipError::AlreadyOnTeam => "ALREADY_ON_TEAM",
            MembershipError::AlreadyMember => "ALREADY_MEMBER",
            MembershipError::TeamFull => "TEAM_FULL",
            MembershipError::ConfirmationRequired => "HAS_TEAM_CONFIRM_REQUIRED",
        }
    }
}

// Custom error types
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    BadRequest { code: &'static str, message: String },
    #[error("Unauthorized")]
    Unauthorized { code: &'static str },
    #[error("{message}")]
    Forbidden { code: &'static str, message: String },
    #[error("{message}")]
    NotFound { code: &'static str, message: String },
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{0}")]
    Upstream(String),
    #[error("Internal Server Error")]
    InternalServerError,
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest { code: "BAD_REQUEST", message: message.into() }
    }

    pub fn unauthorized() -> Self {
        ServiceError::Unauthorized { code: "UNAUTHORIZED" }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest { code, .. }
            | ServiceError::Unauthorized { code }
            | ServiceError::Forbidden { code, .. }
            | ServiceError::NotFound { code, .. }
            | ServiceError::Conflict { code, .. } => *code,
            ServiceError::Upstream(_) => "AI_UNAVAILABLE",
            ServiceError::InternalServerError => "INTERNAL",
        }
    }
}

impl From<MembershipError> for ServiceError {
    fn from(err: MembershipError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            MembershipError::UserNotFound(_)
            | MembershipError::TeamNotFound(_)
            | MembershipError::NotificationNotFound(_) => ServiceError::NotFound { code, message },
            MembershipError::NotLeader | MembershipError::NotMember | MembershipError::NotAddressee => {
                ServiceError::Forbidden { code, message }
            }
            MembershipError::EmailTaken
            | MembershipError::EmptyTeamName
            | MembershipError::LeaderCannotLeave
            | MembershipError::CannotRemoveLeader => ServiceError::BadRequest { code, message },
            MembershipError::AlreadyOnTeam
            | MembershipError::AlreadyMember
            | MembershipError::TeamFull
            | MembershipError::ConfirmationRequired => ServiceError::Conflict { code, message },
        }
    }
}

impl From<mongodb::error::Error> for ServiceError {
    fn from(err: mongodb::error::Error) -> Self {
        log::error!("MongoDB error: {}", err);
        ServiceError::InternalServerError
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Conflict { .. } => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string(),
            "code": self.code(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_gate_is_a_distinguishable_conflict() {
        let err = ServiceError::from(MembershipError::ConfirmationRequired);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "HAS_TEAM_CONFIRM_REQUIRED");
    }

    #[test]
    fn authorization_failures_map_to_forbidden() {
        let err = ServiceError::from(MembershipError::NotLeader);
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "NOT_LEADER");
    }

    #[test]
    fn capacity_failures_map_to_conflict() {
        let err = ServiceError::from(MembershipError::TeamFull);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "TEAM_FULL");
    }
}
