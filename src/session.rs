//! Explicit login sessions. A session is opened at login or registration,
//! closed at logout, and a bearer token is only honoured while its session
//! is open and unexpired.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use actix_web::{HttpMessage, HttpRequest};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::error::ServiceError;

/// The authenticated caller, attached to each request by the middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionRegistry {
    active: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl_hours: i64) -> Self {
        SessionRegistry {
            active: RwLock::new(HashMap::new()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn start(&self, user_id: &str) -> Session {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + self.ttl,
        };
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.retain(|_, s| s.expires_at > Utc::now());
        active.insert(session.session_id.clone(), session.clone());
        info!("Session {} opened for user {}", session.session_id, user_id);
        session
    }

    /// Returns the open session for `session_id`, dropping it if expired.
    pub fn resolve(&self, session_id: &str) -> Option<Session> {
        let session = {
            let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
            active.get(session_id).cloned()
        }?;
        if session.expires_at <= Utc::now() {
            debug!("Session {} expired", session_id);
            self.end(session_id);
            return None;
        }
        Some(session)
    }

    pub fn end(&self, session_id: &str) -> bool {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        active.remove(session_id).is_some()
    }
}

/// Marks a request whose bearer token named an ended or expired session.
#[derive(Debug, Clone, Copy)]
pub struct RejectedToken;

/// The session the middleware attached to this request.
pub fn current_session(req: &HttpRequest) -> Result<Session, ServiceError> {
    let extensions = req.extensions();
    if let Some(session) = extensions.get::<Session>() {
        return Ok(session.clone());
    }
    if extensions.get::<RejectedToken>().is_some() {
        return Err(ServiceError::Unauthorized { code: "SESSION_EXPIRED" });
    }
    Err(ServiceError::unauthorized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ended_session_no_longer_resolves() {
        let sessions = SessionRegistry::new(1);
        let session = sessions.start("user-1");
        assert_eq!(sessions.resolve(&session.session_id), Some(session.clone()));

        assert!(sessions.end(&session.session_id));
        assert!(sessions.resolve(&session.session_id).is_none());
        assert!(!sessions.end(&session.session_id));
    }

    #[test]
    fn expired_session_is_dropped() {
        let sessions = SessionRegistry::new(0);
        let session = sessions.start("user-1");
        assert!(sessions.resolve(&session.session_id).is_none());
    }
}
