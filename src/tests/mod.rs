
use std::sync::Arc;

use actix::Actor;
use actix_web::{test, web};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::chat_server::ChatServer;
use crate::config::Config;
use crate::match_engine::MatchEngine;
use crate::session::SessionRegistry;
use crate::store::MatchStore;

/// In-memory application state. Must be built inside a running actix system.
pub(crate) fn test_state(ai_endpoint: &str) -> web::Data<AppState> {
    let config = Config::for_tests(ai_endpoint);
    web::Data::new(AppState {
        chat_server: ChatServer::new(None).start(),
        store: Arc::new(MatchStore::with_registry(Default::default(), None)),
        sessions: Arc::new(SessionRegistry::new(config.session_ttl_hours)),
        engine: Arc::new(MatchEngine::new(&config).unwrap()),
        config,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthBody {
    pub token: String,
    pub user: crate::models::UserProfile,
}

pub(crate) fn register_request(name: &str) -> test::TestRequest {
    test::TestRequest::post().uri("/auth/register").set_json(json!({
        "email": format!("{}@example.com", name.to_lowercase()),
        "password": "hunter22",
        "name": name,
        "major": "Computer Science",
        "academic_year": "Junior",
        "skills": "Rust, SQL",
        "interests": "climate tech",
    }))
}

pub(crate) fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
