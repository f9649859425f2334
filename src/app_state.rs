use crate::chat_server::ChatServer;
use crate::config::Config;
use crate::match_engine::MatchEngine;
use crate::session::SessionRegistry;
use crate::store::MatchStore;
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub chat_server: Addr<ChatServer>,
    pub store: Arc<MatchStore>,
    pub sessions: Arc<SessionRegistry>,
    pub engine: Arc<MatchEngine>,
    pub config: Config,
}
