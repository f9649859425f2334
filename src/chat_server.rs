use crate::db::MongoDB;
use crate::error::ServiceError;
use crate::models::TeamMessage;
use actix::prelude::*;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Pushed to every websocket session of a team.
#[derive(Message, Serialize, Clone, Debug)]
#[rtype(result = "()")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Message { message: TeamMessage },
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub team_id: String,
    pub user_id: String,
    pub addr: Recipient<WsMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub team_id: String,
    pub user_id: String,
    pub addr: Recipient<WsMessage>,
}

/// Appends a message to its team's log and fans it out to connections of
/// users still on `member_ids`. The sender's membership is checked before
/// this is sent.
#[derive(Message)]
#[rtype(result = "Result<TeamMessage, ServiceError>")]
pub struct PostMessage {
    pub message: TeamMessage,
    pub member_ids: Vec<String>,
}

#[derive(Message)]
#[rtype(result = "Result<Vec<TeamMessage>, ServiceError>")]
pub struct FetchHistory {
    pub team_id: String,
}

pub struct ChatServer {
    // Several connections per team, one per open client, with their user.
    sessions: HashMap<String, Vec<(String, Recipient<WsMessage>)>>,
    // Message log used when no database is configured.
    history: HashMap<String, Vec<TeamMessage>>,
    db: Option<Arc<MongoDB>>,
}

impl ChatServer {
    pub fn new(db: Option<Arc<MongoDB>>) -> Self {
        ChatServer {
            sessions: HashMap::new(),
            history: HashMap::new(),
            db,
        }
    }

    /// Connections of users on the current roster. Anyone removed since
    /// connecting is skipped.
    fn recipients(&self, team_id: &str, member_ids: &[String]) -> Vec<Recipient<WsMessage>> {
        self.sessions
            .get(team_id)
            .map(|addrs| {
                addrs
                    .iter()
                    .filter(|(user_id, _)| member_ids.contains(user_id))
                    .map(|(_, addr)| addr.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn broadcast(recipients: &[Recipient<WsMessage>], message: &TeamMessage) {
    for addr in recipients {
        addr.do_send(WsMessage::Message {
            message: message.clone(),
        });
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!("User {} connected (WS) to team {}", msg.user_id, msg.team_id);
        self.sessions
            .entry(msg.team_id)
            .or_default()
            .push((msg.user_id, msg.addr));
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!("User {} disconnected (WS) from team {}", msg.user_id, msg.team_id);
        if let Some(addrs) = self.sessions.get_mut(&msg.team_id) {
            // Remove only the connection that matches the provided address.
            addrs.retain(|(_, a)| a != &msg.addr);
            if addrs.is_empty() {
                self.sessions.remove(&msg.team_id);
            }
        }
    }
}

impl Handler<PostMessage> for ChatServer {
    type Result = ResponseFuture<Result<TeamMessage, ServiceError>>;

    fn handle(&mut self, msg: PostMessage, _: &mut Context<Self>) -> Self::Result {
        let message = msg.message;
        let recipients = self.recipients(&message.team_id, &msg.member_ids);
        debug!(
            "Message {} for team {} ({} live sessions)",
            message.message_id,
            message.team_id,
            recipients.len()
        );

        match self.db.clone() {
            Some(db) => Box::pin(async move {
                db.insert_message(&message).await?;
                broadcast(&recipients, &message);
                Ok(message)
            }),
            None => {
                self.history
                    .entry(message.team_id.clone())
                    .or_default()
                    .push(message.clone());
                broadcast(&recipients, &message);
                Box::pin(async move { Ok(message) })
            }
        }
    }
}

impl Handler<FetchHistory> for ChatServer {
    type Result = ResponseFuture<Result<Vec<TeamMessage>, ServiceError>>;

    fn handle(&mut self, msg: FetchHistory, _: &mut Context<Self>) -> Self::Result {
        match self.db.clone() {
            Some(db) => Box::pin(async move { Ok(db.team_messages(&msg.team_id).await?) }),
            None => {
                let log = self.history.get(&msg.team_id).cloned().unwrap_or_default();
                Box::pin(async move { Ok(log) })
            }
        }
    }
}
