use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_state::AppState;
use crate::chat::post_team_message;
use crate::chat_server::{ChatServer, Connect, Disconnect, WsMessage};
use crate::error::{MembershipError, ServiceError};
use crate::models::SendMessageRequest;
use crate::session::current_session;
use crate::store::MatchStore;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// A live chat connection for one member of one team.
pub struct WebSocketConnection {
    pub user_id: String,
    pub team_id: String,
    pub hb: Instant,
    pub addr: Addr<ChatServer>,
    pub store: Arc<MatchStore>,
}

impl Actor for WebSocketConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        self.addr
            .send(Connect {
                team_id: self.team_id.clone(),
                user_id: self.user_id.clone(),
                addr: ctx.address().recipient(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                if res.is_err() {
                    warn!("User {} failed to register with chat server", act.user_id);
                    ctx.stop();
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.addr.do_send(Disconnect {
            team_id: self.team_id.clone(),
            user_id: self.user_id.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl WebSocketConnection {
    pub fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                info!("WebSocket heartbeat failed for user {}, disconnecting", act.user_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn post(&self, content: String, ctx: &mut ws::WebsocketContext<Self>) {
        let store = self.store.clone();
        let server = self.addr.clone();
        let team_id = self.team_id.clone();
        let user_id = self.user_id.clone();
        let send = async move {
            post_team_message(&store, &server, &team_id, &user_id, &content).await
        };
        send.into_actor(self)
            .map(|res, act, ctx| {
                if let Err(e) = res {
                    warn!("Message from user {} rejected: {}", act.user_id, e);
                    let reply = serde_json::json!({ "type": "error", "code": e.code(), "message": e.to_string() });
                    ctx.text(reply.to_string());
                }
            })
            .spawn(ctx);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<SendMessageRequest>(&text) {
                Ok(incoming) => self.post(incoming.content, ctx),
                Err(e) => debug!("Failed to parse message from user {}: {}", self.user_id, e),
            },
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("WebSocket error for user {}: {}", self.user_id, e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<WsMessage> for WebSocketConnection {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(&msg) {
            Ok(outgoing) => ctx.text(outgoing),
            Err(e) => warn!("Failed to encode message for user {}: {}", self.user_id, e),
        }
    }
}

// GET /ws
// Joins the caller to their team's live chat. The token may come as a
// `token` query parameter since browsers cannot set headers on upgrades.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let session = current_session(&req)?;
    let team_id = data
        .store
        .read(|r| r.team_of(&session.user_id).map(|(team, _)| team.team_id.clone()))
        .await
        .ok_or_else(|| ServiceError::from(MembershipError::NotMember))?;

    let connection = WebSocketConnection {
        user_id: session.user_id,
        team_id,
        hb: Instant::now(),
        addr: data.chat_server.clone(),
        store: data.store.clone(),
    };
    ws::start(connection, &req, stream)
}
