// File: chat.rs

use actix::Addr;
use actix_web::{web, HttpRequest, HttpResponse};
use log::error;

use crate::app_state::AppState;
use crate::chat_server::{ChatServer, FetchHistory, PostMessage};
use crate::error::{MembershipError, ServiceError};
use crate::models::{SendMessageRequest, TeamMessage};
use crate::session::current_session;
use crate::store::MatchStore;

/// Name of `user_id` if they are currently on `team_id`, with the roster.
async fn member_name(store: &MatchStore, team_id: &str, user_id: &str) -> Result<(String, Vec<String>), ServiceError> {
    let member = store
        .read(|r| -> Result<(String, Vec<String>), MembershipError> {
            let team = r.require_team(team_id)?;
            if !team.has_member(user_id) {
                return Err(MembershipError::NotMember);
            }
            Ok((r.require_user(user_id)?.name.clone(), team.member_ids.clone()))
        })
        .await?;
    Ok(member)
}

/// Validates and posts a message on behalf of a team member. Shared by the
/// REST endpoint and the websocket session.
pub async fn post_team_message(
    store: &MatchStore,
    chat_server: &Addr<ChatServer>,
    team_id: &str,
    user_id: &str,
    content: &str,
) -> Result<TeamMessage, ServiceError> {
    if content.trim().is_empty() {
        return Err(ServiceError::bad_request("Message content cannot be empty"));
    }
    let (sender_name, member_ids) = member_name(store, team_id, user_id).await?;
    let message = TeamMessage::new(team_id, user_id, &sender_name, content);

    chat_server
        .send(PostMessage { message, member_ids })
        .await
        .map_err(|e| {
            error!("Chat server unavailable: {}", e);
            ServiceError::InternalServerError
        })?
}

// GET /teams/{team_id}/messages
pub async fn get_messages(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let team_id = path.into_inner();
    member_name(&data.store, &team_id, &session.user_id).await?;

    let messages = data
        .chat_server
        .send(FetchHistory { team_id })
        .await
        .map_err(|e| {
            error!("Chat server unavailable: {}", e);
            ServiceError::InternalServerError
        })??;
    Ok(HttpResponse::Ok().json(messages))
}

// POST /teams/{team_id}/messages
pub async fn create_message(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let team_id = path.into_inner();
    let message = post_team_message(
        &data.store,
        &data.chat_server,
        &team_id,
        &session.user_id,
        &body.content,
    )
    .await?;
    Ok(HttpResponse::Created().json(message))
}
