use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::models::NotificationView;
use crate::session::current_session;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Confirmation {
    /// Set on the second attempt, after the user agreed to disband their team.
    #[serde(default)]
    pub force: bool,
}

// GET /notifications
// Pending invites and requests addressed to the caller, oldest first.
pub async fn list_notifications(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let inbox: Vec<NotificationView> = data
        .store
        .read(|r| {
            r.pending_for(&session.user_id)
                .into_iter()
                .map(|n| NotificationView {
                    team_name: r.team(&n.team_id).map(|t| t.name.clone()),
                    from_user_name: r.user(&n.from_user_id).map(|u| u.name.clone()),
                    requires_confirmation: r
                        .requires_disband_confirmation(&n.notification_id)
                        .unwrap_or(false),
                    notification: n.clone(),
                    status: "pending",
                })
                .collect()
        })
        .await;
    Ok(HttpResponse::Ok().json(inbox))
}

// POST /teams/{team_id}/invites
pub async fn send_invite(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<InviteRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let team_id = path.into_inner();
    let candidate_id = body.into_inner().user_id;
    let created = data
        .store
        .transact(move |r| r.create_invite(&team_id, &session.user_id, &candidate_id))
        .await?;
    Ok(creation_response(created))
}

// POST /teams/{team_id}/requests
// A requester who leads another team gets 409 HAS_TEAM_CONFIRM_REQUIRED and
// repeats the call with force=true.
pub async fn send_join_request(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<Confirmation>>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let team_id = path.into_inner();
    let force = body.map(|b| b.force).unwrap_or(false);
    let created = data
        .store
        .transact(move |r| r.create_join_request(&session.user_id, &team_id, force))
        .await?;
    Ok(creation_response(created))
}

// POST /notifications/{notification_id}/accept
// Answers 409 HAS_TEAM_CONFIRM_REQUIRED when an invitee would disband the team
// they lead; the client repeats the call with force=true.
pub async fn accept_notification(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<Confirmation>>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let notification_id = path.into_inner();
    let force = body.map(|b| b.force).unwrap_or(false);
    let acceptance = data
        .store
        .transact(move |r| r.resolve_acceptance(&notification_id, &session.user_id, force))
        .await?;
    Ok(HttpResponse::Ok().json(acceptance))
}

// DELETE /notifications/{notification_id}
pub async fn decline_notification(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let notification_id = path.into_inner();
    let declined = data
        .store
        .transact(move |r| r.decline_notification(&notification_id, &session.user_id))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": declined.notification_id })))
}

/// Duplicates are a no-op: 200 with `created: false` instead of 201.
fn creation_response(created: Option<crate::models::Notification>) -> HttpResponse {
    match created {
        Some(notification) => HttpResponse::Created().json(json!({
            "created": true,
            "notification": notification,
        })),
        None => HttpResponse::Ok().json(json!({ "created": false, "notification": null })),
    }
}
