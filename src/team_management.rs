// team_management.rs

use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::models::{Team, TeamRole, UserProfile};
use crate::session::current_session;

// ─── REQUEST / RESPONSE PAYLOADS ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
}

/// The caller's team view. All fields are null when they are on no team.
#[derive(Debug, Serialize)]
pub struct MyTeam {
    pub team: Option<Team>,
    pub role: Option<TeamRole>,
    pub members: Vec<UserProfile>,
}

// ─── ENDPOINTS ────────────────────────────────────────────────────────────────

// GET /teams/mine
pub async fn get_my_team(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let view = data
        .store
        .read(|r| match r.team_of(&session.user_id) {
            Some((team, role)) => MyTeam {
                members: r.members_of(team),
                team: Some(team.clone()),
                role: Some(role),
            },
            None => MyTeam {
                team: None,
                role: None,
                members: Vec::new(),
            },
        })
        .await;
    Ok(HttpResponse::Ok().json(view))
}

// POST /teams
pub async fn create_team(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateTeamRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let name = body.into_inner().name;
    let team = data
        .store
        .transact(move |r| r.create_team(&name, &session.user_id))
        .await?;
    Ok(HttpResponse::Created().json(team))
}

// DELETE /teams/{team_id}
pub async fn delete_team(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let team_id = path.into_inner();
    let team = data
        .store
        .transact(move |r| r.delete_team(&team_id, &session.user_id))
        .await?;
    info!("Team {} deleted by its leader", team.team_id);
    Ok(HttpResponse::Ok().json(json!({ "deleted": team.team_id })))
}

// POST /teams/{team_id}/leave
pub async fn leave_team(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let team_id = path.into_inner();
    let remaining = data
        .store
        .transact(move |r| r.leave_team(&team_id, &session.user_id))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "team": remaining })))
}

// DELETE /teams/{team_id}/members/{user_id}
pub async fn remove_team_member(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let (team_id, user_id) = path.into_inner();
    let team = data
        .store
        .transact(move |r| r.remove_member(&team_id, &session.user_id, &user_id))
        .await?;
    Ok(HttpResponse::Ok().json(team))
}
