use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::models::{SkillsInput, UserProfile};
use crate::registry::ProfilePatch;
use crate::session::current_session;

// ─── REQUEST PAYLOADS ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub major: Option<String>,
    pub academic_year: Option<String>,
    pub skills: Option<SkillsInput>,
    pub interests: Option<String>,
    pub project_idea: Option<String>,
    pub avatar_url: Option<String>,
    pub is_open_to_teams: Option<bool>,
}

// ─── ENDPOINTS ────────────────────────────────────────────────────────────────

// GET /users
pub async fn list_users(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    current_session(&req)?;
    let users = data.store.read(|r| r.profiles()).await;
    Ok(HttpResponse::Ok().json(users))
}

// GET /users/{user_id}
pub async fn get_user_by_id(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    current_session(&req)?;
    let user_id = path.into_inner();
    let user = data
        .store
        .read(|r| r.require_user(&user_id).map(UserProfile::from))
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

// PUT /users/me
// Email and team membership are not editable here.
pub async fn update_profile(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let body = body.into_inner();
    if matches!(&body.name, Some(name) if name.trim().is_empty()) {
        return Err(ServiceError::bad_request("Name cannot be empty"));
    }

    let patch = ProfilePatch {
        name: body.name,
        major: body.major,
        academic_year: body.academic_year,
        skills: body.skills.map(SkillsInput::into_skills),
        interests: body.interests,
        project_idea: body.project_idea,
        avatar_url: body.avatar_url,
        is_open_to_teams: body.is_open_to_teams,
    };
    let user_id = session.user_id.clone();
    let user = data
        .store
        .transact(move |r| r.update_profile(&user_id, patch))
        .await?;
    info!("User {} updated their profile", user.user_id);
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}
