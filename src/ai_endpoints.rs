use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::error::{MembershipError, ServiceError};
use crate::match_engine::candidate_pool;
use crate::models::{SkillsInput, UserProfile};
use crate::session::current_session;

const MATCH_FAILURE: &str = "Failed to find matches. The AI might be busy, please try again.";
const IDEAS_FAILURE: &str = "Failed to get project ideas. The AI might be busy, please try again.";

#[derive(Deserialize, Default)]
pub struct IdeaInput {
    pub skills: Option<SkillsInput>,
    pub interests: Option<String>,
}

/// Top teammates for the caller, ranked by the engine.
pub async fn find_matches(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let (seeker, pool) = data
        .store
        .read(|r| -> Result<_, MembershipError> {
            let seeker = r.require_user(&session.user_id).map(UserProfile::from)?;
            Ok((seeker, candidate_pool(r, &session.user_id)))
        })
        .await?;

    let matches = data
        .engine
        .suggest_matches(&seeker, &pool)
        .await
        .map_err(|e| e.into_service_error(MATCH_FAILURE))?;
    info!(
        "Suggested {} teammates to {} from a pool of {}",
        matches.len(),
        seeker.user_id,
        pool.len()
    );
    Ok(HttpResponse::Ok().json(matches))
}

/// Project ideas for the given skills and interests, falling back to the
/// caller's profile for anything left out.
pub async fn suggest_ideas(
    data: web::Data<AppState>,
    req: HttpRequest,
    input: Option<web::Json<IdeaInput>>,
) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let input = input.map(web::Json::into_inner).unwrap_or_default();
    let profile = data
        .store
        .read(|r| r.require_user(&session.user_id).map(UserProfile::from))
        .await?;

    let skills = input
        .skills
        .map(SkillsInput::into_skills)
        .unwrap_or(profile.skills);
    let interests = input.interests.unwrap_or(profile.interests);

    let ideas = data
        .engine
        .project_ideas(&skills, &interests)
        .await
        .map_err(|e| e.into_service_error(IDEAS_FAILURE))?;
    Ok(HttpResponse::Ok().json(json!({ "ideas": ideas })))
}
