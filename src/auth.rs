use std::sync::OnceLock;

use actix_web::{web, HttpRequest, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::models::{SkillsInput, User, UserProfile};
use crate::registry::NewUser;
use crate::session::{current_session, Session};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Session the token was issued for.
    pub sid: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Deserialize)]
pub struct RegisterInfo {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default)]
    pub skills: SkillsInput,
    #[serde(default)]
    pub interests: String,
    #[serde(default)]
    pub project_idea: String,
    pub avatar_url: Option<String>,
    #[serde(default = "default_open")]
    pub is_open_to_teams: bool,
}

fn default_open() -> bool {
    true
}

#[derive(Deserialize)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordResetInfo {
    pub email: String,
}

#[derive(Serialize)]
struct AuthResponse {
    token: String,
    expires_at: DateTime<Utc>,
    user: UserProfile,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_pattern().is_match(email.trim())
}

// JWT Creation
pub fn create_jwt(session: &Session, secret: &str) -> Result<String, ServiceError> {
    let claims = Claims {
        sub: session.user_id.clone(),
        sid: session.session_id.clone(),
        exp: session.expires_at.timestamp() as usize,
        iat: Utc::now().timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).map_err(|e| {
        warn!("Failed to sign token: {}", e);
        ServiceError::InternalServerError
    })
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

async fn hash_password(password: String) -> Result<String, ServiceError> {
    web::block(move || hash(password, HASH_COST))
        .await
        .map_err(|_| ServiceError::InternalServerError)?
        .map_err(|e| {
            warn!("Error hashing password: {}", e);
            ServiceError::InternalServerError
        })
}

async fn password_matches(password: String, password_hash: String) -> Result<bool, ServiceError> {
    web::block(move || verify(password, &password_hash).unwrap_or(false))
        .await
        .map_err(|_| ServiceError::InternalServerError)
}

fn open_session(data: &AppState, user: &User) -> Result<AuthResponse, ServiceError> {
    let session = data.sessions.start(&user.user_id);
    let token = create_jwt(&session, &data.config.jwt_secret)?;
    Ok(AuthResponse {
        token,
        expires_at: session.expires_at,
        user: UserProfile::from(user),
    })
}

// Register Endpoint
pub async fn register(
    data: web::Data<AppState>,
    info: web::Json<RegisterInfo>,
) -> Result<HttpResponse, ServiceError> {
    let info = info.into_inner();
    if !is_valid_email(&info.email) {
        return Err(ServiceError::bad_request("A valid email address is required"));
    }
    if info.name.trim().is_empty() {
        return Err(ServiceError::bad_request("Name is required"));
    }
    if info.password.is_empty() {
        return Err(ServiceError::bad_request("Password is required"));
    }

    let password_hash = hash_password(info.password).await?;
    let new_user = NewUser {
        email: info.email,
        password_hash,
        name: info.name,
        major: info.major,
        academic_year: info.academic_year,
        skills: info.skills.into_skills(),
        interests: info.interests,
        project_idea: info.project_idea,
        avatar_url: info.avatar_url.filter(|url| !url.is_empty()),
        is_open_to_teams: info.is_open_to_teams,
    };
    let user = data.store.transact(move |r| r.register_user(new_user)).await?;
    info!("Registered user {}", user.user_id);

    Ok(HttpResponse::Created().json(open_session(&data, &user)?))
}

// Login Endpoint
pub async fn login(
    data: web::Data<AppState>,
    info: web::Json<LoginInfo>,
) -> Result<HttpResponse, ServiceError> {
    let info = info.into_inner();
    let invalid = || ServiceError::Unauthorized { code: "INVALID_CREDENTIALS" };

    let user = data
        .store
        .read(|r| r.find_user_by_email(&info.email).cloned())
        .await
        .ok_or_else(invalid)?;
    if !password_matches(info.password, user.password_hash.clone()).await? {
        info!("Rejected login for user {}", user.user_id);
        return Err(invalid());
    }

    Ok(HttpResponse::Ok().json(open_session(&data, &user)?))
}

pub async fn logout(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    data.sessions.end(&session.session_id);
    info!("Session {} closed by user {}", session.session_id, session.user_id);
    Ok(HttpResponse::NoContent().finish())
}

/// The caller's session and profile.
pub async fn current(data: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ServiceError> {
    let session = current_session(&req)?;
    let user = data
        .store
        .read(|r| r.user(&session.user_id).map(UserProfile::from))
        .await
        .ok_or_else(ServiceError::unauthorized)?;
    Ok(HttpResponse::Ok().json(json!({
        "user": user,
        "expires_at": session.expires_at,
    })))
}

/// Always accepted so the response never reveals whether an account exists.
pub async fn request_password_reset(
    data: web::Data<AppState>,
    info: web::Json<PasswordResetInfo>,
) -> Result<HttpResponse, ServiceError> {
    let known = data
        .store
        .read(|r| r.find_user_by_email(&info.email).is_some())
        .await;
    info!("Password reset requested (known account: {})", known);
    Ok(HttpResponse::Accepted().json(json!({
        "message": "If an account exists for that email, a reset link has been sent."
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRegistry;

    #[test]
    fn email_shape_is_checked() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email(" ada@uni.edu "));
        assert!(!is_valid_email("ada"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("a da@example.com"));
    }

    #[test]
    fn token_carries_session_and_user() {
        let sessions = SessionRegistry::new(1);
        let session = sessions.start("user-1");
        let token = create_jwt(&session, "secret").unwrap();

        let claims = validate_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.sid, session.session_id);
        assert!(validate_jwt(&token, "other-secret").is_err());
    }
}
