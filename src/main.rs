// src/main.rs

mod ai_endpoints;
mod app_state;
mod auth;
mod chat;
mod chat_server;
mod config;
mod db;
mod error;
mod match_engine;
mod membership;
mod models;
mod notifications;
mod reconciler;
mod registry;
mod session;
mod store;
mod team_management;
mod user_management;
mod web_socket_server;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use log::{debug, info};
use serde::Deserialize;

use crate::ai_endpoints::{find_matches, suggest_ideas};
use crate::app_state::AppState;
use crate::auth::{current, login, logout, register, request_password_reset, validate_jwt};
use crate::chat::{create_message, get_messages};
use crate::chat_server::ChatServer;
use crate::config::Config;
use crate::db::MongoDB;
use crate::match_engine::MatchEngine;
use crate::notifications::{
    accept_notification, decline_notification, list_notifications, send_invite, send_join_request,
};
use crate::session::{RejectedToken, Session, SessionRegistry};
use crate::store::MatchStore;
use crate::team_management::{create_team, delete_team, get_my_team, leave_team, remove_team_member};
use crate::user_management::{get_user_by_id, list_users, update_profile};
use crate::web_socket_server::ws_index;

#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // A bad token never fails the request here: handlers that need a
        // session answer 401 themselves, public routes carry on.
        if let Some(token) = bearer_token(&req) {
            match resolve_session(&req, &token) {
                Some(session) => {
                    req.extensions_mut().insert(session);
                }
                None => {
                    req.extensions_mut().insert(RejectedToken);
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

/// "Bearer <token>" from the Authorization header, or `?token=` for
/// websocket upgrades.
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());
    from_header.or_else(|| {
        web::Query::<TokenQuery>::from_query(req.query_string())
            .ok()
            .map(|q| q.into_inner().token)
    })
}

/// A token counts only while the session it was issued for is open.
fn resolve_session(req: &ServiceRequest, token: &str) -> Option<Session> {
    let state = req.app_data::<web::Data<AppState>>()?;
    let claims = match validate_jwt(token, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Token decode error: {}", e);
            return None;
        }
    };
    state
        .sessions
        .resolve(&claims.sid)
        .filter(|session| session.user_id == claims.sub)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/session", web::get().to(current))
            .route("/password-reset", web::post().to(request_password_reset)),
    )
    // USERS
    .service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("/me", web::put().to(update_profile))
            .route("/{user_id}", web::get().to(get_user_by_id)),
    )
    // TEAMS
    .service(
        web::scope("/teams")
            .route("", web::post().to(create_team))
            .route("/mine", web::get().to(get_my_team))
            .service(
                web::scope("/{team_id}")
                    .route("", web::delete().to(delete_team))
                    .route("/leave", web::post().to(leave_team))
                    .route("/members/{user_id}", web::delete().to(remove_team_member))
                    .route("/invites", web::post().to(send_invite))
                    .route("/requests", web::post().to(send_join_request))
                    .route("/messages", web::get().to(get_messages))
                    .route("/messages", web::post().to(create_message)),
            ),
    )
    // NOTIFICATIONS
    .service(
        web::scope("/notifications")
            .route("", web::get().to(list_notifications))
            .route("/{notification_id}/accept", web::post().to(accept_notification))
            .route("/{notification_id}", web::delete().to(decline_notification)),
    )
    // MATCHING
    .route("/matches", web::post().to(find_matches))
    .route("/ideas", web::post().to(suggest_ideas))
    // WEBSOCKET route for real-time
    .service(web::resource("/ws").route(web::get().to(ws_index)));
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(io::Error::other)?;

    let db = match &config.mongo_uri {
        Some(uri) => Some(Arc::new(
            MongoDB::init(uri, &config.database_name)
                .await
                .map_err(io::Error::other)?,
        )),
        None => None,
    };
    let store = match db.clone() {
        Some(db) => MatchStore::load(db).await.map_err(io::Error::other)?,
        None => MatchStore::in_memory(),
    };
    let engine = MatchEngine::new(&config).map_err(io::Error::other)?;
    let chat_server = ChatServer::new(db).start();

    let state = web::Data::new(AppState {
        chat_server,
        store: Arc::new(store),
        sessions: Arc::new(SessionRegistry::new(config.session_ttl_hours)),
        engine: Arc::new(engine),
        config: config.clone(),
    });

    info!("Server running at http://{}", config.bind_address);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let frontend_origin = config.frontend_origin.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication)
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
