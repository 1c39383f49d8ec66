//! Customer login passthrough to the bookstore service.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use shelf_http::{AppError, SessionId};
use shelf_kernel::Module;
use thiserror::Error;

use crate::services::AppServices;
use crate::session::Customer;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Rejected(message) => AppError::unauthorized(message),
            unavailable @ AuthError::Unavailable(_) => AppError::upstream(unavailable.to_string()),
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<Customer, AuthError>;
}

pub struct AuthModule {
    services: Arc<AppServices>,
}

impl AuthModule {
    pub fn new(services: Arc<AppServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/login": {
                    "post": {
                        "summary": "Log in against the bookstore service",
                        "tags": ["Auth"],
                        "responses": {
                            "200": {"description": "Logged in"},
                            "400": {"description": "Missing email or password"},
                            "401": {"description": "Invalid credentials"},
                            "500": {"description": "Bookstore service not configured or unreachable"}
                        }
                    }
                },
                "/logout": {
                    "post": {
                        "summary": "Forget the logged-in customer",
                        "tags": ["Auth"],
                        "responses": {"200": {"description": "Logged out"}}
                    }
                }
            }
        }))
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut details = Vec::new();
    if request.email.trim().is_empty() {
        details.push(json!({"field": "email", "error": "required"}));
    }
    if request.password.is_empty() {
        details.push(json!({"field": "password", "error": "required"}));
    }
    if !details.is_empty() {
        return Err(AppError::validation(details, "Email and password are required"));
    }

    let authenticator = services
        .authenticator
        .as_ref()
        .ok_or_else(|| AppError::upstream("Authentication service is not configured"))?;

    let customer = authenticator
        .login(request.email.trim(), &request.password)
        .await?;

    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    let email = customer.email.clone();
    state.customer = Some(customer);
    services.sessions.save(&session, state).await?;

    Ok(Json(json!({"success": true, "email": email})))
}

async fn logout(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<serde_json::Value>, AppError> {
    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    if let Some(customer) = state.customer.take() {
        tracing::info!(email = %customer.email, "customer logged out");
    }
    services.sessions.save(&session, state).await?;
    Ok(Json(json!({"success": true})))
}
