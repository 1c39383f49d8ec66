pub mod flow;
pub mod orchestrator;
pub mod payment;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_http::{AppError, SessionId};
use shelf_kernel::{InitCtx, Module};

use crate::modules::cart::CheckoutDraft;
use crate::services::AppServices;

pub use flow::{CheckoutAttempt, CheckoutState, InvalidTransition};
pub use orchestrator::{CheckoutError, CheckoutOrchestrator, CheckoutPolicy, CreatedSession};
pub use payment::{PaymentError, PaymentGateway, StripeGateway};

impl From<CheckoutError> for AppError {
    fn from(error: CheckoutError) -> Self {
        match error {
            CheckoutError::Unauthenticated => AppError::unauthorized("Authentication required"),
            CheckoutError::EmptyCart => AppError::bad_request_with_code("empty_cart", "Cart is empty"),
            CheckoutError::NoValidItems { .. } => AppError::bad_request_with_code(
                "no_valid_items",
                "No valid items to check out",
            ),
            CheckoutError::Payment(error) => {
                AppError::upstream(format!("Error creating session: {}", error))
            }
            error @ (CheckoutError::Transition(_) | CheckoutError::SessionMismatch(_)) => {
                AppError::conflict(vec![], error.to_string())
            }
        }
    }
}

/// Checkout page, payment session creation and provider callbacks
pub struct CheckoutModule {
    services: Arc<AppServices>,
}

impl CheckoutModule {
    pub fn new(services: Arc<AppServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for CheckoutModule {
    fn name(&self) -> &'static str {
        "checkout"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.checkout.secret_key.is_none() {
            tracing::warn!(
                module = self.name(),
                "payment secret key not configured, session creation will fail"
            );
        }
        tracing::info!(
            module = self.name(),
            require_auth = ctx.settings.checkout.require_auth,
            "checkout module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(checkout_page))
            .route("/create-session", post(create_session))
            .route("/success", get(success))
            .route("/cancel", get(cancel))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Checkout breakdown and publishable key",
                        "tags": ["Checkout"],
                        "responses": {
                            "200": {"description": "Prepared cart breakdown"},
                            "400": {"description": "Cart is empty"},
                            "401": {"description": "Authentication required"}
                        }
                    }
                },
                "/create-session": {
                    "post": {
                        "summary": "Create a hosted payment session from the session cart",
                        "description": "Prices are re-resolved from the catalog; lines without a positive price are dropped.",
                        "tags": ["Checkout"],
                        "responses": {
                            "200": {"description": "Provider session id and redirect URL"},
                            "400": {"description": "Cart is empty or no line has a valid price"},
                            "401": {"description": "Authentication required"},
                            "500": {"description": "Payment provider failure, message attached"}
                        }
                    }
                },
                "/success": {
                    "get": {
                        "summary": "Payment provider success callback",
                        "tags": ["Checkout"],
                        "parameters": [
                            {"name": "session_id", "in": "query", "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": {"description": "Checkout completed and cart cleared"},
                            "409": {"description": "No matching checkout session"}
                        }
                    }
                },
                "/cancel": {
                    "get": {
                        "summary": "Payment provider cancel callback",
                        "tags": ["Checkout"],
                        "responses": {"200": {"description": "Checkout cancelled, cart kept"}}
                    }
                }
            }
        }))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutPage {
    cart: CheckoutDraft,
    customer_email: Option<String>,
    publishable_key: Option<String>,
}

async fn checkout_page(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<CheckoutPage>, AppError> {
    let state = services.sessions.load(&session).await?;
    let cart = services.checkout.prepare(&state)?;

    Ok(Json(CheckoutPage {
        cart,
        customer_email: state.customer.map(|c| c.email),
        publishable_key: services.publishable_key.clone(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionCreatedResponse {
    success: bool,
    #[serde(flatten)]
    session: CreatedSession,
}

/// Any request body is ignored: the session cart is the only source of items.
async fn create_session(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<SessionCreatedResponse>, AppError> {
    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    let result = services.checkout.create_session(&mut state).await;
    services.sessions.save(&session, state).await?;

    Ok(Json(SessionCreatedResponse {
        success: true,
        session: result?,
    }))
}

#[derive(Debug, Deserialize)]
struct SuccessParams {
    session_id: Option<String>,
}

async fn success(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
    Query(params): Query<SuccessParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    services
        .checkout
        .complete(&mut state, params.session_id.as_deref())?;
    let order_id = state.checkout.as_ref().and_then(|a| a.order_id.clone());
    services.sessions.save(&session, state).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment completed. Thank you for your purchase.",
        "sessionId": params.session_id,
        "orderId": order_id,
    })))
}

async fn cancel(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<serde_json::Value>, AppError> {
    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    let checkout_state = services.checkout.cancel(&mut state);
    let item_count = state.cart.item_count();
    services.sessions.save(&session, state).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment cancelled. Your cart is still available.",
        "state": checkout_state,
        "itemCount": item_count,
    })))
}
