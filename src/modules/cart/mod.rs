pub mod engine;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_http::{AppError, SessionId};
use shelf_kernel::Module;

use crate::services::AppServices;

pub use engine::{Cart, CartLineItem, CartPolicy, CartSummary, CheckoutDraft, DraftLine};

/// Session cart endpoints
pub struct CartModule {
    services: Arc<AppServices>,
}

impl CartModule {
    pub fn new(services: Arc<AppServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for CartModule {
    fn name(&self) -> &'static str {
        "cart"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(show_cart))
            .route("/add", post(add_item))
            .route("/update", post(update_item))
            .route("/remove", post(remove_item))
            .route("/clear", post(clear_cart))
            .route("/count", get(item_count))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let mutation = |summary: &str, extra: serde_json::Value| {
            let mut responses = json!({
                "200": {"description": "Cart updated", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/CartMutation"}}}},
                "400": {"description": "Missing isbn"}
            });
            if let (Some(target), Some(extra)) = (responses.as_object_mut(), extra.as_object()) {
                target.extend(extra.clone());
            }
            json!({"post": {"summary": summary, "tags": ["Cart"], "responses": responses}})
        };

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "Cart contents with totals",
                        "tags": ["Cart"],
                        "responses": {"200": {"description": "Items and summary"}}
                    }
                },
                "/add": mutation("Add a book to the cart", json!({
                    "404": {"description": "Book not found"},
                    "409": {"description": "Book has no sale price"}
                })),
                "/update": mutation("Set a line quantity (0 removes, otherwise clamped to 1..=10)", json!({})),
                "/remove": mutation("Remove a line", json!({})),
                "/clear": mutation("Empty the cart", json!({})),
                "/count": {
                    "get": {
                        "summary": "Total quantity for the cart badge",
                        "tags": ["Cart"],
                        "responses": {"200": {"description": "Item count"}}
                    }
                }
            },
            "components": {
                "schemas": {
                    "CartMutation": {
                        "type": "object",
                        "properties": {
                            "success": {"type": "boolean"},
                            "message": {"type": "string"},
                            "itemCount": {"type": "integer"},
                            "total": {"type": "number"}
                        },
                        "required": ["success", "message", "itemCount", "total"]
                    }
                }
            }
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ItemRequest {
    isbn: Option<String>,
    quantity: Option<i64>,
}

impl ItemRequest {
    fn isbn(&self) -> Result<&str, AppError> {
        self.isbn
            .as_deref()
            .map(str::trim)
            .filter(|isbn| !isbn.is_empty())
            .ok_or_else(|| {
                AppError::validation(
                    vec![json!({"field": "isbn", "error": "required"})],
                    "ISBN not provided",
                )
            })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartMutation {
    success: bool,
    message: &'static str,
    item_count: u32,
    total: f64,
}

impl CartMutation {
    fn of(cart: &Cart, message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message,
            item_count: cart.item_count(),
            total: cart.total(),
        })
    }
}

#[derive(Debug, Serialize)]
struct CartView {
    items: Vec<CartLineItem>,
    summary: CartSummary,
}

async fn show_cart(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<CartView>, AppError> {
    let state = services.sessions.load(&session).await?;
    Ok(Json(CartView {
        items: state.cart.items().cloned().collect(),
        summary: state.cart.summary(&services.cart_policy),
    }))
}

async fn add_item(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
    Json(request): Json<ItemRequest>,
) -> Result<Json<CartMutation>, AppError> {
    let isbn = request.isbn()?;
    let quantity = u32::try_from(request.quantity.unwrap_or(1))
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| {
            AppError::validation(
                vec![json!({"field": "quantity", "error": "must be a positive integer"})],
                "Invalid quantity",
            )
        })?;

    let book = services
        .catalog
        .get_by_isbn(isbn)
        .await
        .ok_or_else(|| AppError::not_found("Book not found"))?;

    if !book.is_purchasable() {
        tracing::warn!(%isbn, price = ?book.price, "add to cart refused, book has no sale price");
        return Err(AppError::conflict(
            vec![json!({"isbn": isbn})],
            "This book is not available for purchase",
        ));
    }

    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    state.cart.add_item(&book, quantity, &services.cart_policy);
    tracing::info!(%isbn, quantity, item_count = state.cart.item_count(), "book added to cart");

    let response = CartMutation::of(&state.cart, "Book added to cart");
    services.sessions.save(&session, state).await?;
    Ok(response)
}

async fn update_item(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
    Json(request): Json<ItemRequest>,
) -> Result<Json<CartMutation>, AppError> {
    let isbn = request.isbn()?;
    let quantity = request.quantity.unwrap_or(1);

    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    state.cart.update_quantity(isbn, quantity, &services.cart_policy);

    let response = CartMutation::of(&state.cart, "Quantity updated");
    services.sessions.save(&session, state).await?;
    Ok(response)
}

async fn remove_item(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
    Json(request): Json<ItemRequest>,
) -> Result<Json<CartMutation>, AppError> {
    let isbn = request.isbn()?;

    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    if state.cart.remove_item(isbn).is_some() {
        tracing::info!(%isbn, "book removed from cart");
    }

    let response = CartMutation::of(&state.cart, "Book removed from cart");
    services.sessions.save(&session, state).await?;
    Ok(response)
}

async fn clear_cart(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<CartMutation>, AppError> {
    let _guard = services.sessions.lock(&session).await;
    let mut state = services.sessions.load(&session).await?;
    state.cart.clear();

    let response = CartMutation::of(&state.cart, "Cart cleared");
    services.sessions.save(&session, state).await?;
    Ok(response)
}

async fn item_count(
    State(services): State<Arc<AppServices>>,
    Extension(session): Extension<SessionId>,
) -> Result<Json<serde_json::Value>, AppError> {
    let state = services.sessions.load(&session).await?;
    Ok(Json(json!({ "count": state.cart.item_count() })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use super::*;
    use crate::modules::catalog::provider::testing::{priced_book, StaticCatalog};
    use crate::test_support::{mount, send, session_cookie, TestServices};

    fn app() -> Router {
        let catalog = StaticCatalog::new(
            "static",
            vec![
                priced_book("111", "Dune", Some(20.0)),
                priced_book("222", "Neuromancer", Some(35.0)),
                priced_book("000", "Free Sample", Some(0.0)),
                priced_book("999", "Unpriced", None),
            ],
        );
        let services = TestServices::new().catalog(Arc::new(catalog)).build();
        mount(Arc::new(CartModule::new(services)))
    }

    #[tokio::test]
    async fn add_returns_running_totals_and_keeps_session() {
        let app = app();

        let (status, headers, body) = send(&app, Method::POST, "/cart/add", Some(json!({"isbn": "111", "quantity": 2})), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["itemCount"], 2);
        assert_eq!(body["total"], 40.0);

        let cookie = session_cookie(&headers);
        let (_, _, body) = send(&app, Method::POST, "/cart/add", Some(json!({"isbn": "222"})), Some(&cookie)).await;
        assert_eq!(body["itemCount"], 3);
        assert_eq!(body["total"], 75.0);

        let (_, _, body) = send(&app, Method::GET, "/cart", None, Some(&cookie)).await;
        assert_eq!(body["summary"]["shipping"], 0.0);
        assert_eq!(body["summary"]["total"], 75.0);
        assert_eq!(body["summary"]["uniqueItems"], 2);

        let (_, _, body) = send(&app, Method::GET, "/cart/count", None, None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn add_rejects_bad_input() {
        let app = app();

        let (status, _, body) = send(&app, Method::POST, "/cart/add", Some(json!({"quantity": 1})), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _, _) = send(&app, Method::POST, "/cart/add", Some(json!({"isbn": "111", "quantity": 0})), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&app, Method::POST, "/cart/add", Some(json!({"isbn": "404"})), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        for isbn in ["000", "999"] {
            let (status, _, body) = send(&app, Method::POST, "/cart/add", Some(json!({"isbn": isbn})), None).await;
            assert_eq!(status, StatusCode::CONFLICT);
            assert_eq!(body["error"]["code"], "conflict");
        }
    }

    #[tokio::test]
    async fn update_remove_and_clear() {
        let app = app();
        let (_, headers, _) = send(&app, Method::POST, "/cart/add", Some(json!({"isbn": "111", "quantity": 2})), None).await;
        let cookie = session_cookie(&headers);
        send(&app, Method::POST, "/cart/add", Some(json!({"isbn": "222"})), Some(&cookie)).await;

        let (_, _, body) = send(&app, Method::POST, "/cart/update", Some(json!({"isbn": "111", "quantity": 15})), Some(&cookie)).await;
        assert_eq!(body["itemCount"], 11);

        let (_, _, body) = send(&app, Method::POST, "/cart/update", Some(json!({"isbn": "111", "quantity": 0})), Some(&cookie)).await;
        assert_eq!(body["itemCount"], 1);

        for _ in 0..2 {
            let (status, _, body) = send(&app, Method::POST, "/cart/remove", Some(json!({"isbn": "111"})), Some(&cookie)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["itemCount"], 1);
        }

        let (status, _, _) = send(&app, Method::POST, "/cart/remove", Some(json!({})), Some(&cookie)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, _, body) = send(&app, Method::POST, "/cart/clear", None, Some(&cookie)).await;
        assert_eq!(body["itemCount"], 0);
        assert_eq!(body["total"], 0.0);
    }
}
