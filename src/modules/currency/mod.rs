pub mod converter;
pub mod feed;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_http::AppError;
use shelf_kernel::{InitCtx, Module};

use crate::services::AppServices;
use crate::utils::money::{format_price, Currency};

pub use converter::CurrencyConverter;
pub use feed::{CurrencyError, HttpRateFeed, RateFeed};
pub use models::{DualPrice, ExchangeRate, RateSource};

/// Exchange rates and price conversion
pub struct CurrencyModule {
    services: Arc<AppServices>,
}

impl CurrencyModule {
    pub fn new(services: Arc<AppServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for CurrencyModule {
    fn name(&self) -> &'static str {
        "currency"
    }

    /// Warm the rate cache so the first page render does not wait on the provider.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let rate = self.services.currency.rates().await;
        tracing::info!(
            module = self.name(),
            source = ?rate.source,
            buy = rate.buy_rate,
            sell = rate.sell_rate,
            "exchange rates loaded"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/rates", get(current_rates))
            .route("/refresh", post(refresh_rates))
            .route("/convert", get(convert))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/rates": {
                    "get": {
                        "summary": "Current USD/PEN buy and sell rates",
                        "tags": ["Currency"],
                        "responses": {"200": {"description": "Rate pair with its source (provider or default)"}}
                    }
                },
                "/refresh": {
                    "post": {
                        "summary": "Drop the cached rates and fetch them again",
                        "tags": ["Currency"],
                        "responses": {"200": {"description": "Freshly fetched rate pair"}}
                    }
                },
                "/convert": {
                    "get": {
                        "summary": "Convert an amount between USD and PEN",
                        "tags": ["Currency"],
                        "parameters": [
                            {"name": "amount", "in": "query", "required": true, "schema": {"type": "number"}},
                            {"name": "from", "in": "query", "schema": {"type": "string", "enum": ["USD", "PEN"]}}
                        ],
                        "responses": {
                            "200": {"description": "Converted amount"},
                            "400": {"description": "Missing amount or unknown currency"}
                        }
                    }
                }
            }
        }))
    }
}

async fn current_rates(State(services): State<Arc<AppServices>>) -> Json<ExchangeRate> {
    Json(services.currency.rates().await)
}

async fn refresh_rates(State(services): State<Arc<AppServices>>) -> Json<ExchangeRate> {
    Json(services.currency.refresh().await)
}

#[derive(Debug, Deserialize)]
struct ConvertParams {
    amount: Option<f64>,
    from: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Conversion {
    amount: f64,
    from: Currency,
    to: Currency,
    result: f64,
    formatted: String,
    rate: f64,
    source: RateSource,
}

async fn convert(
    State(services): State<Arc<AppServices>>,
    Query(params): Query<ConvertParams>,
) -> Result<Json<Conversion>, AppError> {
    let amount = params.amount.filter(|a| a.is_finite()).ok_or_else(|| {
        AppError::validation(
            vec![json!({"field": "amount", "error": "required"})],
            "amount is required",
        )
    })?;

    let from = match params.from.as_deref() {
        None => Currency::Usd,
        Some(code) => Currency::parse(code).ok_or_else(|| {
            AppError::validation(
                vec![json!({"field": "from", "error": "unsupported currency"})],
                format!("Unsupported currency {}", code),
            )
        })?,
    };

    let rate = services.currency.rates().await;
    let result = rate.convert(amount, from);
    let to = from.counterpart();

    Ok(Json(Conversion {
        amount,
        from,
        to,
        result,
        formatted: format_price(result, to),
        rate: rate.rate_for(from),
        source: rate.source,
    }))
}
