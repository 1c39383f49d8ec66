pub mod bookstore;
pub mod fallback;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod query;
pub mod volumes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use shelf_http::AppError;
use shelf_kernel::{InitCtx, Module};

use crate::services::AppServices;
use crate::utils::money::Currency;
use models::{popular_categories, BookDetail, CatalogPage, CategoryEntry};
use query::CatalogQuery;

pub use fallback::FallbackCatalog;
pub use models::{Book, SearchPage};
pub use provider::{BookLookup, CatalogError};

const DEFAULT_PAGE_SIZE: u32 = 20;

/// Book search and detail pages
pub struct CatalogModule {
    services: Arc<AppServices>,
}

impl CatalogModule {
    pub fn new(services: Arc<AppServices>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Module for CatalogModule {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            primary = ctx.settings.catalog.bookstore_base_url.is_some(),
            public_base_url = %ctx.settings.catalog.public_base_url,
            "catalog module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/search", get(search))
            .route("/books/{isbn}", get(book_detail))
            .route("/categories", get(categories))
            .with_state(self.services.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/search": {
                    "get": {
                        "summary": "Search the catalog",
                        "tags": ["Catalog"],
                        "parameters": [
                            {"name": "q", "in": "query", "schema": {"type": "string"}},
                            {"name": "field", "in": "query", "schema": {"type": "string", "enum": ["text", "isbn", "subject", "author", "title"]}},
                            {"name": "page", "in": "query", "schema": {"type": "integer", "minimum": 1}},
                            {"name": "size", "in": "query", "schema": {"type": "integer", "minimum": 1, "maximum": 40}}
                        ],
                        "responses": {
                            "200": {"description": "One page of books"},
                            "400": {"description": "Unknown search field"}
                        }
                    }
                },
                "/books/{isbn}": {
                    "get": {
                        "summary": "Book detail with related titles and prices in both currencies",
                        "tags": ["Catalog"],
                        "parameters": [
                            {"name": "isbn", "in": "path", "required": true, "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": {"description": "Book detail"},
                            "404": {"description": "Book not found"}
                        }
                    }
                },
                "/categories": {
                    "get": {
                        "summary": "Popular categories",
                        "tags": ["Catalog"],
                        "responses": {"200": {"description": "Category list"}}
                    }
                }
            }
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    field: Option<String>,
    page: Option<u32>,
    size: Option<u32>,
}

async fn search(
    State(services): State<Arc<AppServices>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<CatalogPage>, AppError> {
    let term = params.q.unwrap_or_default();
    let query = CatalogQuery::from_field(params.field.as_deref(), term).ok_or_else(|| {
        AppError::validation(
            vec![json!({"field": "field", "error": "unsupported search field"})],
            "Unsupported search field",
        )
    })?;

    let page = params.page.unwrap_or(1).max(1);
    let size = services
        .search_limits
        .clamp_limit(params.size.unwrap_or(DEFAULT_PAGE_SIZE));
    let offset = (page - 1).saturating_mul(size);

    let result = services
        .catalog
        .search(&query.to_string(), offset, size)
        .await;

    Ok(Json(CatalogPage::from_search(result, page, size)))
}

async fn book_detail(
    State(services): State<Arc<AppServices>>,
    Path(isbn): Path<String>,
) -> Result<Json<BookDetail>, AppError> {
    let book = services
        .catalog
        .get_by_isbn(&isbn)
        .await
        .ok_or_else(|| AppError::not_found(format!("Book {} not found", isbn)))?;

    let related = services.catalog.related(&book).await;
    let from = Currency::parse(&book.currency).unwrap_or(Currency::Usd);
    let prices = services.currency.both_prices(book.sale_price(), from).await;

    Ok(Json(BookDetail {
        book,
        related,
        prices,
    }))
}

async fn categories() -> Json<Vec<CategoryEntry>> {
    Json(popular_categories())
}
