//! Client for the bookstore's own inventory service.
//!
//! The service pages with `page`/`size` rather than offsets and wraps every
//! payload in a `{ success, data }` envelope. It also owns customer accounts,
//! so login goes through here as well.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelf_kernel::settings::CatalogSettings;

use super::models::{Book, SearchPage, DEFAULT_CURRENCY, DEFAULT_LANGUAGE, UNKNOWN_AUTHOR, UNTITLED};
use super::provider::{BookLookup, CatalogError};
use super::query::{is_blank, SearchLimits};
use crate::modules::auth::{AuthError, Authenticator};
use crate::session::Customer;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: Option<bool>,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordPage {
    #[serde(default)]
    content: Vec<BookstoreRecord>,
    #[serde(default)]
    total_elements: u64,
}

/// Inventory record as the bookstore service stores it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookstoreRecord {
    #[serde(default)]
    pub isbn: String,
    pub titulo: Option<String>,
    pub autor: Option<String>,
    pub editorial: Option<String>,
    pub fecha_publicacion: Option<String>,
    pub descripcion: Option<String>,
    pub categoria: Option<String>,
    #[serde(default)]
    pub categorias: Vec<String>,
    pub paginas: Option<u32>,
    pub idioma: Option<String>,
    pub imagen: Option<String>,
    pub imagen_grande: Option<String>,
    pub precio: Option<f64>,
    pub moneda: Option<String>,
    pub disponible: Option<bool>,
}

impl BookstoreRecord {
    pub fn into_book(self) -> Option<Book> {
        let isbn = self.isbn.trim().to_string();
        if isbn.is_empty() {
            return None;
        }

        let mut categories = self.categorias;
        if categories.is_empty() {
            categories.extend(self.categoria.clone());
        }

        Some(Book {
            id: None,
            isbn,
            title: self.titulo.unwrap_or_else(|| UNTITLED.to_string()),
            author: self.autor.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            publisher: self.editorial,
            published_date: self.fecha_publicacion,
            description: self.descripcion,
            category: self.categoria.or_else(|| categories.first().cloned()),
            categories,
            page_count: self.paginas,
            language: self.idioma.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            large_image: self.imagen_grande.or_else(|| self.imagen.clone()),
            thumbnail: self.imagen,
            price: self.precio,
            currency: self.moneda.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            available: self.disponible.unwrap_or(false),
            preview_link: None,
            info_link: None,
            rating: None,
            ratings_count: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
    usuario: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    email: Option<String>,
}

pub struct BookstoreClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    limits: SearchLimits,
}

impl BookstoreClient {
    pub fn new(base_url: &str, settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: settings.bookstore_token.clone().filter(|t| !t.is_empty()),
            limits: SearchLimits::from(settings),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_page(&self, query: &str, offset: u32, limit: u32) -> Result<SearchPage, CatalogError> {
        let page = offset / limit;
        let response = self
            .get("/libros")
            .query(&[
                ("page", page.to_string()),
                ("size", limit.to_string()),
                ("sort", "titulo,asc".to_string()),
                ("search", query.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let envelope: Envelope<RecordPage> = response.json().await?;
        if envelope.success == Some(false) {
            return Err(CatalogError::Rejected(
                envelope.message.unwrap_or_else(|| "search rejected".to_string()),
            ));
        }

        let records = envelope.data.unwrap_or(RecordPage {
            content: Vec::new(),
            total_elements: 0,
        });

        Ok(SearchPage {
            total_items: records.total_elements,
            items: records
                .content
                .into_iter()
                .filter_map(BookstoreRecord::into_book)
                .collect(),
        })
    }

    async fn fetch_one(&self, isbn: &str) -> Result<Option<Book>, CatalogError> {
        let response = self.get(&format!("/libros/{}", isbn.trim())).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let envelope: Envelope<BookstoreRecord> = response.json().await?;
        Ok(envelope.data.and_then(BookstoreRecord::into_book))
    }
}

#[async_trait]
impl BookLookup for BookstoreClient {
    fn name(&self) -> &'static str {
        "bookstore"
    }

    async fn search(&self, query: &str, offset: u32, limit: u32) -> SearchPage {
        if is_blank(query) {
            tracing::warn!(provider = self.name(), "empty query received");
            return SearchPage::empty();
        }

        let limit = self.limits.clamp_limit(limit);
        match self.fetch_page(query.trim(), offset, limit).await {
            Ok(page) => {
                tracing::info!(
                    provider = self.name(),
                    %query,
                    total_items = page.total_items,
                    returned = page.items.len(),
                    "search response received"
                );
                page
            }
            Err(error) => {
                tracing::error!(provider = self.name(), %query, %error, "search failed");
                SearchPage::empty()
            }
        }
    }

    async fn get_by_isbn(&self, isbn: &str) -> Option<Book> {
        if is_blank(isbn) {
            return None;
        }

        match self.fetch_one(isbn).await {
            Ok(Some(book)) => {
                tracing::info!(provider = self.name(), %isbn, title = %book.title, "book found by ISBN");
                Some(book)
            }
            Ok(None) => {
                tracing::warn!(provider = self.name(), %isbn, "book not found by ISBN");
                None
            }
            Err(error) => {
                tracing::error!(provider = self.name(), %isbn, %error, "ISBN lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl Authenticator for BookstoreClient {
    async fn login(&self, email: &str, password: &str) -> Result<Customer, AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        let envelope: Envelope<LoginData> = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        match envelope.data {
            Some(data) if status.is_success() && envelope.success != Some(false) => {
                let email = data
                    .usuario
                    .and_then(|user| user.email)
                    .unwrap_or_else(|| email.to_string());
                tracing::info!(%email, "customer logged in");
                Ok(Customer {
                    email,
                    token: data.token,
                })
            }
            _ => Err(AuthError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "Invalid credentials".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use super::*;
    use crate::test_support::spawn_server;

    type Seen = Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>;

    fn record(isbn: &str, price: f64) -> Value {
        json!({
            "isbn": isbn,
            "titulo": "Cien años de soledad",
            "autor": "Gabriel García Márquez",
            "categoria": "Ficción",
            "imagen": "thumb.jpg",
            "precio": price,
            "moneda": "USD",
            "disponible": true
        })
    }

    async fn bookstore_server() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let recorder = seen.clone();
        let router = Router::new()
            .route(
                "/libros",
                get(move |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| {
                    let recorder = recorder.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        recorder.lock().unwrap().push((params, auth));
                        Json(json!({
                            "success": true,
                            "data": {
                                "content": [record("9780307474728", 18.5), record("", 3.0)],
                                "totalElements": 57
                            }
                        }))
                    }
                }),
            )
            .route(
                "/libros/{isbn}",
                get(|Path(isbn): Path<String>| async move {
                    if isbn == "9780307474728" {
                        (StatusCode::OK, Json(json!({"success": true, "data": record(&isbn, 18.5)})))
                    } else {
                        (StatusCode::NOT_FOUND, Json(json!({"success": false})))
                    }
                }),
            )
            .route(
                "/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "secret" {
                        (
                            StatusCode::OK,
                            Json(json!({
                                "success": true,
                                "data": {"token": "jwt-token", "usuario": {"email": body["email"]}}
                            })),
                        )
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"success": false, "message": "Credenciales inválidas"})),
                        )
                    }
                }),
            );
        (spawn_server(router).await, seen)
    }

    fn client(base: &str) -> BookstoreClient {
        BookstoreClient::new(
            base,
            &CatalogSettings {
                bookstore_token: Some("service-token".into()),
                ..CatalogSettings::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn search_maps_offsets_to_pages_and_skips_records_without_isbn() {
        let (base, seen) = bookstore_server().await;
        let page = client(&base).search(" soledad ", 40, 20).await;

        assert_eq!(page.total_items, 57);
        assert_eq!(page.items.len(), 1);
        let book = &page.items[0];
        assert_eq!(book.author, "Gabriel García Márquez");
        assert_eq!(book.category.as_deref(), Some("Ficción"));
        assert_eq!(book.categories, vec!["Ficción".to_string()]);
        assert_eq!(book.large_image.as_deref(), Some("thumb.jpg"));
        assert!(book.available);

        let (params, auth) = seen.lock().unwrap()[0].clone();
        assert_eq!(params["page"], "2");
        assert_eq!(params["size"], "20");
        assert_eq!(params["search"], "soledad");
        assert_eq!(auth.as_deref(), Some("Bearer service-token"));
    }

    #[tokio::test]
    async fn get_by_isbn_uses_the_detail_endpoint() {
        let (base, seen) = bookstore_server().await;
        let bookstore = client(&base);

        let book = bookstore.get_by_isbn("9780307474728").await.unwrap();
        assert_eq!(book.price, Some(18.5));
        assert!(bookstore.get_by_isbn("0000000000").await.is_none());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_yields_empty_results() {
        let bookstore = client("http://127.0.0.1:9");
        assert!(bookstore.search("dune", 0, 20).await.is_empty());
        assert!(bookstore.get_by_isbn("9780307474728").await.is_none());
    }

    #[tokio::test]
    async fn login_returns_customer_or_provider_message() {
        let (base, _) = bookstore_server().await;
        let bookstore = client(&base);

        let customer = bookstore.login("ana@example.com", "secret").await.unwrap();
        assert_eq!(customer.email, "ana@example.com");
        assert_eq!(customer.token, "jwt-token");

        match bookstore.login("ana@example.com", "wrong").await {
            Err(AuthError::Rejected(message)) => assert_eq!(message, "Credenciales inválidas"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn missing_availability_means_unavailable() {
        let book = BookstoreRecord {
            isbn: "1".into(),
            ..BookstoreRecord::default()
        }
        .into_book()
        .unwrap();
        assert!(!book.available);
        assert_eq!(book.title, UNTITLED);
        assert_eq!(book.currency, DEFAULT_CURRENCY);
    }
}
