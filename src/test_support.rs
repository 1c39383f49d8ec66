//! Shared fixtures for module tests.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use shelf_http::{router::RouterBuilder, SessionConfig};
use shelf_kernel::{settings::CurrencySettings, Module};
use tower::ServiceExt;

use crate::modules::auth::Authenticator;
use crate::modules::cart::CartPolicy;
use crate::modules::catalog::query::SearchLimits;
use crate::modules::catalog::BookLookup;
use crate::modules::catalog::provider::testing::StaticCatalog;
use crate::modules::checkout::payment::testing::RecordingGateway;
use crate::modules::checkout::{CheckoutOrchestrator, CheckoutPolicy, PaymentGateway};
use crate::modules::currency::feed::testing::FixedFeed;
use crate::modules::currency::{CurrencyConverter, RateFeed};
use crate::services::AppServices;
use crate::session::InMemorySessionStore;

pub const COOKIE_NAME: &str = "shelf_session";

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Builder for [`AppServices`] wired to in-memory fakes.
pub struct TestServices {
    catalog: Arc<dyn BookLookup>,
    payments: Arc<dyn PaymentGateway>,
    feed: Arc<dyn RateFeed>,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl TestServices {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(StaticCatalog::new("static", vec![])),
            payments: Arc::new(RecordingGateway::default()),
            feed: Arc::new(FixedFeed::new(3.5, 4.0)),
            authenticator: None,
        }
    }

    pub fn catalog(mut self, catalog: Arc<dyn BookLookup>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = payments;
        self
    }

    pub fn rate_feed(mut self, feed: Arc<dyn RateFeed>) -> Self {
        self.feed = feed;
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn build(self) -> Arc<AppServices> {
        let cart_policy = CartPolicy::default();
        Arc::new(AppServices {
            catalog: self.catalog.clone(),
            currency: Arc::new(CurrencyConverter::new(self.feed, &CurrencySettings::default())),
            sessions: Arc::new(InMemorySessionStore::new()),
            checkout: CheckoutOrchestrator::new(
                self.catalog,
                self.payments,
                CheckoutPolicy::default(),
                cart_policy,
            ),
            authenticator: self.authenticator,
            cart_policy,
            search_limits: SearchLimits::default(),
            publishable_key: Some("pk_test".into()),
        })
    }
}

/// Mount one module under its name with the session cookie layer.
pub fn mount(module: Arc<dyn Module>) -> Router {
    RouterBuilder::new()
        .mount_module(module.name(), module.routes())
        .with_sessions(SessionConfig::new(COOKIE_NAME, false))
        .build()
}

/// Issue one request and decode the JSON body (`Null` when empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    cookie: Option<&str>,
) -> (StatusCode, HeaderMap, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

/// `name=value` pair from the response's session `Set-Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .unwrap()
        .to_string()
}
