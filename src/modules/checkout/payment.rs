//! Hosted payment page provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shelf_kernel::settings::CheckoutSettings;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider is not configured")]
    NotConfigured,

    #[error("payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

/// One priced line sent to the provider. Amounts are in minor units.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentLine {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub currency: String,
    pub line_items: Vec<PaymentLine>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub allowed_countries: Vec<String>,
    pub metadata: Vec<(String, String)>,
}

impl SessionRequest {
    /// Provider form encoding with bracketed nested keys.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];

        for (i, line) in self.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            fields.push((format!("{prefix}[price_data][currency]"), self.currency.clone()));
            fields.push((format!("{prefix}[price_data][product_data][name]"), line.name.clone()));
            if let Some(description) = &line.description {
                fields.push((
                    format!("{prefix}[price_data][product_data][description]"),
                    description.clone(),
                ));
            }
            if let Some(image) = &line.image {
                fields.push((
                    format!("{prefix}[price_data][product_data][images][0]"),
                    image.clone(),
                ));
            }
            fields.push((format!("{prefix}[price_data][unit_amount]"), line.unit_amount.to_string()));
            fields.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }

        if let Some(email) = &self.customer_email {
            fields.push(("customer_email".to_string(), email.clone()));
        }

        for (i, country) in self.allowed_countries.iter().enumerate() {
            fields.push((
                format!("shipping_address_collection[allowed_countries][{i}]"),
                country.clone(),
            ));
        }

        for (key, value) in &self.metadata {
            fields.push((format!("metadata[{key}]"), value.clone()));
        }

        fields
    }
}

/// Provider handle for one pending payment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<PaymentSession, PaymentError>;
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: Option<String>,
}

pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
}

impl StripeGateway {
    pub fn new(settings: &CheckoutSettings) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.payment_base_url.trim_end_matches('/').to_string(),
            secret_key: settings.secret_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<PaymentSession, PaymentError> {
        let secret_key = self.secret_key.as_deref().ok_or(PaymentError::NotConfigured)?;

        tracing::info!(items = request.line_items.len(), "creating payment session");

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(secret_key)
            .form(&request.form_fields())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("payment provider returned HTTP {}", status.as_u16()));
            tracing::error!(status = status.as_u16(), %message, "payment session creation failed");
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: PaymentSession = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        tracing::info!(session_id = %session.id, "payment session created");
        Ok(session)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Gateway that records requests and either succeeds or fails with a message.
    #[derive(Default)]
    pub struct RecordingGateway {
        pub failure: Option<String>,
        /// Simulated provider latency
        pub delay: Option<Duration>,
        pub requests: Mutex<Vec<SessionRequest>>,
    }

    impl RecordingGateway {
        pub fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn requests(&self) -> Vec<SessionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentGateway for RecordingGateway {
        async fn create_session(&self, request: &SessionRequest) -> Result<PaymentSession, PaymentError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            match &self.failure {
                Some(message) => Err(PaymentError::Rejected {
                    status: 402,
                    message: message.clone(),
                }),
                None => Ok(PaymentSession {
                    id: format!("cs_test_{}", requests.len()),
                    url: Some(format!("https://pay.example/cs_test_{}", requests.len())),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Form, Json, Router,
    };
    use serde_json::json;

    use super::*;
    use crate::test_support::spawn_server;

    fn request() -> SessionRequest {
        SessionRequest {
            currency: "usd".into(),
            line_items: vec![
                PaymentLine {
                    name: "Dune".into(),
                    description: Some("By Frank Herbert".into()),
                    image: Some("https://img/dune.jpg".into()),
                    unit_amount: 2000,
                    quantity: 2,
                },
                PaymentLine {
                    name: "Shipping".into(),
                    description: None,
                    image: None,
                    unit_amount: 500,
                    quantity: 1,
                },
            ],
            success_url: "http://shop/checkout/success?session_id={CHECKOUT_SESSION_ID}".into(),
            cancel_url: "http://shop/checkout/cancel".into(),
            customer_email: Some("ana@example.com".into()),
            allowed_countries: vec!["PE".into(), "US".into()],
            metadata: vec![("order_id".into(), "o-1".into())],
        }
    }

    #[test]
    fn form_fields_use_bracketed_keys() {
        let fields: HashMap<_, _> = request().form_fields().into_iter().collect();
        assert_eq!(fields["line_items[0][price_data][unit_amount]"], "2000");
        assert_eq!(fields["line_items[0][price_data][product_data][description]"], "By Frank Herbert");
        assert_eq!(fields["line_items[1][quantity]"], "1");
        assert!(!fields.contains_key("line_items[1][price_data][product_data][images][0]"));
        assert_eq!(fields["shipping_address_collection[allowed_countries][1]"], "US");
        assert_eq!(fields["metadata[order_id]"], "o-1");
        assert_eq!(fields["customer_email"], "ana@example.com");
    }

    type Seen = Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>;

    async fn provider(status: StatusCode, body: serde_json::Value) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let recorder = seen.clone();
        let router = Router::new().route(
            "/v1/checkout/sessions",
            post(move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
                let recorder = recorder.clone();
                let body = body.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorder.lock().unwrap().push((auth, form));
                    (status, Json(body))
                }
            }),
        );
        (spawn_server(router).await, seen)
    }

    fn gateway(base: &str, key: Option<&str>) -> StripeGateway {
        StripeGateway::new(&CheckoutSettings {
            payment_base_url: base.to_string(),
            secret_key: key.map(str::to_string),
            ..CheckoutSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn creates_session_with_secret_key() {
        let (base, seen) = provider(StatusCode::OK, json!({"id": "cs_1", "url": "https://pay/cs_1"})).await;

        let session = gateway(&base, Some("sk_test")).create_session(&request()).await.unwrap();
        assert_eq!(session.id, "cs_1");
        assert_eq!(session.url.as_deref(), Some("https://pay/cs_1"));

        let (auth, form) = seen.lock().unwrap()[0].clone();
        assert_eq!(auth.as_deref(), Some("Bearer sk_test"));
        assert_eq!(form["mode"], "payment");
        assert_eq!(form["line_items[0][price_data][product_data][name]"], "Dune");
    }

    #[tokio::test]
    async fn provider_message_is_kept() {
        let (base, _) = provider(
            StatusCode::BAD_REQUEST,
            json!({"error": {"message": "Invalid currency: xyz"}}),
        )
        .await;

        match gateway(&base, Some("sk_test")).create_session(&request()).await {
            Err(PaymentError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid currency: xyz");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let (base, seen) = provider(StatusCode::OK, json!({"id": "cs_1"})).await;
        let result = gateway(&base, None).create_session(&request()).await;
        assert!(matches!(result, Err(PaymentError::NotConfigured)));
        assert!(seen.lock().unwrap().is_empty());
    }
}
