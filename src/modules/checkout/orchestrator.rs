//! Checkout session creation with server-side price re-validation.
//!
//! Cart prices are never forwarded to the payment provider. Every line is
//! re-resolved against the catalog when the session is created, and lines
//! without a positive authoritative price are dropped.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use shelf_kernel::settings::{CheckoutSettings, ServerSettings};
use thiserror::Error;
use uuid::{Timestamp, Uuid};

use super::flow::{CheckoutAttempt, CheckoutState, InvalidTransition};
use super::payment::{PaymentError, PaymentGateway, PaymentLine, SessionRequest};
use crate::modules::cart::{Cart, CartPolicy, CheckoutDraft};
use crate::modules::catalog::BookLookup;
use crate::session::SessionState;
use crate::utils::money::{round2, to_minor_units};

pub const SHIPPING_LINE_NAME: &str = "Shipping";
pub const SHIPPING_LINE_DESCRIPTION: &str = "Home delivery (3-5 days)";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("cart is empty")]
    EmptyCart,

    #[error("no valid items to check out")]
    NoValidItems { dropped: Vec<String> },

    #[error("{0}")]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("checkout session {0} does not belong to this cart")]
    SessionMismatch(String),
}

/// Checkout rules and provider redirect targets.
#[derive(Debug, Clone)]
pub struct CheckoutPolicy {
    pub require_auth: bool,
    /// Catalog lookups in flight during re-validation
    pub concurrency: usize,
    pub currency: String,
    pub allowed_countries: Vec<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutPolicy {
    pub fn from_settings(checkout: &CheckoutSettings, server: &ServerSettings) -> Self {
        let base = server.public_url.trim_end_matches('/');
        Self {
            require_auth: checkout.require_auth,
            concurrency: checkout.revalidation_concurrency.max(1),
            currency: checkout.currency.to_lowercase(),
            allowed_countries: checkout.allowed_countries.clone(),
            success_url: format!("{base}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/checkout/cancel"),
        }
    }
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self::from_settings(&CheckoutSettings::default(), &ServerSettings::default())
    }
}

/// A cart line priced from the catalog at checkout time.
#[derive(Debug, Clone, PartialEq)]
pub struct RevalidatedLine {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub image: Option<String>,
    pub unit_price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Revalidation {
    /// Valid lines, in cart order
    pub lines: Vec<RevalidatedLine>,
    pub dropped: Vec<String>,
}

impl Revalidation {
    pub fn subtotal(&self) -> f64 {
        round2(
            self.lines
                .iter()
                .map(|line| line.unit_price * f64::from(line.quantity))
                .sum(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
    pub url: Option<String>,
    pub order_id: String,
    pub dropped_items: Vec<String>,
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
}

pub struct CheckoutOrchestrator {
    catalog: Arc<dyn BookLookup>,
    payments: Arc<dyn PaymentGateway>,
    policy: CheckoutPolicy,
    cart_policy: CartPolicy,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<dyn BookLookup>,
        payments: Arc<dyn PaymentGateway>,
        policy: CheckoutPolicy,
        cart_policy: CartPolicy,
    ) -> Self {
        Self {
            catalog,
            payments,
            policy,
            cart_policy,
        }
    }

    pub fn policy(&self) -> &CheckoutPolicy {
        &self.policy
    }

    /// Entry guard shared by the checkout page and session creation.
    pub fn guard(&self, state: &SessionState) -> Result<(), CheckoutError> {
        if self.policy.require_auth && !state.is_authenticated() {
            return Err(CheckoutError::Unauthenticated);
        }
        if state.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        Ok(())
    }

    /// Breakdown shown before payment. Prices are the cart's, for display only.
    pub fn prepare(&self, state: &SessionState) -> Result<CheckoutDraft, CheckoutError> {
        self.guard(state)?;
        Ok(state.cart.prepare_for_checkout(&self.cart_policy))
    }

    /// Re-resolve every cart line against the catalog, keeping cart order.
    pub async fn revalidate(&self, cart: &Cart) -> Revalidation {
        let lookups: Vec<_> = stream::iter(cart.items().cloned())
            .map(|line| {
                let catalog = self.catalog.clone();
                async move {
                    let book = catalog.get_by_isbn(&line.isbn).await;
                    (line, book)
                }
            })
            .buffered(self.policy.concurrency)
            .collect()
            .await;

        let mut revalidation = Revalidation::default();
        for (line, book) in lookups {
            let Some((book, price)) = book.and_then(|b| b.sale_price().map(|p| (b, p))) else {
                tracing::warn!(
                    isbn = %line.isbn,
                    cart_price = line.unit_price,
                    "dropping checkout line without a valid catalog price"
                );
                revalidation.dropped.push(line.isbn);
                continue;
            };

            revalidation.lines.push(RevalidatedLine {
                isbn: line.isbn,
                title: book.title.clone(),
                author: book.author.clone(),
                image: book.cover().map(str::to_string).or(line.image),
                unit_price: price,
                quantity: line.quantity,
            });
        }
        revalidation
    }

    /// Create a provider session for the session cart.
    ///
    /// The attempt state is written back into `state` whatever the outcome;
    /// the cart itself is never modified here.
    pub async fn create_session(&self, state: &mut SessionState) -> Result<CreatedSession, CheckoutError> {
        self.guard(state)?;

        let mut attempt = state.checkout.take().unwrap_or_default();
        let result = self.request_session(state, &mut attempt).await;
        state.checkout = Some(attempt);
        result
    }

    async fn request_session(
        &self,
        state: &SessionState,
        attempt: &mut CheckoutAttempt,
    ) -> Result<CreatedSession, CheckoutError> {
        attempt.begin()?;

        let revalidation = self.revalidate(&state.cart).await;
        attempt.dropped = revalidation.dropped.clone();

        if revalidation.lines.is_empty() {
            attempt.transition(CheckoutState::Rejected)?;
            tracing::warn!(dropped = ?revalidation.dropped, "checkout rejected, no valid items");
            return Err(CheckoutError::NoValidItems {
                dropped: revalidation.dropped,
            });
        }

        let subtotal = revalidation.subtotal();
        let shipping = self.cart_policy.shipping_for(subtotal);
        let order_id = Uuid::new_v7(Timestamp::now(uuid::NoContext)).to_string();
        let customer_email = state.customer.as_ref().map(|c| c.email.clone());

        let mut line_items: Vec<PaymentLine> = revalidation
            .lines
            .iter()
            .map(|line| PaymentLine {
                name: line.title.clone(),
                description: Some(format!("By {}", line.author)),
                image: line.image.clone(),
                unit_amount: to_minor_units(line.unit_price),
                quantity: line.quantity,
            })
            .collect();

        if shipping > 0.0 {
            line_items.push(PaymentLine {
                name: SHIPPING_LINE_NAME.to_string(),
                description: Some(SHIPPING_LINE_DESCRIPTION.to_string()),
                image: None,
                unit_amount: to_minor_units(shipping),
                quantity: 1,
            });
        }

        let request = SessionRequest {
            currency: self.policy.currency.clone(),
            line_items,
            success_url: self.policy.success_url.clone(),
            cancel_url: self.policy.cancel_url.clone(),
            customer_email: customer_email.clone(),
            allowed_countries: self.policy.allowed_countries.clone(),
            metadata: vec![
                ("order_id".to_string(), order_id.clone()),
                ("user_email".to_string(), customer_email.unwrap_or_default()),
            ],
        };

        let session = match self.payments.create_session(&request).await {
            Ok(session) => session,
            Err(error) => {
                attempt.transition(CheckoutState::Rejected)?;
                tracing::error!(%order_id, %error, "payment session creation failed");
                return Err(error.into());
            }
        };

        attempt.transition(CheckoutState::SessionCreated)?;
        attempt.record_session(&session.id);
        attempt.order_id = Some(order_id.clone());

        tracing::info!(
            %order_id,
            session_id = %session.id,
            lines = revalidation.lines.len(),
            dropped = revalidation.dropped.len(),
            subtotal,
            shipping,
            "checkout session created"
        );

        Ok(CreatedSession {
            session_id: session.id,
            url: session.url,
            order_id,
            dropped_items: revalidation.dropped,
            subtotal,
            shipping,
            total: round2(subtotal + shipping),
        })
    }

    /// Provider reported success: settle the attempt and empty the cart.
    ///
    /// Any provider session issued for the current cart is accepted, so a
    /// customer who opened checkout twice may pay in either tab. Revisiting
    /// the success page of a settled session is a no-op.
    pub fn complete(&self, state: &mut SessionState, session_id: Option<&str>) -> Result<(), CheckoutError> {
        let Some(attempt) = state.checkout.as_mut() else {
            return Err(InvalidTransition {
                from: CheckoutState::Idle,
                to: CheckoutState::Completed,
            }
            .into());
        };

        match session_id {
            Some(id) if attempt.is_settled(id) => return Ok(()),
            Some(id) if !attempt.is_open(id) => {
                return Err(CheckoutError::SessionMismatch(id.to_string()));
            }
            None if attempt.state == CheckoutState::Completed => return Ok(()),
            // without an id only the latest provider session can be settled
            None if attempt.state != CheckoutState::SessionCreated => {
                return Err(InvalidTransition {
                    from: attempt.state,
                    to: CheckoutState::Completed,
                }
                .into());
            }
            _ => {}
        }

        attempt.settle()?;
        state.cart.clear();
        tracing::info!(
            order_id = ?attempt.order_id,
            session_id = ?session_id,
            "checkout completed, cart cleared"
        );
        Ok(())
    }

    /// Provider reported cancellation. The cart stays available for retry.
    pub fn cancel(&self, state: &mut SessionState) -> CheckoutState {
        match state.checkout.as_mut() {
            Some(attempt) if attempt.state == CheckoutState::SessionCreated => {
                // SessionCreated -> Cancelled is always valid
                let _ = attempt.transition(CheckoutState::Cancelled);
                tracing::info!(order_id = ?attempt.order_id, "checkout cancelled");
                attempt.state
            }
            Some(attempt) => attempt.state,
            None => CheckoutState::Idle,
        }
    }
}
