//! Collaborators shared by every storefront module.

use std::sync::Arc;

use anyhow::Context;
use shelf_kernel::settings::Settings;

use crate::modules::auth::Authenticator;
use crate::modules::cart::CartPolicy;
use crate::modules::catalog::bookstore::BookstoreClient;
use crate::modules::catalog::query::SearchLimits;
use crate::modules::catalog::volumes::VolumesClient;
use crate::modules::catalog::{BookLookup, FallbackCatalog};
use crate::modules::checkout::{CheckoutOrchestrator, CheckoutPolicy, StripeGateway};
use crate::modules::currency::{CurrencyConverter, HttpRateFeed};
use crate::session::{InMemorySessionStore, SessionStore};

pub struct AppServices {
    /// Provider chain: the bookstore service when configured, then the public catalog
    pub catalog: Arc<dyn BookLookup>,
    pub currency: Arc<CurrencyConverter>,
    pub sessions: Arc<dyn SessionStore>,
    pub checkout: CheckoutOrchestrator,
    /// Present only when the bookstore service is configured
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub cart_policy: CartPolicy,
    pub search_limits: SearchLimits,
    pub publishable_key: Option<String>,
}

impl AppServices {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Arc<Self>> {
        let mut providers: Vec<Arc<dyn BookLookup>> = Vec::new();
        let mut authenticator: Option<Arc<dyn Authenticator>> = None;

        if let Some(base_url) = settings
            .catalog
            .bookstore_base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
        {
            let bookstore = Arc::new(
                BookstoreClient::new(base_url, &settings.catalog)
                    .context("failed to build bookstore client")?,
            );
            providers.push(bookstore.clone());
            authenticator = Some(bookstore);
        }

        providers.push(Arc::new(
            VolumesClient::new(&settings.catalog).context("failed to build public catalog client")?,
        ));

        let catalog = FallbackCatalog::new(providers);
        tracing::info!(providers = ?catalog.provider_names(), "catalog providers configured");
        let catalog: Arc<dyn BookLookup> = Arc::new(catalog);

        let feed = HttpRateFeed::new(&settings.currency).context("failed to build rate feed client")?;
        let currency = Arc::new(CurrencyConverter::new(Arc::new(feed), &settings.currency));

        let payments = StripeGateway::new(&settings.checkout).context("failed to build payment client")?;
        let cart_policy = CartPolicy::from(&settings.cart);
        let checkout = CheckoutOrchestrator::new(
            catalog.clone(),
            Arc::new(payments),
            CheckoutPolicy::from_settings(&settings.checkout, &settings.server),
            cart_policy,
        );

        Ok(Arc::new(Self {
            catalog,
            currency,
            sessions: Arc::new(InMemorySessionStore::from_settings(&settings.session)),
            checkout,
            authenticator,
            cart_policy,
            search_limits: SearchLimits::from(&settings.catalog),
            publishable_key: settings.checkout.publishable_key.clone(),
        }))
    }
}
