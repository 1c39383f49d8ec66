//! Remote source of the daily USD/PEN rate pair.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shelf_kernel::settings::CurrencySettings;
use thiserror::Error;

use super::models::{ExchangeRate, RateSource};

#[derive(Debug, Error)]
pub enum CurrencyError {
    #[error("rate provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate provider returned HTTP {0}")]
    Status(u16),

    #[error("malformed rate payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait RateFeed: Send + Sync {
    async fn fetch(&self) -> Result<ExchangeRate, CurrencyError>;
}

/// `{compra, venta, fecha}` as published by the rate provider.
#[derive(Debug, Deserialize)]
struct Quote {
    compra: Option<f64>,
    venta: Option<f64>,
    fecha: Option<String>,
}

impl Quote {
    fn into_rate(self) -> Result<ExchangeRate, CurrencyError> {
        let valid = |value: Option<f64>, name: &str| {
            value
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| CurrencyError::Malformed(format!("missing or invalid {}", name)))
        };

        let as_of = self
            .fecha
            .as_deref()
            .and_then(|date| NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok())
            .unwrap_or_else(|| Utc::now().date_naive());

        Ok(ExchangeRate {
            buy_rate: valid(self.compra, "compra")?,
            sell_rate: valid(self.venta, "venta")?,
            as_of,
            source: RateSource::Provider,
        })
    }
}

pub struct HttpRateFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpRateFeed {
    pub fn new(settings: &CurrencySettings) -> Result<Self, CurrencyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: settings.rates_url.clone(),
        })
    }
}

#[async_trait]
impl RateFeed for HttpRateFeed {
    async fn fetch(&self) -> Result<ExchangeRate, CurrencyError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(CurrencyError::Status(response.status().as_u16()));
        }

        let quote: Quote = response
            .json()
            .await
            .map_err(|e| CurrencyError::Malformed(e.to_string()))?;
        quote.into_rate()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Feed returning a fixed pair, or failing, while counting calls.
    pub struct FixedFeed {
        pub rate: Option<ExchangeRate>,
        pub calls: AtomicUsize,
    }

    impl FixedFeed {
        pub fn new(buy: f64, sell: f64) -> Self {
            Self {
                rate: Some(ExchangeRate {
                    buy_rate: buy,
                    sell_rate: sell,
                    as_of: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                    source: RateSource::Provider,
                }),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                rate: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateFeed for FixedFeed {
        async fn fetch(&self) -> Result<ExchangeRate, CurrencyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rate
                .ok_or_else(|| CurrencyError::Malformed("feed offline".into()))
        }
    }
}
