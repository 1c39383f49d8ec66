use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shelf_kernel::settings::CurrencySettings;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::feed::RateFeed;
use super::models::{DualPrice, ExchangeRate, RateSource};
use crate::utils::money::Currency;

struct Cached {
    rate: ExchangeRate,
    fetched_at: Instant,
}

/// USD/PEN converter over a single cached rate pair.
///
/// Concurrent readers that find the entry expired may each refetch; the
/// last write wins. A failed fetch caches the configured defaults tagged
/// [`RateSource::Default`] until the entry expires or is invalidated.
pub struct CurrencyConverter {
    feed: Arc<dyn RateFeed>,
    ttl: Duration,
    default_buy: f64,
    default_sell: f64,
    cache: RwLock<Option<Cached>>,
}

impl CurrencyConverter {
    pub fn new(feed: Arc<dyn RateFeed>, settings: &CurrencySettings) -> Self {
        Self {
            feed,
            ttl: Duration::from_secs(settings.ttl_secs),
            default_buy: settings.default_buy,
            default_sell: settings.default_sell,
            cache: RwLock::new(None),
        }
    }

    pub fn default_rate(&self) -> ExchangeRate {
        ExchangeRate {
            buy_rate: self.default_buy,
            sell_rate: self.default_sell,
            as_of: Utc::now().date_naive(),
            source: RateSource::Default,
        }
    }

    /// Current rate pair, served from cache while fresh.
    pub async fn rates(&self) -> ExchangeRate {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.rate;
            }
        }

        let rate = match self.feed.fetch().await {
            Ok(rate) => {
                tracing::info!(
                    buy = rate.buy_rate,
                    sell = rate.sell_rate,
                    as_of = %rate.as_of,
                    "exchange rates updated"
                );
                rate
            }
            Err(error) => {
                let rate = self.default_rate();
                tracing::warn!(
                    %error,
                    buy = rate.buy_rate,
                    sell = rate.sell_rate,
                    "exchange rate fetch failed, using default rates"
                );
                rate
            }
        };

        *self.cache.write().await = Some(Cached {
            rate,
            fetched_at: Instant::now(),
        });
        rate
    }

    /// Force the next read to refetch.
    pub async fn invalidate(&self) {
        self.cache.write().await.take();
        tracing::info!("exchange rate cache cleared");
    }

    pub async fn refresh(&self) -> ExchangeRate {
        self.invalidate().await;
        self.rates().await
    }

    pub async fn buy_rate(&self) -> f64 {
        self.rates().await.buy_rate
    }

    pub async fn sell_rate(&self) -> f64 {
        self.rates().await.sell_rate
    }

    pub async fn usd_to_pen(&self, amount: f64, use_sell: bool) -> f64 {
        self.rates().await.usd_to_pen(amount, use_sell)
    }

    pub async fn pen_to_usd(&self, amount: f64) -> f64 {
        self.rates().await.pen_to_usd(amount)
    }

    pub async fn convert(&self, amount: f64, from: Currency) -> f64 {
        self.rates().await.convert(amount, from)
    }

    pub async fn both_prices(&self, amount: Option<f64>, from: Currency) -> DualPrice {
        if amount.is_none() {
            return DualPrice::not_for_sale();
        }
        self.rates().await.dual_price(amount, from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::currency::feed::testing::FixedFeed;

    fn converter(feed: Arc<FixedFeed>) -> CurrencyConverter {
        CurrencyConverter::new(feed, &CurrencySettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn caches_for_twelve_hours() {
        let feed = Arc::new(FixedFeed::new(3.7, 3.8));
        let converter = converter(feed.clone());

        converter.rates().await;
        tokio::time::advance(Duration::from_secs(12 * 3600 - 1)).await;
        converter.rates().await;
        assert_eq!(feed.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        converter.rates().await;
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let feed = Arc::new(FixedFeed::new(3.7, 3.8));
        let converter = converter(feed.clone());

        converter.rates().await;
        let refreshed = converter.refresh().await;
        assert_eq!(feed.calls(), 2);
        assert_eq!(refreshed.source, RateSource::Provider);
    }

    #[tokio::test]
    async fn failure_falls_back_to_tagged_defaults() {
        let converter = converter(Arc::new(FixedFeed::failing()));

        let rate = converter.rates().await;
        assert!(rate.is_default());
        assert_eq!(rate.buy_rate, 3.387);
        assert_eq!(rate.sell_rate, 3.396);
        assert_eq!(converter.usd_to_pen(100.0, false).await, 338.7);
        assert_eq!(converter.usd_to_pen(100.0, true).await, 339.6);
    }

    #[tokio::test]
    async fn conversions_use_buy_and_sell_respectively() {
        let converter = converter(Arc::new(FixedFeed::new(3.5, 4.0)));

        assert_eq!(converter.convert(10.0, Currency::Usd).await, 35.0);
        assert_eq!(converter.convert(40.0, Currency::Pen).await, 10.0);
        assert_eq!(converter.buy_rate().await, 3.5);
        assert_eq!(converter.sell_rate().await, 4.0);
    }

    #[tokio::test]
    async fn not_for_sale_skips_the_feed() {
        let feed = Arc::new(FixedFeed::new(3.5, 4.0));
        let converter = converter(feed.clone());
        assert!(!converter.both_prices(None, Currency::Usd).await.for_sale);
        assert_eq!(feed.calls(), 0);
    }
}
