use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::money::{format_price, round2, Currency};

pub const NOT_FOR_SALE_USD: &str = "NOT FOR SALE";
pub const NOT_FOR_SALE_PEN: &str = "NO EN VENTA";

/// Where a rate pair came from. `Default` marks degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Provider,
    Default,
}

/// Buy/sell pair for USD/PEN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// Applied when converting USD into PEN
    pub buy_rate: f64,
    /// Applied (as its reciprocal) when converting PEN into USD
    pub sell_rate: f64,
    pub as_of: NaiveDate,
    pub source: RateSource,
}

impl ExchangeRate {
    pub fn is_default(&self) -> bool {
        self.source == RateSource::Default
    }

    pub fn usd_to_pen(&self, amount: f64, use_sell: bool) -> f64 {
        let rate = if use_sell { self.sell_rate } else { self.buy_rate };
        round2(amount * rate)
    }

    pub fn pen_to_usd(&self, amount: f64) -> f64 {
        round2(amount * (1.0 / self.sell_rate))
    }

    pub fn convert(&self, amount: f64, from: Currency) -> f64 {
        match from {
            Currency::Usd => self.usd_to_pen(amount, false),
            Currency::Pen => self.pen_to_usd(amount),
        }
    }

    /// Rate applied by [`ExchangeRate::convert`] for `from`.
    pub fn rate_for(&self, from: Currency) -> f64 {
        match from {
            Currency::Usd => self.buy_rate,
            Currency::Pen => self.sell_rate,
        }
    }

    pub fn dual_price(&self, amount: Option<f64>, from: Currency) -> DualPrice {
        let Some(amount) = amount.filter(|a| a.is_finite() && *a > 0.0) else {
            return DualPrice::not_for_sale();
        };

        let converted = self.convert(amount, from);
        let (usd, pen) = match from {
            Currency::Usd => (amount, converted),
            Currency::Pen => (converted, amount),
        };

        DualPrice {
            for_sale: true,
            usd_value: Some(usd),
            pen_value: Some(pen),
            usd_formatted: format_price(usd, Currency::Usd),
            pen_formatted: format_price(pen, Currency::Pen),
            rate_used: Some(self.rate_for(from)),
        }
    }
}

/// A price rendered in both storefront currencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DualPrice {
    pub for_sale: bool,
    pub usd_value: Option<f64>,
    pub pen_value: Option<f64>,
    pub usd_formatted: String,
    pub pen_formatted: String,
    pub rate_used: Option<f64>,
}

impl DualPrice {
    pub fn not_for_sale() -> Self {
        Self {
            for_sale: false,
            usd_value: None,
            pen_value: None,
            usd_formatted: NOT_FOR_SALE_USD.to_string(),
            pen_formatted: NOT_FOR_SALE_PEN.to_string(),
            rate_used: None,
        }
    }
}
