//! Pure money helpers shared by the cart, currency and checkout modules.

use serde::{Deserialize, Serialize};

/// Currencies the storefront prices in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Pen,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Pen => "PEN",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Pen => "S/",
        }
    }

    /// The other side of the USD/PEN pair.
    pub fn counterpart(&self) -> Currency {
        match self {
            Currency::Usd => Currency::Pen,
            Currency::Pen => Currency::Usd,
        }
    }

    pub fn parse(code: &str) -> Option<Currency> {
        match code.trim().to_ascii_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "PEN" => Some(Currency::Pen),
            _ => None,
        }
    }
}

/// Round to two decimals, halves away from zero.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Convert a major-unit amount to integer minor units (cents).
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Render an amount with two decimals and comma thousands separators.
pub fn format_amount(amount: f64) -> String {
    let cents = to_minor_units(amount.abs());
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents != 0 { "-" } else { "" };
    format!("{sign}{grouped}.{fraction:02}")
}

/// Format a price with its currency symbol, e.g. `S/ 1,234.50`.
pub fn format_price(amount: f64, currency: Currency) -> String {
    format!("{} {}", currency.symbol(), format_amount(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_uses_half_away_from_zero() {
        assert_eq!(round2(2.675_000_1), 2.68);
        assert_eq!(round2(10.0 / 3.0), 3.33);
        assert_eq!(round2(-1.555_000_1), -1.56);
    }

    #[test]
    fn minor_units_do_not_truncate_binary_noise() {
        assert_eq!(to_minor_units(19.99), 1999);
        assert_eq!(to_minor_units(0.29), 29);
        assert_eq!(to_minor_units(5.0), 500);
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(1234.5), "1,234.50");
        assert_eq!(format_amount(1_234_567.891), "1,234,567.89");
        assert_eq!(format_amount(-42.1), "-42.10");
    }

    #[test]
    fn format_price_uses_symbol() {
        assert_eq!(format_price(84.68, Currency::Pen), "S/ 84.68");
        assert_eq!(format_price(25.0, Currency::Usd), "$ 25.00");
    }

    #[test]
    fn currency_parse_and_counterpart() {
        assert_eq!(Currency::parse("usd"), Some(Currency::Usd));
        assert_eq!(Currency::parse(" PEN "), Some(Currency::Pen));
        assert_eq!(Currency::parse("EUR"), None);
        assert_eq!(Currency::Usd.counterpart(), Currency::Pen);
    }
}
