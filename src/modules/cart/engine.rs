//! Session-scoped shopping cart.
//!
//! The cart is plain data owned by the session state; every operation takes
//! the [`CartPolicy`] that carries the storefront's pricing constants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shelf_kernel::settings::CartSettings;

use crate::modules::catalog::Book;
use crate::utils::money::round2;

/// Pricing and quantity rules applied to every cart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartPolicy {
    /// Unit price used when the book carries no numeric price
    pub default_unit_price: f64,
    pub free_shipping_threshold: f64,
    pub shipping_fee: f64,
    pub max_quantity: u32,
}

impl CartPolicy {
    pub fn shipping_for(&self, subtotal: f64) -> f64 {
        if subtotal >= self.free_shipping_threshold {
            0.0
        } else {
            self.shipping_fee
        }
    }

    pub fn clamp_quantity(&self, quantity: i64) -> u32 {
        let max = i64::from(self.max_quantity.max(1));
        // bounded by max above, so the cast cannot truncate
        quantity.clamp(1, max) as u32
    }
}

impl Default for CartPolicy {
    fn default() -> Self {
        Self::from(&CartSettings::default())
    }
}

impl From<&CartSettings> for CartPolicy {
    fn from(settings: &CartSettings) -> Self {
        Self {
            default_unit_price: settings.default_unit_price,
            free_shipping_threshold: settings.free_shipping_threshold,
            shipping_fee: settings.shipping_fee,
            max_quantity: settings.max_quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub image: Option<String>,
    pub unit_price: f64,
    pub quantity: u32,
}

impl CartLineItem {
    pub fn subtotal(&self) -> f64 {
        round2(self.unit_price * f64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub item_count: u32,
    pub unique_items: usize,
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
    pub is_empty: bool,
}

/// One line of the checkout hand-off. Prices here are informational only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDraft {
    pub items: Vec<DraftLine>,
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
    pub item_count: u32,
}

/// Mapping isbn -> line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: BTreeMap<String, CartLineItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` copies of `book`. Re-adding an isbn increments the
    /// existing line; the upper quantity bound is only enforced by
    /// [`Cart::update_quantity`].
    pub fn add_item(&mut self, book: &Book, quantity: u32, policy: &CartPolicy) {
        if quantity == 0 {
            return;
        }

        if let Some(line) = self.items.get_mut(&book.isbn) {
            line.quantity = line.quantity.saturating_add(quantity);
            return;
        }

        let unit_price = book
            .price
            .filter(|p| p.is_finite())
            .unwrap_or(policy.default_unit_price);

        self.items.insert(
            book.isbn.clone(),
            CartLineItem {
                isbn: book.isbn.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                image: book.cover().map(str::to_string),
                unit_price,
                quantity,
            },
        );
    }

    /// Set the quantity of an existing line, clamped to `[1, max]`.
    /// Zero or negative removes the line; unknown isbns are ignored.
    pub fn update_quantity(&mut self, isbn: &str, quantity: i64, policy: &CartPolicy) {
        if quantity <= 0 {
            self.remove_item(isbn);
            return;
        }

        if let Some(line) = self.items.get_mut(isbn) {
            line.quantity = policy.clamp_quantity(quantity);
        }
    }

    pub fn remove_item(&mut self, isbn: &str) -> Option<CartLineItem> {
        self.items.remove(isbn)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> impl Iterator<Item = &CartLineItem> {
        self.items.values()
    }

    pub fn get_item(&self, isbn: &str) -> Option<&CartLineItem> {
        self.items.get(isbn)
    }

    pub fn has_item(&self, isbn: &str) -> bool {
        self.items.contains_key(isbn)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of `unit_price * quantity`, rounded to cents.
    pub fn total(&self) -> f64 {
        round2(
            self.items
                .values()
                .map(|line| line.unit_price * f64::from(line.quantity))
                .sum(),
        )
    }

    pub fn item_subtotal(&self, isbn: &str) -> f64 {
        self.items.get(isbn).map_or(0.0, CartLineItem::subtotal)
    }

    /// Sum of quantities across lines.
    pub fn item_count(&self) -> u32 {
        self.items
            .values()
            .fold(0u32, |count, line| count.saturating_add(line.quantity))
    }

    pub fn unique_item_count(&self) -> usize {
        self.items.len()
    }

    pub fn shipping_cost(&self, policy: &CartPolicy) -> f64 {
        policy.shipping_for(self.total())
    }

    pub fn final_total(&self, policy: &CartPolicy) -> f64 {
        round2(self.total() + self.shipping_cost(policy))
    }

    pub fn summary(&self, policy: &CartPolicy) -> CartSummary {
        CartSummary {
            item_count: self.item_count(),
            unique_items: self.unique_item_count(),
            subtotal: self.total(),
            shipping: self.shipping_cost(policy),
            total: self.final_total(policy),
            is_empty: self.is_empty(),
        }
    }

    pub fn prepare_for_checkout(&self, policy: &CartPolicy) -> CheckoutDraft {
        let items = self
            .items
            .values()
            .map(|line| DraftLine {
                isbn: line.isbn.clone(),
                title: line.title.clone(),
                author: line.author.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal(),
            })
            .collect();

        CheckoutDraft {
            items,
            subtotal: self.total(),
            shipping: self.shipping_cost(policy),
            total: self.final_total(policy),
            item_count: self.item_count(),
        }
    }
}
