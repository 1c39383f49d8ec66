use serde::{Deserialize, Serialize};

use crate::modules::currency::DualPrice;

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_AUTHOR: &str = "Unknown author";
pub const DEFAULT_LANGUAGE: &str = "es";
pub const DEFAULT_CURRENCY: &str = "USD";

/// Canonical book shape shared by every catalog provider.
///
/// Built fresh on every lookup; `isbn` is never empty and falls back to the
/// provider's own id when the record carries no ISBN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Provider-internal identifier, when the provider exposes one
    pub id: Option<String>,
    pub isbn: String,
    pub title: String,
    /// All authors joined for display
    pub author: String,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    /// First entry of `categories`
    pub category: Option<String>,
    pub categories: Vec<String>,
    pub page_count: Option<u32>,
    pub language: String,
    pub thumbnail: Option<String>,
    pub large_image: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    /// True only when the provider explicitly marks the item for sale
    pub available: bool,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    pub rating: Option<f64>,
    pub ratings_count: Option<u32>,
}

impl Book {
    /// Minimal book with placeholder metadata; the provider fills in the rest.
    pub fn new(isbn: impl Into<String>) -> Self {
        Self {
            id: None,
            isbn: isbn.into(),
            title: UNTITLED.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            publisher: None,
            published_date: None,
            description: None,
            category: None,
            categories: Vec::new(),
            page_count: None,
            language: DEFAULT_LANGUAGE.to_string(),
            thumbnail: None,
            large_image: None,
            price: None,
            currency: DEFAULT_CURRENCY.to_string(),
            available: false,
            preview_link: None,
            info_link: None,
            rating: None,
            ratings_count: None,
        }
    }

    /// Price usable for a sale: present, finite and strictly positive.
    pub fn sale_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn is_purchasable(&self) -> bool {
        self.sale_price().is_some()
    }

    /// Image used for cart lines: the thumbnail, else the large cover.
    pub fn cover(&self) -> Option<&str> {
        self.thumbnail.as_deref().or(self.large_image.as_deref())
    }
}

/// One page of catalog results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub items: Vec<Book>,
    pub total_items: u64,
}

impl SearchPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of pages of `size` needed to show `total_items`.
    pub fn total_pages(&self, size: u32) -> u64 {
        if size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(size))
    }
}

/// Search response with 1-based pagination metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub items: Vec<Book>,
    pub total_items: u64,
    pub total_pages: u64,
    pub page: u32,
    pub size: u32,
}

impl CatalogPage {
    pub fn from_search(result: SearchPage, page: u32, size: u32) -> Self {
        let total_pages = result.total_pages(size);
        Self {
            items: result.items,
            total_items: result.total_items,
            total_pages,
            page,
            size,
        }
    }
}

/// Book detail with recommendations from the same category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    pub book: Book,
    pub related: Vec<Book>,
    /// Sale price shown in both storefront currencies
    pub prices: DualPrice,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryEntry {
    pub id: usize,
    pub name: &'static str,
}

/// Categories offered for browsing.
pub const POPULAR_CATEGORIES: &[&str] = &[
    "Fiction",
    "Mystery",
    "Science Fiction",
    "Fantasy",
    "Romance",
    "Thriller",
    "Biography",
    "History",
    "Self-Help",
    "Business",
    "Science",
    "Technology",
];

pub fn popular_categories() -> Vec<CategoryEntry> {
    POPULAR_CATEGORIES
        .iter()
        .enumerate()
        .map(|(index, name)| CategoryEntry {
            id: index + 1,
            name,
        })
        .collect()
}
