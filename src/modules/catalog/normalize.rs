//! Raw public-catalog records and their normalization into [`Book`].

use serde::Deserialize;

use super::models::{Book, DEFAULT_CURRENCY, DEFAULT_LANGUAGE, UNKNOWN_AUTHOR, UNTITLED};

const FOR_SALE: &str = "FOR_SALE";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeList {
    #[serde(default)]
    pub items: Vec<Volume>,
    #[serde(default)]
    pub total_items: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: Option<String>,
    #[serde(default)]
    pub volume_info: VolumeInfo,
    #[serde(default)]
    pub sale_info: SaleInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub page_count: Option<u32>,
    pub language: Option<String>,
    pub image_links: Option<ImageLinks>,
    pub preview_link: Option<String>,
    pub info_link: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u32>,
    #[serde(default)]
    pub industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleInfo {
    pub saleability: Option<String>,
    pub list_price: Option<ListPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPrice {
    pub amount: Option<f64>,
    pub currency_code: Option<String>,
}

/// ISBN-13 first, then ISBN-10.
pub fn extract_isbn(identifiers: &[IndustryIdentifier]) -> Option<&str> {
    ["ISBN_13", "ISBN_10"].iter().find_map(|kind| {
        identifiers
            .iter()
            .find(|id| id.kind == *kind && !id.identifier.trim().is_empty())
            .map(|id| id.identifier.trim())
    })
}

/// Largest available cover: large, then medium, then thumbnail.
pub fn largest_image(links: &ImageLinks) -> Option<&str> {
    [&links.large, &links.medium, &links.thumbnail]
        .into_iter()
        .find_map(|link| link.as_deref())
}

/// Normalize one raw record. Records with neither an ISBN nor an id are skipped.
pub fn normalize_volume(volume: Volume) -> Option<Book> {
    let Volume {
        id,
        volume_info: info,
        sale_info,
    } = volume;

    let isbn = extract_isbn(&info.industry_identifiers)
        .map(str::to_string)
        .or_else(|| id.clone().filter(|id| !id.trim().is_empty()))?;

    let (price, currency) = match sale_info.list_price {
        Some(list) => (
            list.amount,
            list.currency_code
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        ),
        None => (None, DEFAULT_CURRENCY.to_string()),
    };

    let author = if info.authors.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        info.authors.join(", ")
    };

    let (thumbnail, large_image) = match &info.image_links {
        Some(links) => (
            links.thumbnail.clone(),
            largest_image(links).map(str::to_string),
        ),
        None => (None, None),
    };

    Some(Book {
        id,
        isbn,
        title: info.title.unwrap_or_else(|| UNTITLED.to_string()),
        author,
        publisher: info.publisher,
        published_date: info.published_date,
        description: info.description,
        category: info.categories.first().cloned(),
        categories: info.categories,
        page_count: info.page_count,
        language: info
            .language
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        thumbnail,
        large_image,
        price,
        currency,
        available: sale_info.saleability.as_deref() == Some(FOR_SALE),
        preview_link: info.preview_link,
        info_link: info.info_link,
        rating: info.average_rating,
        ratings_count: info.ratings_count,
    })
}

pub fn normalize_volumes(volumes: Vec<Volume>) -> Vec<Book> {
    volumes.into_iter().filter_map(normalize_volume).collect()
}
