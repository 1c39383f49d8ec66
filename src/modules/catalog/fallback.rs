use std::sync::Arc;

use async_trait::async_trait;

use super::models::{Book, SearchPage};
use super::provider::BookLookup;

/// Ordered provider chain. The first provider with a non-empty answer wins;
/// results from different providers are never merged.
pub struct FallbackCatalog {
    providers: Vec<Arc<dyn BookLookup>>,
}

impl FallbackCatalog {
    pub fn new(providers: Vec<Arc<dyn BookLookup>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl BookLookup for FallbackCatalog {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn search(&self, query: &str, offset: u32, limit: u32) -> SearchPage {
        for (position, provider) in self.providers.iter().enumerate() {
            let page = provider.search(query, offset, limit).await;
            if !page.is_empty() {
                if position > 0 {
                    tracing::info!(provider = provider.name(), %query, "served by fallback provider");
                }
                return page;
            }
            tracing::warn!(provider = provider.name(), %query, "provider returned no results");
        }
        SearchPage::empty()
    }

    async fn get_by_isbn(&self, isbn: &str) -> Option<Book> {
        for provider in &self.providers {
            if let Some(book) = provider.get_by_isbn(isbn).await {
                return Some(book);
            }
            tracing::warn!(provider = provider.name(), %isbn, "ISBN not found, trying next provider");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::provider::testing::{priced_book, StaticCatalog};

    #[tokio::test]
    async fn primary_results_are_returned_without_touching_secondary() {
        let primary = Arc::new(StaticCatalog::new(
            "primary",
            vec![priced_book("1", "Dune", Some(10.0))],
        ));
        let secondary = Arc::new(StaticCatalog::new(
            "secondary",
            vec![priced_book("2", "Dune Messiah", Some(12.0))],
        ));
        let catalog = FallbackCatalog::new(vec![primary.clone(), secondary.clone()]);

        let page = catalog.search("Dune", 0, 10).await;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].isbn, "1");
        assert!(secondary.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_primary_falls_through_to_secondary() {
        let primary = Arc::new(StaticCatalog::new("primary", vec![]));
        let secondary = Arc::new(StaticCatalog::new(
            "secondary",
            vec![priced_book("2", "Dune Messiah", Some(12.0))],
        ));
        let catalog = FallbackCatalog::new(vec![primary.clone(), secondary.clone()]);

        let page = catalog.search("Dune", 0, 10).await;
        assert_eq!(page.items[0].isbn, "2");
        assert_eq!(primary.calls(), vec!["Dune"]);
        assert_eq!(secondary.calls(), vec!["Dune"]);

        let book = catalog.get_by_isbn("2").await.unwrap();
        assert_eq!(book.title, "Dune Messiah");
        assert!(catalog.get_by_isbn("3").await.is_none());
    }

    #[tokio::test]
    async fn no_providers_means_empty() {
        let catalog = FallbackCatalog::new(vec![]);
        assert!(catalog.search("Dune", 0, 10).await.is_empty());
        assert!(catalog.provider_names().is_empty());
    }
}
