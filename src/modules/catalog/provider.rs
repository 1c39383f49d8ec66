use async_trait::async_trait;
use thiserror::Error;

use super::models::{Book, SearchPage};
use super::query::CatalogQuery;

const RELATED_FETCH: u32 = 8;
const RELATED_LIMIT: usize = 6;

/// Failures talking to a book data provider. These never leave the read
/// path: providers log them and answer with an empty page.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog provider returned HTTP {0}")]
    Status(u16),

    #[error("catalog provider reported failure: {0}")]
    Rejected(String),
}

/// Capability shared by every book data provider and by the fallback chain.
///
/// Implementations must swallow upstream failures and answer with an empty
/// page so the storefront stays browsable during outages.
#[async_trait]
pub trait BookLookup: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, offset: u32, limit: u32) -> SearchPage;

    async fn get_by_isbn(&self, isbn: &str) -> Option<Book> {
        let query = CatalogQuery::Isbn(isbn.to_string()).to_string();
        let found = self.search(&query, 0, 1).await.items.into_iter().next();
        match &found {
            Some(book) => tracing::info!(provider = self.name(), %isbn, title = %book.title, "book found by ISBN"),
            None => tracing::warn!(provider = self.name(), %isbn, "book not found by ISBN"),
        }
        found
    }

    async fn by_subject(&self, subject: &str, offset: u32, limit: u32) -> SearchPage {
        let query = CatalogQuery::Subject(subject.to_string()).to_string();
        self.search(&query, offset, limit).await
    }

    async fn by_author(&self, author: &str, offset: u32, limit: u32) -> SearchPage {
        let query = CatalogQuery::Author(author.to_string()).to_string();
        self.search(&query, offset, limit).await
    }

    async fn by_title(&self, title: &str, offset: u32, limit: u32) -> SearchPage {
        let query = CatalogQuery::Title(title.to_string()).to_string();
        self.search(&query, offset, limit).await
    }

    /// Other books in the same primary category, excluding `book` itself.
    async fn related(&self, book: &Book) -> Vec<Book> {
        let Some(category) = book.category.as_deref() else {
            return Vec::new();
        };

        self.by_subject(category, 0, RELATED_FETCH)
            .await
            .items
            .into_iter()
            .filter(|candidate| candidate.isbn != book.isbn)
            .take(RELATED_LIMIT)
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{priced_book, StaticCatalog};
    use super::*;

    #[tokio::test]
    async fn get_by_isbn_goes_through_search() {
        let catalog = StaticCatalog::new("static", vec![priced_book("111", "Dune", Some(20.0))]);

        let book = catalog.get_by_isbn("111").await.unwrap();
        assert_eq!(book.title, "Dune");
        assert!(catalog.get_by_isbn("999").await.is_none());
        assert_eq!(catalog.calls(), vec!["isbn:111", "isbn:999"]);
    }

    #[tokio::test]
    async fn related_excludes_the_book_itself() {
        let mut books = Vec::new();
        for i in 0..9 {
            let mut book = priced_book(&format!("{i}"), &format!("Book {i}"), Some(10.0));
            book.category = Some("Fantasy".into());
            book.categories = vec!["Fantasy".into()];
            books.push(book);
        }
        let subject = books[0].clone();
        let catalog = StaticCatalog::new("static", books);

        let related = catalog.related(&subject).await;
        assert_eq!(related.len(), 6);
        assert!(related.iter().all(|b| b.isbn != subject.isbn));
        assert_eq!(catalog.calls(), vec!["subject:Fantasy"]);
    }

    #[tokio::test]
    async fn related_without_category_is_empty() {
        let catalog = StaticCatalog::new("static", vec![]);
        assert!(catalog.related(&Book::new("1")).await.is_empty());
        assert!(catalog.calls().is_empty());
    }
}
