use std::fmt;

use shelf_kernel::settings::CatalogSettings;

/// A catalog lookup, rendered into the provider's `q` syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    Text(String),
    Isbn(String),
    Subject(String),
    Author(String),
    Title(String),
}

impl CatalogQuery {
    /// Build a query from an optional field selector (`isbn`, `subject`,
    /// `author`, `title`); no selector means free text.
    pub fn from_field(field: Option<&str>, term: impl Into<String>) -> Option<Self> {
        let term = term.into();
        let query = match field.map(str::trim).filter(|f| !f.is_empty()) {
            None | Some("text") => Self::Text(term),
            Some("isbn") => Self::Isbn(term),
            Some("subject") | Some("category") => Self::Subject(term),
            Some("author") => Self::Author(term),
            Some("title") => Self::Title(term),
            Some(_) => return None,
        };
        Some(query)
    }

    pub fn term(&self) -> &str {
        match self {
            Self::Text(t) | Self::Isbn(t) | Self::Subject(t) | Self::Author(t) | Self::Title(t) => t,
        }
    }

    fn prefix(&self) -> Option<&'static str> {
        match self {
            Self::Text(_) => None,
            Self::Isbn(_) => Some("isbn:"),
            Self::Subject(_) => Some("subject:"),
            Self::Author(_) => Some("inauthor:"),
            Self::Title(_) => Some("intitle:"),
        }
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix() {
            Some(prefix) => write!(f, "{}{}", prefix, self.term().trim()),
            None => write!(f, "{}", self.term().trim()),
        }
    }
}

/// Paging limits imposed by the public catalog provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_results: u32,
    pub max_start_index: u32,
}

impl SearchLimits {
    /// Clamp a requested page size into `[1, max_results]`.
    pub fn clamp_limit(&self, limit: u32) -> u32 {
        limit.clamp(1, self.max_results.max(1))
    }

    /// Offsets past the provider maximum are answered with an empty page.
    pub fn accepts_offset(&self, offset: u32) -> bool {
        offset <= self.max_start_index
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_results: 40,
            max_start_index: 1000,
        }
    }
}

impl From<&CatalogSettings> for SearchLimits {
    fn from(settings: &CatalogSettings) -> Self {
        Self {
            max_results: settings.max_results,
            max_start_index: settings.max_start_index,
        }
    }
}

/// Whitespace-only queries never reach a provider.
pub fn is_blank(query: &str) -> bool {
    query.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_prefixes() {
        assert_eq!(CatalogQuery::Isbn("9780".into()).to_string(), "isbn:9780");
        assert_eq!(
            CatalogQuery::Subject("Fantasy".into()).to_string(),
            "subject:Fantasy"
        );
        assert_eq!(
            CatalogQuery::Author("Le Guin".into()).to_string(),
            "inauthor:Le Guin"
        );
        assert_eq!(
            CatalogQuery::Title("Dune".into()).to_string(),
            "intitle:Dune"
        );
        assert_eq!(CatalogQuery::Text(" dune ".into()).to_string(), "dune");
    }

    #[test]
    fn from_field_maps_selectors() {
        assert_eq!(
            CatalogQuery::from_field(None, "x"),
            Some(CatalogQuery::Text("x".into()))
        );
        assert_eq!(
            CatalogQuery::from_field(Some("author"), "x"),
            Some(CatalogQuery::Author("x".into()))
        );
        assert_eq!(
            CatalogQuery::from_field(Some("category"), "x"),
            Some(CatalogQuery::Subject("x".into()))
        );
        assert_eq!(CatalogQuery::from_field(Some("publisher"), "x"), None);
    }

    #[test]
    fn limits_clamp_and_reject() {
        let limits = SearchLimits::default();
        assert_eq!(limits.clamp_limit(100), 40);
        assert_eq!(limits.clamp_limit(0), 1);
        assert_eq!(limits.clamp_limit(20), 20);
        assert!(limits.accepts_offset(1000));
        assert!(!limits.accepts_offset(1001));
    }
}
