use crate::error::{QuoteDocError, Result};
use quotedoc_contract::QuoteRequest;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Read-only access to quote projections (a request with its items, their
/// products and the response) as the relational data API returns them.
pub trait QuoteSource {
    fn fetch_quote(&self, id: &str) -> Result<QuoteRequest>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryQuoteSource {
    quotes: HashMap<String, QuoteRequest>,
}

impl InMemoryQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quote: QuoteRequest) -> Option<QuoteRequest> {
        self.quotes.insert(quote.id.clone(), quote)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl FromIterator<QuoteRequest> for InMemoryQuoteSource {
    fn from_iter<I: IntoIterator<Item = QuoteRequest>>(iter: I) -> Self {
        let mut source = Self::new();
        for quote in iter {
            source.insert(quote);
        }
        source
    }
}

impl QuoteSource for InMemoryQuoteSource {
    fn fetch_quote(&self, id: &str) -> Result<QuoteRequest> {
        self.quotes
            .get(id)
            .cloned()
            .ok_or_else(|| QuoteDocError::QuoteNotFound(id.to_string()))
    }
}

/// One `<id>.json` file per quote, holding the nested projection.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        safe.then(|| self.dir.join(format!("{id}.json")))
    }
}

impl QuoteSource for JsonDirSource {
    fn fetch_quote(&self, id: &str) -> Result<QuoteRequest> {
        let Some(path) = self.path_for(id) else {
            return Err(QuoteDocError::QuoteNotFound(id.to_string()));
        };
        let raw = std::fs::read_to_string(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => QuoteDocError::QuoteNotFound(id.to_string()),
            _ => QuoteDocError::SourceUnavailable(format!("{}: {err}", path.display())),
        })?;
        let quote = QuoteRequest::from_json(&raw)?;
        tracing::debug!(quote = %id, items = quote.items.len(), "quote loaded");
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE: &str = r#"{ "id": "q-100", "customer_name": "Acme", "quote_items": [] }"#;

    #[test]
    fn in_memory_source_finds_by_id() {
        let source: InMemoryQuoteSource =
            [QuoteRequest::from_json(QUOTE).unwrap()].into_iter().collect();
        assert_eq!(source.len(), 1);
        assert_eq!(source.fetch_quote("q-100").unwrap().id, "q-100");
        assert!(matches!(
            source.fetch_quote("q-404"),
            Err(QuoteDocError::QuoteNotFound(_))
        ));
    }

    #[test]
    fn json_dir_source_reads_and_guards_paths() {
        let dir = std::env::temp_dir().join(format!("quotedoc_source_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("q-100.json"), QUOTE).unwrap();
        std::fs::write(dir.join("broken.json"), "{ not json").unwrap();
        let source = JsonDirSource::new(&dir);

        assert_eq!(
            source.fetch_quote("q-100").unwrap().customer_name.as_deref(),
            Some("Acme")
        );
        assert!(matches!(
            source.fetch_quote("missing"),
            Err(QuoteDocError::QuoteNotFound(_))
        ));
        assert!(matches!(
            source.fetch_quote("../q-100"),
            Err(QuoteDocError::QuoteNotFound(_))
        ));
        assert!(matches!(
            source.fetch_quote("broken"),
            Err(QuoteDocError::Contract(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
