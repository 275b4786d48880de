//! Catalog Search Collaborator
//!
//! Thin client over the remote card catalog. The catalog is the sole source
//! of truth for candidates; nothing is cached locally. The matcher in
//! [`matcher`] ranks what comes back against the parsed guess.

pub mod matcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use matcher::{match_candidates, score_candidate, ScoredCandidate};

/// Errors from the catalog boundary
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The search request failed; callers log and fall back to an empty list
    #[error("catalog query failed: {0}")]
    Query(String),
}

/// Set metadata attached to a catalog card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSet {
    /// Display name of the set
    pub name: String,
}

/// One catalog entry returned by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    /// Catalog identifier
    pub id: String,
    /// Card name
    pub name: String,
    /// Collector number within the set
    pub local_id: String,
    /// Owning set
    pub set: CardSet,
    /// Rarity label, when the catalog knows it
    #[serde(default)]
    pub rarity: Option<String>,
    /// Card image URL
    #[serde(default)]
    pub image: Option<String>,
}

/// Search response envelope
#[derive(Debug, Deserialize)]
struct SearchResponse {
    cards: Vec<CardSummary>,
}

/// Remote card catalog boundary.
///
/// Implemented over HTTP in production and by an in-memory stub in tests.
#[async_trait]
pub trait CardCatalog: Send + Sync {
    /// Free-text search for candidate cards
    async fn search(
        &self,
        query: &str,
        limit: u32,
        lang: &str,
    ) -> Result<Vec<CardSummary>, CatalogError>;
}

/// HTTP catalog client
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    /// Create a client against the given catalog base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CardCatalog for HttpCatalog {
    async fn search(
        &self,
        query: &str,
        limit: u32,
        lang: &str,
    ) -> Result<Vec<CardSummary>, CatalogError> {
        let url = format!("{}/cards/search", self.base_url.trim_end_matches('/'));
        debug!("Catalog search: {:?} (limit {}, lang {})", query, limit, lang);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("limit", &limit.to_string()),
                ("lang", lang),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Query(e.to_string()))?
            .error_for_status()
            .map_err(|e| CatalogError::Query(e.to_string()))?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Query(e.to_string()))?;

        debug!("Catalog returned {} candidates", body.cards.len());
        Ok(body.cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_summary_wire_format() {
        let json = r#"{
            "id": "base1-4",
            "name": "Dracaufeu",
            "localId": "4",
            "set": { "name": "Set de Base" },
            "rarity": "Rare Holo",
            "image": "https://example.invalid/base1-4.png"
        }"#;

        let card: CardSummary = serde_json::from_str(json).unwrap();
        assert_eq!(card.id, "base1-4");
        assert_eq!(card.local_id, "4");
        assert_eq!(card.set.name, "Set de Base");
        assert_eq!(card.rarity.as_deref(), Some("Rare Holo"));
    }

    #[test]
    fn test_card_summary_optional_fields() {
        let json = r#"{
            "id": "swsh-144",
            "name": "Pikachu",
            "localId": "144",
            "set": { "name": "Promos" }
        }"#;

        let card: CardSummary = serde_json::from_str(json).unwrap();
        assert!(card.rarity.is_none());
        assert!(card.image.is_none());
    }

    #[test]
    fn test_search_response_envelope() {
        let json = r#"{ "cards": [] }"#;
        let body: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(body.cards.is_empty());
    }
}
