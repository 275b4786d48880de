//! Candidate ranking
//!
//! Scores catalog candidates against a parsed guess with additive bonuses
//! and keeps the strongest few. Restartable: every match pass recomputes
//! scores from scratch for a fresh guess.

use tracing::debug;

use super::{CardCatalog, CardSummary, CatalogError};
use crate::parser::ParsedCardGuess;

/// Candidates scoring at or below this are dropped
const SCORE_CUTOFF: i32 = 40;

/// Ranked list length cap
const MAX_CANDIDATES: usize = 5;

/// A catalog entry with its score against the current guess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    /// The catalog card
    pub card: CardSummary,
    /// Additive match score
    pub match_score: i32,
}

/// Score one candidate against the guess.
///
/// Number and name bonuses are independent and additive; within the name
/// bonuses only the highest applicable one counts:
/// - collector number exact or slash-prefix match: +50
/// - name equal (case-insensitive): +50
/// - candidate name contains the guessed name: +30
/// - guessed name contains the candidate name: +20
pub fn score_candidate(guess: &ParsedCardGuess, card: &CardSummary) -> i32 {
    let mut score = 0;

    let number_matches = card.local_id == guess.card_number
        || card
            .local_id
            .starts_with(&format!("{}/", guess.card_number));
    if number_matches {
        score += 50;
    }

    let guess_name = guess.name.to_lowercase();
    let card_name = card.name.to_lowercase();
    if card_name == guess_name {
        score += 50;
    } else if card_name.contains(&guess_name) {
        score += 30;
    } else if guess_name.contains(&card_name) {
        score += 20;
    }

    score
}

/// Query the catalog for the guess and return ranked candidates.
///
/// Issues one free-text query combining name and number, scores every
/// returned card, drops weak matches and keeps the top five. Ties keep the
/// catalog's arrival order (stable sort; the catalog defines no secondary
/// key).
pub async fn match_candidates(
    catalog: &dyn CardCatalog,
    guess: &ParsedCardGuess,
    limit: u32,
    lang: &str,
) -> Result<Vec<ScoredCandidate>, CatalogError> {
    let query = format!("{} {}", guess.name, guess.card_number);
    let cards = catalog.search(&query, limit, lang).await?;

    let mut scored: Vec<ScoredCandidate> = cards
        .into_iter()
        .map(|card| {
            let match_score = score_candidate(guess, &card);
            ScoredCandidate { card, match_score }
        })
        .filter(|candidate| candidate.match_score > SCORE_CUTOFF)
        .collect();

    scored.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    scored.truncate(MAX_CANDIDATES);

    debug!(
        "Match pass for {:?} kept {} candidates",
        query,
        scored.len()
    );
    Ok(scored)
}

#[cfg(test)]
pub mod stub {
    //! In-memory catalog for tests

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::super::{CardCatalog, CardSet, CardSummary, CatalogError};

    /// Returns a fixed card list and records the queries it saw
    pub struct StubCatalog {
        pub cards: Vec<CardSummary>,
        pub queries: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl StubCatalog {
        pub fn with_cards(cards: Vec<CardSummary>) -> Self {
            Self {
                cards,
                queries: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                cards: Vec::new(),
                queries: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl CardCatalog for StubCatalog {
        async fn search(
            &self,
            query: &str,
            _limit: u32,
            _lang: &str,
        ) -> Result<Vec<CardSummary>, CatalogError> {
            self.queries.lock().push(query.to_string());
            if self.fail {
                return Err(CatalogError::Query("stubbed outage".into()));
            }
            Ok(self.cards.clone())
        }
    }

    /// Shorthand card constructor for tests
    pub fn card(id: &str, name: &str, local_id: &str) -> CardSummary {
        CardSummary {
            id: id.to_string(),
            name: name.to_string(),
            local_id: local_id.to_string(),
            set: CardSet {
                name: "Test Set".to_string(),
            },
            rarity: None,
            image: None,
        }
    }
}
