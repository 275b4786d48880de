//! Card text parsing
//!
//! Pure string heuristics that turn raw OCR output into a structured card
//! guess. Everything here operates on plain strings so the strategies can be
//! tested without a camera or an OCR engine.
//!
//! The name heuristic relies on card layout: the card's own name is reliably
//! the longest contiguous alphabetic token in the top band once short noise
//! words (stage labels, HP abbreviations) are filtered out. The number
//! heuristic walks an ordered list of patterns from strict `N/N` down to
//! "any digit run at all".

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Collector number as printed: 1-3 digits, a slash, 1-3 digits
static SLASH_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\s*/\s*(\d{1,3})\b").expect("valid regex"));

/// Same shape with a pipe where OCR misread the slash
static PIPE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\s*\|\s*(\d{1,3})\b").expect("valid regex"));

/// Any run of digits
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Words that show up in the name band but are never the card name.
/// Compared lowercase, so accented forms are listed as typed on the cards.
const NOISE_WORDS: &[&str] = &[
    "niveau",
    "level",
    "evolution",
    "évolution",
    "evolve",
    "stage",
    "basic",
    "base",
    "hp",
    "pv",
    "attack",
    "attaque",
    "ability",
    "talent",
    "capacité",
    "pokemon",
    "pokémon",
];

/// Structured identity guess parsed from recognized text.
///
/// When present, `card_number` and `set_total` are non-empty digit strings
/// and `name` has at least 2 characters. A promo number with no printed
/// total carries the number in both fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCardGuess {
    /// Card name
    pub name: String,
    /// Collector number within the set
    pub card_number: String,
    /// Total cards in the set
    pub set_total: String,
}

/// Outcome of one recognition attempt
#[derive(Debug, Clone)]
pub struct RecognitionResult {
    /// Parsed guess, absent when parsing failed
    pub guess: Option<ParsedCardGuess>,
    /// Raw text the guess was parsed from
    pub raw_text: String,
    /// Heuristic completeness score, 0-100
    pub confidence: u8,
}

impl RecognitionResult {
    /// Build a result, deriving the confidence from the guess
    pub fn new(guess: Option<ParsedCardGuess>, raw_text: String) -> Self {
        let confidence = confidence(guess.as_ref());
        Self {
            guess,
            raw_text,
            confidence,
        }
    }
}

/// Extract a name guess from the raw text of the name band.
///
/// Strips everything outside letters and spaces, drops tokens shorter than
/// 3 characters or on the noise-word list, and returns the longest remaining
/// token (first wins on ties). Empty string means nothing usable.
pub fn filter_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphabetic() || c == ' ' { c } else { ' ' })
        .collect();

    let mut best = "";
    let mut best_len = 0usize;
    for token in cleaned.split_whitespace() {
        let len = token.chars().count();
        if len < 3 {
            continue;
        }
        let lower = token.to_lowercase();
        if NOISE_WORDS.iter().any(|w| *w == lower) {
            continue;
        }
        if len > best_len {
            best = token;
            best_len = len;
        }
    }

    best.to_string()
}

/// Extract a collector-number guess from the raw text of the number band.
///
/// Strategies in order: strict `N/N`; the same with a pipe; a single
/// isolated 1-3 digit token (promo cards with no total suffix); the last
/// two digit runs paired as `num/total`; the first digit run alone.
/// Returns `None` only when the text contains no digit run at all.
pub fn filter_number(raw: &str) -> Option<String> {
    if let Some(caps) = SLASH_NUMBER.captures(raw) {
        return Some(format!("{}/{}", &caps[1], &caps[2]));
    }

    if let Some(caps) = PIPE_NUMBER.captures(raw) {
        return Some(format!("{}/{}", &caps[1], &caps[2]));
    }

    let runs: Vec<&str> = DIGIT_RUN.find_iter(raw).map(|m| m.as_str()).collect();

    if runs.len() == 1 && runs[0].len() <= 3 {
        return Some(runs[0].to_string());
    }

    if runs.len() >= 2 {
        let total = runs[runs.len() - 1];
        let num = runs[runs.len() - 2];
        return Some(format!("{num}/{total}"));
    }

    runs.first().map(|r| r.to_string())
}

/// Build a guess from the two region passes.
///
/// The number string from [`filter_number`] is split on the slash; a promo
/// number with no total mirrors the number into `set_total`.
pub fn guess_from_regions(name_raw: &str, number_raw: &str) -> Option<ParsedCardGuess> {
    let name = filter_name(name_raw);
    if name.chars().count() < 2 {
        debug!("Region parse rejected: no usable name token");
        return None;
    }

    let number = filter_number(number_raw)?;
    let (card_number, set_total) = match number.split_once('/') {
        Some((num, total)) => (num.to_string(), total.to_string()),
        None => (number.clone(), number),
    };

    Some(ParsedCardGuess {
        name,
        card_number,
        set_total,
    })
}

/// Parse a whole-image OCR dump, used when region extraction failed.
///
/// Normalizes whitespace and strips non-alphanumeric noise per line, locates
/// the first `digits/digits` pattern (or pairs the last two standalone digit
/// runs when no slash survived), and takes the last non-empty line before
/// that match as the name.
pub fn parse_full_text(raw: &str) -> Option<ParsedCardGuess> {
    let lines: Vec<String> = raw.lines().map(normalize_line).collect();

    let (line_idx, card_number, set_total) = locate_number(&lines)?;

    let name = lines[..line_idx]
        .iter()
        .rev()
        .map(|line| clean_name_line(line))
        .find(|candidate| candidate.chars().count() >= 2)?;

    Some(ParsedCardGuess {
        name,
        card_number,
        set_total,
    })
}

/// Heuristic completeness score for a guess, 0-100.
///
/// Name tiers: +40 at 3 characters, +20 more at 5. Number: +40 when the
/// collector number is a positive integer not exceeding the set total.
/// A missing guess scores 0. Not a probability; the UI relies on the exact
/// tiers, so they are fixed.
pub fn confidence(guess: Option<&ParsedCardGuess>) -> u8 {
    let Some(guess) = guess else {
        return 0;
    };

    let mut score = 0u8;

    let name_len = guess.name.chars().count();
    if name_len >= 3 {
        score += 40;
        if name_len >= 5 {
            score += 20;
        }
    }

    if let (Ok(number), Ok(total)) = (
        guess.card_number.parse::<u32>(),
        guess.set_total.parse::<u32>(),
    ) {
        if number >= 1 && number <= total {
            score += 40;
        }
    }

    score
}

/// Best-effort name prefill for manual fallback: the first raw word with at
/// least 4 letters, stripped to its letters.
pub fn prefill_name(raw: &str) -> Option<String> {
    raw.split_whitespace()
        .map(|token| token.chars().filter(|c| c.is_alphabetic()).collect::<String>())
        .find(|letters| letters.chars().count() >= 4)
}

/// Collapse whitespace and drop characters that are neither alphanumeric,
/// space nor slash
fn normalize_line(line: &str) -> String {
    let stripped: String = line
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '/' || c == '|' {
                c
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce a candidate name line to letters and single spaces
fn clean_name_line(line: &str) -> String {
    let letters: String = line
        .chars()
        .map(|c| if c.is_alphabetic() || c == ' ' { c } else { ' ' })
        .collect();
    letters.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find the collector number in normalized lines.
/// Returns (line index of the match, number, total).
fn locate_number(lines: &[String]) -> Option<(usize, String, String)> {
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = SLASH_NUMBER.captures(line) {
            return Some((idx, caps[1].to_string(), caps[2].to_string()));
        }
    }

    // No slash survived OCR: greedily pair the last two standalone digit runs
    let mut runs: Vec<(usize, String)> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        for m in DIGIT_RUN.find_iter(line) {
            runs.push((idx, m.as_str().to_string()));
        }
    }

    if runs.len() < 2 {
        return None;
    }

    let (_, total) = runs[runs.len() - 1].clone();
    let (idx, number) = runs[runs.len() - 2].clone();
    Some((idx, number, total))
}
