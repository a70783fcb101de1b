//! Response Parsing
//!
//! Turns raw backend reply text into a score. Parsing never fails: a reply
//! that yields nothing usable becomes [`ParsedScore::Fallback`] and the engine
//! substitutes a low-confidence result.
//!
//! [`HeuristicParser`] tries, in order:
//!
//! ```text
//! 1. JSON object (bare, fenced in ``` blocks, or embedded in prose)
//! 2. "score: 82" / "82/100" / "8.2/10" style text
//! 3. Fallback
//! ```

use serde_json::Value;

/// Confidence assumed when a structured reply omits it
pub const DEFAULT_STRUCTURED_CONFIDENCE: f64 = 70.0;

/// Confidence assigned to scores recovered from free text
pub const DEFAULT_HEURISTIC_CONFIDENCE: f64 = 55.0;

/// Result of parsing a backend reply
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedScore {
    /// The reply contained a well-formed JSON object
    Structured {
        score: f64,
        confidence: f64,
        reasoning: String,
    },
    /// A score was recovered from free text
    Heuristic {
        score: f64,
        confidence: f64,
        reasoning: String,
    },
    /// Nothing usable was found
    Fallback { reason: String },
}

impl ParsedScore {
    /// Score, if the reply produced one
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Structured { score, .. } | Self::Heuristic { score, .. } => Some(*score),
            Self::Fallback { .. } => None,
        }
    }

    /// Whether parsing fell back
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Pluggable reply parser
pub trait ResponseParser: Send + Sync {
    /// Parse a reply; must not fail
    fn parse(&self, text: &str) -> ParsedScore;
}

/// Default parser: JSON first, then keyword scanning
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicParser;

impl HeuristicParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parse_json(text: &str) -> Option<ParsedScore> {
        let value = json_candidates(text)
            .into_iter()
            .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())?;
        let object = value.as_object()?;

        let score = object.get("score").and_then(as_number)?;
        let confidence = object
            .get("confidence")
            .and_then(as_number)
            .unwrap_or(DEFAULT_STRUCTURED_CONFIDENCE);
        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(ParsedScore::Structured {
            score: clamp_score(score),
            confidence: clamp_score(confidence),
            reasoning,
        })
    }

    fn parse_text(text: &str) -> Option<ParsedScore> {
        let lower = text.to_lowercase();

        let score = number_after(&lower, "score").or_else(|| scaled_fraction(&lower))?;
        let confidence =
            number_after(&lower, "confidence").unwrap_or(DEFAULT_HEURISTIC_CONFIDENCE);

        Some(ParsedScore::Heuristic {
            score: clamp_score(score),
            confidence: clamp_score(confidence),
            reasoning: text.trim().chars().take(280).collect(),
        })
    }
}

impl ResponseParser for HeuristicParser {
    fn parse(&self, text: &str) -> ParsedScore {
        if text.trim().is_empty() {
            return ParsedScore::Fallback {
                reason: "empty reply".to_string(),
            };
        }

        Self::parse_json(text)
            .or_else(|| Self::parse_text(text))
            .unwrap_or_else(|| ParsedScore::Fallback {
                reason: "no score found in reply".to_string(),
            })
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Substrings that might hold a JSON object, most specific first
fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text.trim()];

    if let Some(start) = text.find("```") {
        let body = &text[start + 3..];
        let body = body.strip_prefix("json").unwrap_or(body);
        if let Some(end) = body.find("```") {
            candidates.push(body[..end].trim());
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }

    candidates
}

/// First number following a keyword, within a short window
fn number_after(text: &str, keyword: &str) -> Option<f64> {
    let start = text.find(keyword)? + keyword.len();
    let window: String = text[start..].chars().take(24).collect();
    let (value, rest) = leading_number(window.trim_start_matches(|c: char| !c.is_ascii_digit()))?;
    Some(apply_scale(value, rest))
}

/// First "N/100" or "N/10" in the text, scaled to 0-100
fn scaled_fraction(text: &str) -> Option<f64> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(|c: char| c.is_ascii_digit()) {
        let slice = &text[offset + pos..];
        let (value, rest) = leading_number(slice)?;
        if rest.starts_with("/100") || rest.starts_with("/10") || rest.starts_with(" / 10") {
            return Some(apply_scale(value, rest));
        }
        offset += pos + (slice.len() - rest.len()).max(1);
    }
    None
}

fn apply_scale(value: f64, rest: &str) -> f64 {
    let Some(denominator) = rest.trim_start().strip_prefix('/') else {
        return value;
    };
    let denominator = denominator.trim_start();
    if denominator.starts_with("10") && !denominator.starts_with("100") {
        value * 10.0
    } else {
        value
    }
}

/// Parse a leading decimal number, returning it and the remaining text
fn leading_number(text: &str) -> Option<(f64, &str)> {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (c == '.' && i > 0)))
        .map_or(text.len(), |(i, _)| i);
    let digits = text[..end].trim_end_matches('.');
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok().map(|n| (n, &text[digits.len()..]))
}
