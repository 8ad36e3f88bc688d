//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap the JSON payload in prose or code fences, so the first
//! `{` through the last `}` is taken as the payload.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::guardrails::STANDARD_DISCLOSURE;

use super::types::{CopyLimits, GeneratedCopy};

#[derive(Debug, Deserialize)]
struct RawCopy {
    title: String,
    rationale: String,
}

/// Extract the JSON object embedded in a response
fn json_slice(response: &str) -> Result<&str> {
    let response = response.trim();
    match (response.find('{'), response.rfind('}')) {
        (Some(s), Some(e)) if s < e => Ok(&response[s..=e]),
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Parse and validate rewritten recommendation copy
///
/// Rejects empty or over-long titles, over-long rationales, and rationales
/// missing the standard disclosure.
pub fn parse_copy_response(response: &str, limits: &CopyLimits) -> Result<GeneratedCopy> {
    let json_str = json_slice(response)?;
    let raw: RawCopy = serde_json::from_str(json_str).map_err(|e| {
        Error::InvalidData(format!(
            "Invalid copy JSON from AI: {} | Raw: {}",
            e,
            truncate(json_str, 200)
        ))
    })?;

    let title = raw.title.trim().to_string();
    let rationale = raw.rationale.trim().to_string();

    if title.is_empty() {
        return Err(Error::InvalidData("AI copy has an empty title".into()));
    }
    if title.chars().count() > limits.title_max_chars {
        return Err(Error::InvalidData(format!(
            "AI title exceeds {} characters",
            limits.title_max_chars
        )));
    }
    if rationale.chars().count() > limits.rationale_max_chars {
        return Err(Error::InvalidData(format!(
            "AI rationale exceeds {} characters",
            limits.rationale_max_chars
        )));
    }
    if !rationale.contains(STANDARD_DISCLOSURE) {
        return Err(Error::InvalidData(
            "AI rationale is missing the standard disclosure".into(),
        ));
    }

    Ok(GeneratedCopy {
        title,
        rationale,
        ai_generated: true,
    })
}

/// Parse a free-text persona explanation
pub fn parse_explanation(response: &str) -> Result<String> {
    let text = response.trim().trim_matches('"').trim();
    if text.is_empty() {
        return Err(Error::InvalidData("Empty persona explanation".into()));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> String {
        serde_json::json!({
            "title": "Bring card balances below 30%",
            "rationale": format!("Your card sits at 68% of its limit. {}", STANDARD_DISCLOSURE),
        })
        .to_string()
    }

    #[test]
    fn test_parse_valid_copy_with_surrounding_text() {
        let response = format!("Sure! Here it is:\n```json\n{}\n```", valid_json());
        let copy = parse_copy_response(&response, &CopyLimits::default()).unwrap();
        assert_eq!(copy.title, "Bring card balances below 30%");
        assert!(copy.ai_generated);
    }

    #[test]
    fn test_rejects_missing_disclosure() {
        let response = r#"{"title": "Short", "rationale": "No disclosure here."}"#;
        assert!(parse_copy_response(response, &CopyLimits::default()).is_err());
    }

    #[test]
    fn test_rejects_over_budget() {
        let long_title = "x".repeat(61);
        let response = serde_json::json!({
            "title": long_title,
            "rationale": STANDARD_DISCLOSURE,
        })
        .to_string();
        assert!(parse_copy_response(&response, &CopyLimits::default()).is_err());

        let tight = CopyLimits {
            title_max_chars: 60,
            rationale_max_chars: 50,
        };
        assert!(parse_copy_response(&valid_json(), &tight).is_err());
    }

    #[test]
    fn test_rejects_non_json_and_empty_title() {
        assert!(parse_copy_response("I cannot help with that.", &CopyLimits::default()).is_err());
        let empty = serde_json::json!({"title": "  ", "rationale": STANDARD_DISCLOSURE}).to_string();
        assert!(parse_copy_response(&empty, &CopyLimits::default()).is_err());
    }

    #[test]
    fn test_parse_explanation() {
        assert_eq!(parse_explanation("  \"Hello there\" \n").unwrap(), "Hello there");
        assert!(parse_explanation("   ").is_err());
    }
}
