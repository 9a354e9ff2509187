//! Typed answers and their stored text encoding.
//!
//! Stored forms: scale as a stringified integer (`"7"`), boolean as `"Yes"` /
//! `"No"`, multi-select as a JSON array of strings (`["Happy","Excited"]`),
//! text as-is.

use serde::Serialize;

use crate::models::template::QuestionType;
use crate::services::fallback::{Fallback, FallbackReason};
use crate::services::sanitize::sanitize_html;

pub const SCALE_MIN: u8 = 1;
pub const SCALE_MAX: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Scale(u8),
    Boolean(bool),
    MultiSelect(Vec<String>),
}

impl Answer {
    pub fn to_stored(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Scale(n) => n.to_string(),
            Answer::Boolean(true) => "Yes".into(),
            Answer::Boolean(false) => "No".into(),
            Answer::MultiSelect(values) => {
                serde_json::to_string(values).unwrap_or_else(|_| "[]".into())
            }
        }
    }

    /// Decode a stored answer. Values that no longer parse as their type are
    /// returned as text so history is never lost.
    pub fn from_stored(kind: QuestionType, stored: &str) -> Self {
        match kind {
            QuestionType::Text => Answer::Text(stored.to_string()),
            QuestionType::Scale => parse_scale(stored)
                .map(Answer::Scale)
                .unwrap_or_else(|_| Answer::Text(stored.to_string())),
            QuestionType::Boolean => parse_boolean(stored)
                .map(Answer::Boolean)
                .unwrap_or_else(|_| Answer::Text(stored.to_string())),
            QuestionType::MultiSelect => Answer::MultiSelect(decode_selection(stored).into_value()),
        }
    }

    /// Human-readable form used in exports and AI context.
    pub fn display(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Scale(n) => format!("{}/{}", n, SCALE_MAX),
            Answer::Boolean(true) => "Yes".into(),
            Answer::Boolean(false) => "No".into(),
            Answer::MultiSelect(values) => values.join(", "),
        }
    }
}

pub fn parse_scale(raw: &str) -> Result<u8, String> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("Enter a whole number from {} to {}", SCALE_MIN, SCALE_MAX))?;
    if !(i64::from(SCALE_MIN)..=i64::from(SCALE_MAX)).contains(&value) {
        return Err(format!(
            "Value must be between {} and {}",
            SCALE_MIN, SCALE_MAX
        ));
    }
    Ok(value as u8)
}

pub fn parse_boolean(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        _ => Err("Answer yes or no".into()),
    }
}

/// Decode a multi-select payload.
///
/// The form sends a JSON array of strings. Legacy clients send a
/// comma-separated list instead; anything else decodes to an empty selection.
/// Values are trimmed and de-duplicated, keeping first-seen order.
pub fn decode_selection(raw: &str) -> Fallback<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Fallback::Exact(Vec::new());
    }

    if let Ok(values) = serde_json::from_str::<Vec<String>>(raw) {
        return Fallback::Exact(normalize_selection(values));
    }

    if raw.contains(',') {
        let values = raw
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|v| v.trim().trim_matches('"').trim_matches('\'').to_string())
            .collect();
        let values = normalize_selection(values);
        if !values.is_empty() {
            return Fallback::defaulted(values, FallbackReason::Malformed);
        }
    }

    Fallback::defaulted(Vec::new(), FallbackReason::Malformed)
}

fn normalize_selection(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}

/// Parse one raw form value for a question of type `kind`.
///
/// `Ok(None)` means "no answer given". Multi-select never fails.
pub fn parse_answer(kind: QuestionType, raw: Option<&str>) -> Result<Option<Answer>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match kind {
        QuestionType::MultiSelect => Ok(Some(Answer::MultiSelect(
            decode_selection(raw).into_value(),
        ))),
        _ if raw.trim().is_empty() => Ok(None),
        QuestionType::Scale => parse_scale(raw).map(|n| Some(Answer::Scale(n))),
        QuestionType::Boolean => parse_boolean(raw).map(|b| Some(Answer::Boolean(b))),
        QuestionType::Text => {
            let text = sanitize_html(raw);
            Ok((!text.is_empty()).then_some(Answer::Text(text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scale_bounds() {
        assert_eq!(parse_scale("1"), Ok(1));
        assert_eq!(parse_scale(" 10 "), Ok(10));
        assert!(parse_scale("0").is_err());
        assert!(parse_scale("11").is_err());
        assert!(parse_scale("7.5").is_err());
        assert!(parse_scale("seven").is_err());
    }

    #[test]
    fn test_parse_boolean_variants() {
        for yes in ["yes", "YES", "True", " true "] {
            assert_eq!(parse_boolean(yes), Ok(true));
        }
        for no in ["no", "No", "FALSE"] {
            assert_eq!(parse_boolean(no), Ok(false));
        }
        assert!(parse_boolean("maybe").is_err());
    }

    #[test]
    fn test_decode_selection_json() {
        let decoded = decode_selection(r#"["Happy","Excited"]"#);
        assert!(!decoded.is_defaulted());
        assert_eq!(decoded.into_value(), vec!["Happy", "Excited"]);

        let decoded = decode_selection(r#"[" Calm ","Calm",""]"#);
        assert_eq!(decoded.into_value(), vec!["Calm"]);

        assert_eq!(decode_selection("").into_value(), Vec::<String>::new());
        assert_eq!(decode_selection("[]").into_value(), Vec::<String>::new());
    }

    #[test]
    fn test_decode_selection_comma_fallback() {
        let decoded = decode_selection("Happy, Tired");
        assert_eq!(decoded.reason(), Some(FallbackReason::Malformed));
        assert_eq!(decoded.into_value(), vec!["Happy", "Tired"]);

        let decoded = decode_selection("['Sad', 'Lonely'");
        assert_eq!(decoded.into_value(), vec!["Sad", "Lonely"]);
    }

    #[test]
    fn test_decode_selection_gives_up_with_empty_list() {
        let decoded = decode_selection("not_json");
        assert_eq!(decoded.reason(), Some(FallbackReason::Malformed));
        assert!(decoded.into_value().is_empty());

        assert!(decode_selection(r#"{"a":1}"#).into_value().is_empty());
        assert!(decode_selection(",,,").into_value().is_empty());
    }

    #[test]
    fn test_stored_encoding() {
        assert_eq!(Answer::Scale(7).to_stored(), "7");
        assert_eq!(Answer::Boolean(true).to_stored(), "Yes");
        assert_eq!(Answer::Boolean(false).to_stored(), "No");
        assert_eq!(
            Answer::MultiSelect(vec!["Happy".into(), "Excited".into()]).to_stored(),
            r#"["Happy","Excited"]"#
        );

        assert_eq!(Answer::from_stored(QuestionType::Scale, "7"), Answer::Scale(7));
        assert_eq!(
            Answer::from_stored(QuestionType::Boolean, "No"),
            Answer::Boolean(false)
        );
        assert_eq!(
            Answer::from_stored(QuestionType::Scale, "legacy"),
            Answer::Text("legacy".into())
        );
    }

    #[test]
    fn test_parse_answer_empty_values() {
        assert_eq!(parse_answer(QuestionType::Scale, None), Ok(None));
        assert_eq!(parse_answer(QuestionType::Scale, Some("  ")), Ok(None));
        assert_eq!(parse_answer(QuestionType::Text, Some("<script></script>")), Ok(None));
        assert_eq!(
            parse_answer(QuestionType::MultiSelect, Some("not_json")),
            Ok(Some(Answer::MultiSelect(vec![])))
        );
        assert!(parse_answer(QuestionType::Boolean, Some("perhaps")).is_err());
    }
}
