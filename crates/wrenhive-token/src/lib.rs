//! Workflow-token grammar for interactive controls.
//!
//! A token is the only state carried between two invocations of a
//! multi-screen workflow: `prefix_field1_field2[::context]`. The group
//! separator `::` splits the primary payload from an optional contextual
//! reference (a durable entity id); the field separator `_` splits the
//! primary payload into positional fields. Decoding is tolerant (a stale
//! or truncated token reads missing fields as the empty string) while
//! encoding rejects field values that would collide with a separator.

use thiserror::Error;

/// Splits the primary payload into positional fields.
pub const FIELD_SEPARATOR: char = '_';

/// Splits a token into primary payload and contextual reference.
pub const GROUP_SEPARATOR: &str = "::";

/// Hard ceiling on the encoded token, set by the host control's payload limit.
pub const MAX_TOKEN_BYTES: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("field `{0}` contains a reserved separator")]
    SeparatorInField(String),
    #[error("context `{0}` contains the group separator")]
    SeparatorInContext(String),
    #[error("encoded token is {0} bytes, over the {MAX_TOKEN_BYTES}-byte limit")]
    TooLong(usize),
}

/// A decoded (or under-construction) workflow token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    fields: Vec<String>,
    context: Option<String>,
}

impl Token {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            fields: vec![prefix.into()],
            context: None,
        }
    }

    pub fn field(mut self, value: impl Into<String>) -> Self {
        self.fields.push(value.into());
        self
    }

    pub fn with_context(mut self, context: Option<&str>) -> Self {
        self.context = context.filter(|c| !c.is_empty()).map(str::to_string);
        self
    }

    /// First field of the primary payload, or `""` for an empty token.
    pub fn prefix(&self) -> &str {
        self.field_at(0)
    }

    /// Positional field access. Missing trailing fields read as `""` so a
    /// control can be reconstructed from a stale token without failing.
    pub fn field_at(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn encode(&self) -> Result<String, TokenError> {
        for field in &self.fields {
            if field.contains(FIELD_SEPARATOR) || field.contains(GROUP_SEPARATOR) {
                return Err(TokenError::SeparatorInField(field.clone()));
            }
        }
        if let Some(context) = &self.context {
            if context.contains(GROUP_SEPARATOR) {
                return Err(TokenError::SeparatorInContext(context.clone()));
            }
        }

        let mut encoded = self.fields.join("_");
        if let Some(context) = &self.context {
            encoded.push_str(GROUP_SEPARATOR);
            encoded.push_str(context);
        }
        if encoded.len() > MAX_TOKEN_BYTES {
            return Err(TokenError::TooLong(encoded.len()));
        }
        Ok(encoded)
    }

    /// Decoding never fails: any string splits into some sequence of fields.
    pub fn decode(raw: &str) -> Self {
        let (primary, context) = split_context(raw);
        Self {
            fields: primary.split(FIELD_SEPARATOR).map(str::to_string).collect(),
            context: context.filter(|c| !c.is_empty()).map(str::to_string),
        }
    }
}

/// Split a raw token into (primary payload, contextual reference).
///
/// Free-form prefixes (`parent_id`, `quick_scheduler`, ...) share only this
/// convention; their primary payload is matched whole, never field-split.
pub fn split_context(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(GROUP_SEPARATOR) {
        Some((primary, context)) => (primary, Some(context)),
        None => (raw, None),
    }
}

/// Join a free-form primary payload with an optional contextual reference.
///
/// The free-form prefixes carry the field separator inside their own name,
/// so they bypass `Token::encode` and only share the group convention.
pub fn join_context(primary: &str, context: Option<&str>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(context) => format!("{primary}{GROUP_SEPARATOR}{context}"),
        None => primary.to_string(),
    }
}

/// Strip `prefix` plus the field separator from a primary payload.
///
/// `strip_payload("parent_id_7", "parent_id")` yields `Some("7")`;
/// an exact prefix match with no remainder yields `Some("")`.
pub fn strip_payload<'a>(primary: &'a str, prefix: &str) -> Option<&'a str> {
    if primary == prefix {
        return Some("");
    }
    primary
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(FIELD_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_joins_fields() {
        let token = Token::new("n").field("2025-03").field("++");
        assert_eq!(token.encode().unwrap(), "n_2025-03_++");
    }

    #[test]
    fn encode_appends_context() {
        let token = Token::new("t")
            .field("10:00")
            .field("2025-03-15")
            .with_context(Some("parent7"));
        assert_eq!(token.encode().unwrap(), "t_10:00_2025-03-15::parent7");
    }

    #[test]
    fn round_trip_preserves_fields_and_context() {
        let cases = vec![
            Token::new("n").field("2025-12").field("--"),
            Token::new("n").field("2025-03-15").field("0"),
            Token::new("pt").field("morning").field("2025-03-15"),
            Token::new("t").field("2025-03-15").field("back"),
            Token::new("t")
                .field("21:00")
                .field("2025-03-15")
                .with_context(Some("c0a1b2")),
        ];
        for token in cases {
            let encoded = token.encode().unwrap();
            assert_eq!(Token::decode(&encoded), token, "round trip of {encoded}");
        }
    }

    #[test]
    fn decode_is_tolerant_of_missing_fields() {
        let token = Token::decode("n");
        assert_eq!(token.prefix(), "n");
        assert_eq!(token.field_at(1), "");
        assert_eq!(token.field_at(7), "");
        assert_eq!(token.context(), None);
    }

    #[test]
    fn decode_empty_string() {
        let token = Token::decode("");
        assert_eq!(token.prefix(), "");
        assert_eq!(token.context(), None);
    }

    #[test]
    fn decode_keeps_single_colons_in_fields() {
        let token = Token::decode("t_10:00_2025-03-15");
        assert_eq!(token.prefix(), "t");
        assert_eq!(token.field_at(1), "10:00");
        assert_eq!(token.field_at(2), "2025-03-15");
        assert_eq!(token.context(), None);
    }

    #[test]
    fn decode_context_may_contain_field_separator() {
        let token = Token::decode("n_2025-03_++::lead_42");
        assert_eq!(token.field_at(2), "++");
        assert_eq!(token.context(), Some("lead_42"));
    }

    #[test]
    fn decode_trailing_group_separator_means_no_context() {
        let token = Token::decode("n_2025-03_++::");
        assert_eq!(token.context(), None);
    }

    #[test]
    fn encode_rejects_separator_in_field() {
        let err = Token::new("n").field("2025_03").encode().unwrap_err();
        assert_eq!(err, TokenError::SeparatorInField("2025_03".into()));

        let err = Token::new("n").field("a::b").encode().unwrap_err();
        assert_eq!(err, TokenError::SeparatorInField("a::b".into()));
    }

    #[test]
    fn encode_rejects_group_separator_in_context() {
        let err = Token::new("n")
            .field("2025-03")
            .with_context(Some("a::b"))
            .encode()
            .unwrap_err();
        assert_eq!(err, TokenError::SeparatorInContext("a::b".into()));
    }

    #[test]
    fn encode_enforces_payload_ceiling() {
        let long = "x".repeat(MAX_TOKEN_BYTES);
        let err = Token::new("n").field(&long).encode().unwrap_err();
        assert!(matches!(err, TokenError::TooLong(_)));
    }

    #[test]
    fn uuid_context_fits_the_ceiling() {
        let token = Token::new("t")
            .field("10:00")
            .field("2025-03-15")
            .with_context(Some("550e8400-e29b-41d4-a716-446655440000"));
        let encoded = token.encode().unwrap();
        assert!(encoded.len() <= MAX_TOKEN_BYTES);
    }

    #[test]
    fn split_context_on_first_group_separator() {
        assert_eq!(split_context("pick_date_time::p1"), ("pick_date_time", Some("p1")));
        assert_eq!(split_context("quick_scheduler"), ("quick_scheduler", None));
    }

    #[test]
    fn join_context_round_trips_through_split() {
        let raw = join_context("pick_date_time", Some("p1"));
        assert_eq!(raw, "pick_date_time::p1");
        assert_eq!(split_context(&raw), ("pick_date_time", Some("p1")));

        assert_eq!(join_context("quick_scheduler", None), "quick_scheduler");
        assert_eq!(join_context("quick_scheduler", Some("")), "quick_scheduler");
    }

    #[test]
    fn strip_payload_matches_free_form_prefixes() {
        assert_eq!(strip_payload("parent_id_7", "parent_id"), Some("7"));
        assert_eq!(strip_payload("parent_id", "parent_id"), Some(""));
        assert_eq!(strip_payload("parent_idx", "parent_id"), None);
        assert_eq!(strip_payload("requested_abc", "requested"), Some("abc"));
    }
}
