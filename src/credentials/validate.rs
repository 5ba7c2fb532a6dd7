//! # Structural token validation.
//!
//! A usable token has three non-empty `.`-separated segments; the first one is
//! base64 (URL-safe or standard alphabet, padding optional) and decodes to the
//! numeric account identifier.
//!
//! ```text
//! MTIzNDU2Nzg5MDEyMzQ1Njc4.Gh1a2b.c3d4e5f6...
//! └──── base64("123456789012345678") ────┘
//! ```

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

/// Tokens shorter than this are rejected outright.
pub const MIN_TOKEN_LEN: usize = 50;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Why a configured token was not accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token is missing")]
    Missing,
    #[error("token is a placeholder")]
    Placeholder,
    #[error("token is too short ({len} < {MIN_TOKEN_LEN})")]
    TooShort { len: usize },
    #[error("token does not have three segments")]
    Malformed,
    #[error("first token segment does not decode to a numeric id")]
    BadIdentifier,
    #[error("duplicate of entry #{first}")]
    Duplicate { first: usize },
}

/// Checks `token` and returns the account identifier encoded in it.
pub fn validate_token(token: &str) -> Result<String, TokenRejection> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenRejection::Missing);
    }
    if is_placeholder(token) {
        return Err(TokenRejection::Placeholder);
    }
    if token.len() < MIN_TOKEN_LEN {
        return Err(TokenRejection::TooShort { len: token.len() });
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(TokenRejection::Malformed);
    }

    decode_identifier(segments[0]).ok_or(TokenRejection::BadIdentifier)
}

fn is_placeholder(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower == "your_token_here" || lower.contains("token_here") || lower.contains("your")
}

fn decode_identifier(segment: &str) -> Option<String> {
    let bytes = URL_SAFE_LENIENT
        .decode(segment)
        .or_else(|_| STANDARD_LENIENT.decode(segment))
        .ok()?;
    let id = String::from_utf8(bytes).ok()?;
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Some(id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(id: &str) -> String {
        let head = URL_SAFE_LENIENT.encode(id);
        format!("{head}.GhAbCd.{}", "x".repeat(40))
    }

    #[test]
    fn accepts_well_formed_token() {
        let token = token_for("123456789012345678");
        assert_eq!(validate_token(&token), Ok("123456789012345678".to_string()));
    }

    #[test]
    fn accepts_padded_first_segment() {
        let head = STANDARD_LENIENT.encode("12345");
        assert!(head.ends_with('='));
        let token = format!("{head}.GhAbCd.{}", "y".repeat(50));
        assert_eq!(validate_token(&token), Ok("12345".to_string()));
    }

    #[test]
    fn rejects_placeholders_and_short_tokens() {
        assert_eq!(validate_token(""), Err(TokenRejection::Missing));
        assert_eq!(validate_token("YOUR_TOKEN_HERE"), Err(TokenRejection::Placeholder));
        assert_eq!(
            validate_token("abc.def.ghi"),
            Err(TokenRejection::TooShort { len: 11 })
        );
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let token = format!("{}.{}", "a".repeat(30), "b".repeat(30));
        assert_eq!(validate_token(&token), Err(TokenRejection::Malformed));
    }

    #[test]
    fn rejects_non_numeric_identifier() {
        let token = token_for("not-a-number");
        assert_eq!(validate_token(&token), Err(TokenRejection::BadIdentifier));
    }
}
