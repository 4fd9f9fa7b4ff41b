//! Format directive parser
//!
//! A format directive is a compact, comma-separated list of per-column type
//! hints, one token per spreadsheet column from left to right:
//!
//! ```text
//! i,s20,u30,s,u
//! ```
//!
//! - `i` - integer column
//! - `s<n>` - varchar column, optionally `n` characters wide
//! - `u<n>` - nvarchar column, optionally `n` characters wide
//!
//! Tokens are case-insensitive. Any malformed token aborts the whole parse.

use crate::error::{BcpError, BcpResult};
use crate::types::{ColumnTypeHint, HintKind};

/// Parse a format directive into one hint per token.
///
/// `None`, `""` and whitespace-only input all yield an empty list.
pub fn parse_format(input: Option<&str>) -> BcpResult<Vec<ColumnTypeHint>> {
    let input = match input {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Ok(Vec::new()),
    };

    input.split(',').map(parse_token).collect()
}

fn parse_token(raw: &str) -> BcpResult<ColumnTypeHint> {
    let token = raw.trim().to_lowercase();

    let mut chars = token.chars();
    let kind = match chars.next() {
        Some('i') => HintKind::Int,
        Some('s') => HintKind::String,
        Some('u') => HintKind::UnicodeString,
        Some(c) => return Err(syntax_error(raw, format!("invalid type '{}'", c))),
        None => return Err(syntax_error(raw, "empty token".to_string())),
    };

    let digits = chars.as_str();
    if digits.is_empty() {
        return Ok(ColumnTypeHint::new(kind, None));
    }

    let size: u32 = digits
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| digits.parse().ok())
        .flatten()
        .ok_or_else(|| syntax_error(raw, format!("invalid size '{}'", digits)))?;
    if size == 0 {
        return Err(syntax_error(raw, "size must be positive".to_string()));
    }

    Ok(ColumnTypeHint::new(kind, Some(size)))
}

fn syntax_error(token: &str, reason: String) -> BcpError {
    BcpError::FormatSyntax {
        token: token.to_string(),
        reason,
    }
}
