//! Expected-site byte patterns: hex bytes with `??` for "any byte"

use crate::error::{Error, Result};

/// Byte pattern where `None` matches any byte
pub type Pattern = Vec<Option<u8>>;

/// Parse a profile's `expected_site`, e.g. `"74 ?? 48 8b"`
pub fn parse_pattern(text: &str) -> Result<Pattern> {
    let pattern = text
        .split_whitespace()
        .map(|token| match token {
            "?" | "??" => Ok(None),
            hex if hex.len() <= 2 => u8::from_str_radix(hex, 16).map(Some).map_err(|_| {
                Error::Profile(format!("expected_site: {:?} is not a hex byte", hex))
            }),
            other => Err(Error::Profile(format!(
                "expected_site: {:?} is not a hex byte; separate bytes with spaces",
                other
            ))),
        })
        .collect::<Result<Pattern>>()?;

    if pattern.is_empty() {
        return Err(Error::Profile("expected_site has no bytes".to_string()));
    }
    Ok(pattern)
}

/// Inverse of [`parse_pattern`], for diagnostics
pub fn format_pattern(pattern: &[Option<u8>]) -> String {
    let tokens: Vec<String> = pattern
        .iter()
        .map(|byte| byte.map_or_else(|| "??".to_string(), |b| format!("{:02X}", b)))
        .collect();
    tokens.join(" ")
}

/// Whether `data` starts with `pattern`
pub fn matches_at(data: &[u8], pattern: &[Option<u8>]) -> bool {
    data.len() >= pattern.len()
        && pattern
            .iter()
            .zip(data)
            .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
}

pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
