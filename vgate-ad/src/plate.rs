//! Plate normalization and similarity
//!
//! Every comparison in the engine goes through [`normalize`] first, so
//! "ABC-123", "abc 123" and "ABC123" are the same plate.

/// Characters removed during normalization (besides whitespace)
const SEPARATORS: &[char] = &['-', '.'];

/// Canonicalize a raw plate string
///
/// Upper-cases and removes whitespace, hyphens and periods. Total: empty
/// input yields an empty string.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Positional similarity of two normalized plates, in percent
///
/// Plates of different length score 0; no alignment is attempted. Otherwise
/// the score is the share of positions holding the same character. Empty
/// plates never match anything.
pub fn similarity(a: &str, b: &str) -> f64 {
    let len = a.chars().count();
    if len == 0 {
        return 0.0;
    }
    match strsim::hamming(a, b) {
        Ok(distance) => (len - distance) as f64 * 100.0 / len as f64,
        Err(_) => 0.0,
    }
}

/// True when two normalized plates are identical under [`similarity`]
pub fn is_exact_match(a: &str, b: &str) -> bool {
    similarity(a, b) >= 100.0
}
