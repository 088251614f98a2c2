//! Cell value parsing.

/// Parse a score cell.
///
/// Surrounding whitespace is trimmed and a comma decimal separator is
/// accepted, as are single underscores between digits (`1_000`). Blank or
/// non-numeric text yields `None`; it is treated as missing data, never as
/// an error.
pub fn parse_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut normalized = trimmed.replace(',', ".");
    if normalized.contains('_') {
        normalized = strip_digit_separators(&normalized)?;
    }
    normalized.parse::<f64>().ok()
}

/// Drop underscores that sit between two digits; any other underscore
/// makes the text non-numeric.
fn strip_digit_separators(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut digits = String::with_capacity(text.len());

    for (i, c) in text.char_indices() {
        if c != '_' {
            digits.push(c);
            continue;
        }
        let before = i.checked_sub(1).map(|j| bytes[j]);
        let after = bytes.get(i + 1).copied();
        match (before, after) {
            (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit() => {}
            _ => return None,
        }
    }

    Some(digits)
}
