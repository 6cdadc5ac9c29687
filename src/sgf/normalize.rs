//! Repairs for defects in SGF text served by FoxWQ.
//!
//! The `chess` payload arrives with line breaks double-escaped (the literal
//! four characters `\r\n`) and with 7.5 komi written as `KM[375]`.

const ESCAPED_CRLF: &str = "\\r\\n";
const BROKEN_KOMI: &str = "KM[375]";
const FIXED_KOMI: &str = "KM[7.5]";

/// Apply both corrections. Idempotent; content without either pattern is
/// returned unchanged.
pub fn normalize(raw: &str) -> String {
    raw.replace(ESCAPED_CRLF, "\n").replace(BROKEN_KOMI, FIXED_KOMI)
}

/// Whether [`normalize`] would change `raw`.
pub fn needs_normalization(raw: &str) -> bool {
    raw.contains(ESCAPED_CRLF) || raw.contains(BROKEN_KOMI)
}
