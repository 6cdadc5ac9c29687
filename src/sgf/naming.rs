//! Filenames for saved game records.
//!
//! Names look like `[2024-03-01][black]vs[white]<chessid>.sgf`. The record
//! id suffix keeps names unique even when every metadata field is missing.

use crate::types::RecordId;

const UNKNOWN_DATE: &str = "Unknown_Date";
const UNKNOWN_BLACK: &str = "Unknown_Black";
const UNKNOWN_WHITE: &str = "Unknown_White";
const ERROR_STEM: &str = "error_game";

/// Derive the on-disk filename for a normalized SGF record.
///
/// Missing `DT`/`PB`/`PW` properties fall back to placeholders; content
/// that is not an SGF game tree at all gets the `error_game` stem.
pub fn derive_filename(content: &str, id: &RecordId) -> String {
    let name = match RootProperties::parse(content) {
        Ok(root) => format!(
            "[{}][{}]vs[{}]{}.sgf",
            root.get("DT").unwrap_or(UNKNOWN_DATE),
            root.get("PB").unwrap_or(UNKNOWN_BLACK),
            root.get("PW").unwrap_or(UNKNOWN_WHITE),
            id
        ),
        Err(reason) => {
            tracing::warn!(id = %id, reason, "Cannot read SGF root properties");
            format!("{}{}.sgf", ERROR_STEM, id)
        }
    };
    clean_filename(&name)
}

/// Remove characters that are invalid on common filesystems:
/// `/`, `\`, `:`, `*`, `?`, `"`, `<`, `>`, `|` and control characters.
pub fn clean_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect()
}

/// Properties of the first node of the first game tree.
///
/// Only the first value of each property is kept, decoded as SGF
/// SimpleText (escapes resolved, whitespace folded to spaces, trimmed).
#[derive(Debug, Default)]
pub struct RootProperties {
    props: Vec<(String, String)>,
}

impl RootProperties {
    pub fn get(&self, ident: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|(k, _)| k == ident)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn parse(content: &str) -> Result<Self, &'static str> {
        let mut chars = content.trim_start_matches('\u{feff}').chars().peekable();

        skip_whitespace(&mut chars);
        if chars.next() != Some('(') {
            return Err("missing '(' opening the game tree");
        }
        skip_whitespace(&mut chars);
        if chars.next() != Some(';') {
            return Err("missing ';' opening the root node");
        }

        let mut root = RootProperties::default();
        loop {
            skip_whitespace(&mut chars);
            match chars.peek() {
                Some(';' | '(' | ')') => return Ok(root),
                Some(c) if c.is_ascii_alphabetic() => {}
                Some(_) => return Err("unexpected character in root node"),
                None => return Err("unterminated game tree"),
            }

            let mut ident = String::new();
            while let Some(&c) = chars.peek() {
                if !c.is_ascii_alphabetic() {
                    break;
                }
                // FF[3] allowed lowercase letters inside identifiers; they carry no meaning.
                if c.is_ascii_uppercase() {
                    ident.push(c);
                }
                chars.next();
            }

            skip_whitespace(&mut chars);
            if chars.peek() != Some(&'[') {
                return Err("property without value");
            }

            let mut first = None;
            while chars.peek() == Some(&'[') {
                chars.next();
                let value = read_value(&mut chars)?;
                first.get_or_insert(value);
                skip_whitespace(&mut chars);
            }

            if let Some(value) = first {
                if !root.props.iter().any(|(k, _)| *k == ident) {
                    root.props.push((ident, value));
                }
            }
        }
    }
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Read one property value after its opening `[`, consuming the closing `]`.
fn read_value(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, &'static str> {
    let mut value = String::new();
    loop {
        match chars.next() {
            Some(']') => break,
            Some('\\') => match chars.next() {
                // escaped line break is a soft break and vanishes
                Some('\n') | Some('\r') => {
                    if chars.peek().is_some_and(|c| matches!(c, '\n' | '\r')) {
                        chars.next();
                    }
                }
                Some(c) => value.push(c),
                None => return Err("unterminated property value"),
            },
            Some(c) if c.is_whitespace() => value.push(' '),
            Some(c) => value.push(c),
            None => return Err("unterminated property value"),
        }
    }
    Ok(value.trim().to_string())
}
