//! Response shapes of the FoxWQ chessbook endpoints.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::error::FoxError;
use crate::types::{PlayerId, RecordId};

/// One entry of a `TXWQFetchChessList` page.
///
/// Only `chessid` is interpreted. The remaining listing fields are kept
/// verbatim and logged when the record cannot be saved.
#[derive(Debug, Clone, Deserialize)]
pub struct GameRecordMetadata {
    #[serde(rename = "chessid", deserialize_with = "id_from_string_or_number")]
    pub id: RecordId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
impl GameRecordMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            extra: Map::new(),
        }
    }
}

/// One slot of a listing page, in server order.
#[derive(Debug, Clone)]
pub enum ListingEntry {
    Game(GameRecordMetadata),
    /// An entry without a usable `chessid`. `position` is its index on the
    /// page.
    Malformed { position: usize, reason: String },
}

impl ListingEntry {
    pub fn id(&self) -> Option<&RecordId> {
        match self {
            ListingEntry::Game(meta) => Some(&meta.id),
            ListingEntry::Malformed { .. } => None,
        }
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(RecordId::new(s)),
        Value::Number(n) => Ok(RecordId::new(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected chessid string or number, got {other}"
        ))),
    }
}

pub(crate) const LIST_ENDPOINT: &str = "TXWQFetchChessList";
pub(crate) const RECORD_ENDPOINT: &str = "TXWQFetchChess";
pub(crate) const USER_INFO_ENDPOINT: &str = "QueryUserInfoPanel";

/// Extract the page from a listing response.
///
/// An absent `chesslist` is a malformed response, not the end of the
/// archive; only an empty array ends pagination. Entries are parsed one by
/// one so a single bad entry does not cost the rest of the page.
pub(crate) fn parse_chess_list(mut response: Value) -> Result<Vec<ListingEntry>, FoxError> {
    let list = match response.get_mut("chesslist") {
        Some(Value::Array(entries)) => std::mem::take(entries),
        Some(Value::Null) => Vec::new(),
        Some(other) => {
            return Err(FoxError::malformed(
                LIST_ENDPOINT,
                format!("'chesslist' is not an array: {other}"),
            ))
        }
        None => return Err(FoxError::malformed(LIST_ENDPOINT, "missing 'chesslist'")),
    };

    let page = list
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let raw = entry.to_string();
            match serde_json::from_value::<GameRecordMetadata>(entry) {
                Ok(meta) => ListingEntry::Game(meta),
                Err(e) => {
                    tracing::debug!(position, entry = %raw, "Unusable listing entry");
                    ListingEntry::Malformed {
                        position,
                        reason: e.to_string(),
                    }
                }
            }
        })
        .collect();
    Ok(page)
}

/// Extract the raw SGF text from a record response.
pub(crate) fn parse_chess(mut response: Value, id: &RecordId) -> Result<String, FoxError> {
    match response.get_mut("chess").map(Value::take) {
        Some(Value::String(sgf)) if !sgf.trim().is_empty() => Ok(sgf),
        _ => Err(FoxError::NotFound(id.to_string())),
    }
}

/// Extract the player's uid from a `QueryUserInfoPanel` response.
pub(crate) fn parse_uid(response: &Value, username: &str) -> Result<PlayerId, FoxError> {
    let uid = response
        .get("uid")
        .or_else(|| response.get("info").and_then(|info| info.get("uid")));
    match uid {
        Some(Value::Number(n)) if n.as_u64() != Some(0) => Ok(PlayerId::new(n.to_string())),
        Some(Value::String(s)) if !s.is_empty() && s != "0" => Ok(PlayerId::new(s.clone())),
        _ => Err(FoxError::UnknownPlayer(username.to_string())),
    }
}
