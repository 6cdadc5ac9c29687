//! Remote collaborators consumed by the engine, and the lazy page walk.

use async_trait::async_trait;
use futures_util::stream::{self, Stream};

use super::error::SyncError;
use crate::fox::{FoxError, ListingEntry};
use crate::types::{PlayerId, RecordId};

/// One page of a player's archive listing per call.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// `cursor` is the id of the last entry of the previous page, `None` for
    /// the first page. An empty page means there is nothing more to list.
    async fn list_page(
        &self,
        player: &PlayerId,
        cursor: Option<&RecordId>,
        page_size: Option<u32>,
    ) -> Result<Vec<ListingEntry>, FoxError>;
}

/// Raw SGF content of a single record.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_record(&self, id: &RecordId, player: &PlayerId) -> Result<String, FoxError>;
}

/// Nickname to uid resolution, used before a run when the target player is
/// given by name.
#[async_trait]
pub trait PlayerLookup: Send + Sync {
    async fn resolve_player(&self, username: &str) -> Result<PlayerId, FoxError>;
}

/// Walk the listing page by page until the source returns an empty page.
///
/// Each poll of the stream issues exactly one `list_page` call; pages are
/// requested only as the consumer asks for them. There is no page cap: the
/// walk ends on an empty page, on a listing error, or when a page fails to
/// move the cursor forward. The next cursor is the last entry on the page
/// that carries a chess id.
pub fn listing_pages<'a>(
    source: &'a dyn ListingSource,
    player: &'a PlayerId,
    page_size: Option<u32>,
) -> impl Stream<Item = Result<Vec<ListingEntry>, SyncError>> + 'a {
    stream::try_unfold(None::<RecordId>, move |cursor| async move {
        let page = match source.list_page(player, cursor.as_ref(), page_size).await {
            Ok(page) => page,
            Err(e) => return Err(SyncError::Listing(e)),
        };

        if page.is_empty() {
            return Ok(None);
        }
        let Some(last) = page.iter().rev().find_map(ListingEntry::id) else {
            return Err(SyncError::NoCursor {
                entries: page.len(),
            });
        };
        if cursor.as_ref() == Some(last) {
            return Err(SyncError::PaginationStalled {
                cursor: last.clone(),
            });
        }
        let next = Some(last.clone());
        Ok(Some((page, next)))
    })
}
