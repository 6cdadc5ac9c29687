//! FoxWQ game-server API.
//!
//! The chessbook endpoints list a player's archived games page by page
//! (`TXWQFetchChessList`, cursor = last `chessid` seen) and return the SGF
//! text of one game (`TXWQFetchChess`). `QueryUserInfoPanel` maps a
//! nickname to a uid.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Credentials, FoxClient};
pub use error::FoxError;
pub use types::ListingEntry;
