//! SGF handling: repairing FoxWQ payloads and naming saved records.

pub mod naming;
pub mod normalize;
pub mod rewrite;

pub use naming::derive_filename;
pub use normalize::normalize;
pub use rewrite::normalize_directory;
