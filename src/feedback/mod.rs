//! Per-account feedback log.
//!
//! Records are owned by the account that submitted them. The owner filter
//! lives inside [`FeedbackStore`] itself, so there is no query path that
//! returns another account's records.

pub mod store;

pub use store::{FeedbackRecord, FeedbackStore, MAX_MESSAGE_CHARS};
