//! Persistent rating storage.
//!
//! A rating is four 1-10 scores plus a comment, recorded by one user about
//! another. The store is the source of truth for cooldown checks and for the
//! per-player rating summaries.

mod memory;
mod sqlite;

pub use memory::InMemoryRatingStore;
pub use sqlite::SqliteRatingStore;

use crate::ids::UserId;
use async_trait::async_trait;
use std::fmt;

/// A rating as submitted, before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRating {
    pub subject: UserId,
    pub rater: UserId,
    pub shot: u8,
    pub assist: u8,
    pub defense: u8,
    pub goalkeeping: u8,
    pub comment: String,
    /// Unix seconds at submission time.
    pub timestamp: i64,
}

/// A rating as stored. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingRecord {
    pub id: i64,
    pub subject: UserId,
    pub rater: UserId,
    pub shot: u8,
    pub assist: u8,
    pub defense: u8,
    pub goalkeeping: u8,
    pub comment: String,
    pub timestamp: i64,
}

#[derive(Debug)]
pub enum StoreError {
    Storage { operation: String, message: String },
}

impl StoreError {
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Storage { operation, message } => {
                write!(f, "storage error during {operation}: {message}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Backend-agnostic rating persistence.
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Insert a rating and return it with its assigned id.
    async fn insert(&self, rating: NewRating) -> Result<RatingRecord, StoreError>;

    /// All ratings of `subject`, oldest first.
    async fn all_for_subject(&self, subject: &UserId) -> Result<Vec<RatingRecord>, StoreError>;

    /// The unix timestamp of the most recent rating of `subject` by `rater`,
    /// if any. Feeds the cooldown check.
    async fn latest_timestamp(
        &self,
        subject: &UserId,
        rater: &UserId,
    ) -> Result<Option<i64>, StoreError>;
}
