//! In-memory rating store, used in tests.

use super::{NewRating, RatingRecord, RatingStore, StoreError};
use crate::ids::UserId;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct InMemoryRatingStore {
    inner: Arc<RwLock<Vec<RatingRecord>>>,
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored rating, in insertion order.
    pub async fn dump(&self) -> Vec<RatingRecord> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn insert(&self, rating: NewRating) -> Result<RatingRecord, StoreError> {
        let mut records = self.inner.write().await;
        let record = RatingRecord {
            id: records.len() as i64 + 1,
            subject: rating.subject,
            rater: rating.rater,
            shot: rating.shot,
            assist: rating.assist,
            defense: rating.defense,
            goalkeeping: rating.goalkeeping,
            comment: rating.comment,
            timestamp: rating.timestamp,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn all_for_subject(&self, subject: &UserId) -> Result<Vec<RatingRecord>, StoreError> {
        let records = self.inner.read().await;
        Ok(records
            .iter()
            .filter(|r| &r.subject == subject)
            .cloned()
            .collect())
    }

    async fn latest_timestamp(
        &self,
        subject: &UserId,
        rater: &UserId,
    ) -> Result<Option<i64>, StoreError> {
        let records = self.inner.read().await;
        Ok(records
            .iter()
            .filter(|r| &r.subject == subject && &r.rater == rater)
            .map(|r| r.timestamp)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(subject: &str, rater: &str, timestamp: i64) -> NewRating {
        NewRating {
            subject: UserId::from(subject),
            rater: UserId::from(rater),
            shot: 7,
            assist: 6,
            defense: 5,
            goalkeeping: 4,
            comment: "solid".to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = InMemoryRatingStore::new();
        let first = store.insert(rating("s", "r", 1)).await.unwrap();
        let second = store.insert(rating("s", "r", 2)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_all_for_subject_filters_and_preserves_order() {
        let store = InMemoryRatingStore::new();
        store.insert(rating("alice", "r1", 10)).await.unwrap();
        store.insert(rating("bob", "r1", 20)).await.unwrap();
        store.insert(rating("alice", "r2", 30)).await.unwrap();
        let records = store
            .all_for_subject(&UserId::from("alice"))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, 10);
        assert_eq!(records[1].timestamp, 30);
    }

    #[tokio::test]
    async fn test_latest_timestamp_is_per_pair() {
        let store = InMemoryRatingStore::new();
        store.insert(rating("alice", "bob", 100)).await.unwrap();
        store.insert(rating("carol", "bob", 500)).await.unwrap();
        // Bob's recent rating of Carol does not affect the (Alice, Bob) pair.
        assert_eq!(
            store
                .latest_timestamp(&UserId::from("alice"), &UserId::from("bob"))
                .await
                .unwrap(),
            Some(100)
        );
        assert_eq!(
            store
                .latest_timestamp(&UserId::from("alice"), &UserId::from("dan"))
                .await
                .unwrap(),
            None
        );
    }
}
