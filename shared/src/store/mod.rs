//! Persistence boundary.
//!
//! Handlers and the auth pipeline only see the [`Store`] trait. `DynamoStore`
//! is the deployed backend; `MemoryStore` backs the test suites.

pub mod dynamo;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;
use crate::types::{AuditEntry, Book, ReadingHistoryEntry, Review, User};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Any transport or service failure. Not retried at this layer.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness guard rejected the write
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => ApiError::PersistenceUnavailable(msg),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // --- USERS ---
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Fails with `Conflict` when the email is already registered
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    /// Replace a user. `previous_email` keeps the email index in step when it changes.
    async fn update_user(&self, user: &User, previous_email: &str) -> StoreResult<()>;
    async fn delete_user(&self, user: &User) -> StoreResult<()>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    // --- BOOKS ---
    /// Newest first
    async fn list_books(&self) -> StoreResult<Vec<Book>>;
    async fn get_book(&self, book_id: &str) -> StoreResult<Option<Book>>;
    async fn put_book(&self, book: &Book) -> StoreResult<()>;
    async fn delete_book(&self, book_id: &str) -> StoreResult<()>;

    // --- REVIEWS ---
    async fn reviews_for_book(&self, book_id: &str) -> StoreResult<Vec<Review>>;
    async fn reviews_for_user(&self, user_id: &str) -> StoreResult<Vec<Review>>;
    async fn find_review(&self, book_id: &str, user_id: &str) -> StoreResult<Option<Review>>;
    async fn get_review(&self, review_id: &str) -> StoreResult<Option<Review>>;
    /// Fails with `Conflict` when the (book, user) pair already has a review
    async fn insert_review(&self, review: &Review) -> StoreResult<()>;
    /// Overwrite a review already inserted under the same id
    async fn put_review(&self, review: &Review) -> StoreResult<()>;
    async fn delete_review(&self, review: &Review) -> StoreResult<()>;

    // --- READING HISTORY ---
    async fn history_for_user(&self, user_id: &str) -> StoreResult<Vec<ReadingHistoryEntry>>;
    async fn find_history(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> StoreResult<Option<ReadingHistoryEntry>>;
    async fn get_history(&self, entry_id: &str) -> StoreResult<Option<ReadingHistoryEntry>>;
    /// Fails with `Conflict` when the (user, book) pair already has an entry
    async fn insert_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()>;
    /// Overwrite an entry already inserted under the same id
    async fn put_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()>;
    async fn delete_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()>;

    // --- AUDIT ---
    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StoreResult<()>;
    /// Newest first, at most `limit` entries
    async fn recent_audit_entries(&self, limit: usize) -> StoreResult<Vec<AuditEntry>>;
}
