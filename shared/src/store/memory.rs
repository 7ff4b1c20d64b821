use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Store, StoreError, StoreResult};
use crate::types::{AuditEntry, Book, ReadingHistoryEntry, Review, User};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    emails: HashMap<String, String>,
    books: HashMap<String, Book>,
    reviews: HashMap<String, Review>,
    history: HashMap<String, ReadingHistoryEntry>,
    audit: Vec<AuditEntry>,
}

/// In-process store with fault injection.
///
/// `set_unavailable` makes every call fail; `set_audit_failing` only fails
/// `insert_audit_entry`; `miss_pair_lookups` makes the next `find_review` or
/// `find_history` calls report nothing, as a read racing another writer would.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    audit_failing: AtomicBool,
    user_lookups: AtomicUsize,
    stale_pair_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_audit_failing(&self, failing: bool) {
        self.audit_failing.store(failing, Ordering::SeqCst);
    }

    pub fn miss_pair_lookups(&self, count: usize) {
        self.stale_pair_lookups.store(count, Ordering::SeqCst);
    }

    fn stale_lookup(&self) -> bool {
        self.stale_pair_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Number of `find_user_by_id` calls served so far
    pub fn user_lookups(&self) -> usize {
        self.user_lookups.load(Ordering::SeqCst)
    }

    /// Snapshot of the audit log in insertion order
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.lock().audit.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // a panicking test thread must not wedge the remaining assertions
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(self.lock())
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| key(b).cmp(key(a)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables()?.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables()?;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.emails.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        tables.emails.insert(user.email.clone(), user.user_id.clone());
        tables.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User, previous_email: &str) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if user.email != previous_email {
            if tables.emails.contains_key(&user.email) {
                return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
            }
            tables.emails.remove(previous_email);
            tables.emails.insert(user.email.clone(), user.user_id.clone());
        }
        tables.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables()?;
        tables.users.remove(&user.user_id);
        tables.emails.remove(&user.email);
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.tables()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        let mut books: Vec<Book> = self.tables()?.books.values().cloned().collect();
        newest_first(&mut books, |b| &b.created_at);
        Ok(books)
    }

    async fn get_book(&self, book_id: &str) -> StoreResult<Option<Book>> {
        Ok(self.tables()?.books.get(book_id).cloned())
    }

    async fn put_book(&self, book: &Book) -> StoreResult<()> {
        self.tables()?.books.insert(book.book_id.clone(), book.clone());
        Ok(())
    }

    async fn delete_book(&self, book_id: &str) -> StoreResult<()> {
        self.tables()?.books.remove(book_id);
        Ok(())
    }

    async fn reviews_for_book(&self, book_id: &str) -> StoreResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .tables()?
            .reviews
            .values()
            .filter(|r| r.book_id == book_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| &r.created_at);
        Ok(reviews)
    }

    async fn reviews_for_user(&self, user_id: &str) -> StoreResult<Vec<Review>> {
        let mut reviews: Vec<Review> = self
            .tables()?
            .reviews
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut reviews, |r| &r.created_at);
        Ok(reviews)
    }

    async fn find_review(&self, book_id: &str, user_id: &str) -> StoreResult<Option<Review>> {
        if self.stale_lookup() {
            return Ok(None);
        }
        Ok(self
            .tables()?
            .reviews
            .values()
            .find(|r| r.book_id == book_id && r.user_id == user_id)
            .cloned())
    }

    async fn get_review(&self, review_id: &str) -> StoreResult<Option<Review>> {
        Ok(self.tables()?.reviews.get(review_id).cloned())
    }

    async fn insert_review(&self, review: &Review) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables
            .reviews
            .values()
            .any(|r| r.book_id == review.book_id && r.user_id == review.user_id)
        {
            return Err(StoreError::Conflict(format!(
                "review of {} by {} exists",
                review.book_id, review.user_id
            )));
        }
        tables.reviews.insert(review.review_id.clone(), review.clone());
        Ok(())
    }

    async fn put_review(&self, review: &Review) -> StoreResult<()> {
        self.tables()?
            .reviews
            .insert(review.review_id.clone(), review.clone());
        Ok(())
    }

    async fn delete_review(&self, review: &Review) -> StoreResult<()> {
        self.tables()?.reviews.remove(&review.review_id);
        Ok(())
    }

    async fn history_for_user(&self, user_id: &str) -> StoreResult<Vec<ReadingHistoryEntry>> {
        let mut entries: Vec<ReadingHistoryEntry> = self
            .tables()?
            .history
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut entries, |e| &e.updated_at);
        Ok(entries)
    }

    async fn find_history(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> StoreResult<Option<ReadingHistoryEntry>> {
        if self.stale_lookup() {
            return Ok(None);
        }
        Ok(self
            .tables()?
            .history
            .values()
            .find(|e| e.user_id == user_id && e.book_id == book_id)
            .cloned())
    }

    async fn get_history(&self, entry_id: &str) -> StoreResult<Option<ReadingHistoryEntry>> {
        Ok(self.tables()?.history.get(entry_id).cloned())
    }

    async fn insert_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables
            .history
            .values()
            .any(|e| e.user_id == entry.user_id && e.book_id == entry.book_id)
        {
            return Err(StoreError::Conflict(format!(
                "history of {} for {} exists",
                entry.book_id, entry.user_id
            )));
        }
        tables.history.insert(entry.entry_id.clone(), entry.clone());
        Ok(())
    }

    async fn put_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()> {
        self.tables()?
            .history
            .insert(entry.entry_id.clone(), entry.clone());
        Ok(())
    }

    async fn delete_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()> {
        self.tables()?.history.remove(&entry.entry_id);
        Ok(())
    }

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StoreResult<()> {
        if self.audit_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit table rejected write".to_string()));
        }
        self.tables()?.audit.push(entry.clone());
        Ok(())
    }

    async fn recent_audit_entries(&self, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        let mut entries = self.tables()?.audit.clone();
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadingStatus;

    fn review(id: &str, rating: u8) -> Review {
        Review {
            review_id: id.into(),
            book_id: "b1".into(),
            user_id: "u1".into(),
            rating,
            comment: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn entry(id: &str, book_id: &str) -> ReadingHistoryEntry {
        ReadingHistoryEntry {
            entry_id: id.into(),
            user_id: "u1".into(),
            book_id: book_id.into(),
            status: ReadingStatus::ToRead,
            start_date: None,
            end_date: None,
            rating: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn test_second_review_for_pair_conflicts() {
        let store = MemoryStore::new();
        store.insert_review(&review("r1", 3)).await.unwrap();

        let err = store.insert_review(&review("r2", 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let reviews = store.reviews_for_book("b1").await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].review_id, "r1");
    }

    #[tokio::test]
    async fn test_second_history_entry_for_pair_conflicts() {
        let store = MemoryStore::new();
        store.insert_history(&entry("h1", "b1")).await.unwrap();
        store.insert_history(&entry("h2", "b2")).await.unwrap();

        let err = store.insert_history(&entry("h3", "b1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.history_for_user("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missed_pair_lookups_run_out() {
        let store = MemoryStore::new();
        store.insert_review(&review("r1", 3)).await.unwrap();
        store.miss_pair_lookups(1);

        assert!(store.find_review("b1", "u1").await.unwrap().is_none());
        assert!(store.find_review("b1", "u1").await.unwrap().is_some());
    }
}
