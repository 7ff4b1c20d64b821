//! Single-table DynamoDB backend.
//!
//! | entity        | PK               | SK         |
//! |---------------|------------------|------------|
//! | user          | `USER#<id>`      | `PROFILE`  |
//! | email guard   | `EMAIL#<email>`  | `EMAIL`    |
//! | book          | `BOOK#<id>`      | `METADATA` |
//! | review        | `REVIEW#<id>`    | `METADATA` |
//! | review guard  | `REVIEW_PAIR#<bookId>#<userId>` | `PAIR` |
//! | reading entry | `HISTORY#<id>`   | `METADATA` |
//! | history guard | `HISTORY_PAIR#<userId>#<bookId>` | `PAIR` |
//! | audit entry   | `AUDIT#<id>`     | `METADATA` |
//!
//! Every item also carries `entity_type`, which the listing scans filter on.
//! Guard items are written with `attribute_not_exists(PK)` in the same
//! transaction as the item they protect, so at most one user per email, one
//! review per (book, user) and one reading entry per (user, book) can commit.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, CancellationReason, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client as DynamoClient;

use super::{Store, StoreError, StoreResult};
use crate::types::{AuditEntry, Book, ReadingHistoryEntry, Review, User};

type Item = HashMap<String, AttributeValue>;

const METADATA: &str = "METADATA";
const PAIR: &str = "PAIR";

pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn get(&self, pk: String, sk: &str) -> StoreResult<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk.to_string()))
            .send()
            .await
            .map_err(|e| unavailable("get_item", e))?;
        Ok(result.item().cloned())
    }

    async fn put(&self, item: Item) -> StoreResult<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| unavailable("put_item", e))?;
        Ok(())
    }

    async fn delete(&self, pk: String, sk: &str) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk.to_string()))
            .send()
            .await
            .map_err(|e| unavailable("delete_item", e))?;
        Ok(())
    }

    /// Scan every item of one entity type, optionally matching one attribute
    async fn scan_entities(
        &self,
        entity_type: &str,
        field: Option<(&str, &str)>,
    ) -> StoreResult<Vec<Item>> {
        let mut filter = "entity_type = :type".to_string();
        if let Some((name, _)) = field {
            filter.push_str(&format!(" AND {} = :value", name));
        }

        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut req = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(&filter)
                .expression_attribute_values(":type", AttributeValue::S(entity_type.to_string()));
            if let Some((_, value)) = field {
                req = req.expression_attribute_values(":value", AttributeValue::S(value.to_string()));
            }

            let output = req
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| unavailable("scan", e))?;

            items.extend(output.items().iter().cloned());

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(items)
    }

    /// Uniqueness guard: a marker item that only exists once per key
    fn guard_put(&self, pk: String, sk: &str, owner: (&str, &str)) -> StoreResult<TransactWriteItem> {
        let mut item = base_item(pk, sk, "guard");
        item.insert(owner.0.into(), AttributeValue::S(owner.1.to_string()));

        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(PK)")
            .build()
            .map_err(|e| StoreError::Unavailable(format!("build guard put: {e}")))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn email_guard(&self, user: &User) -> StoreResult<TransactWriteItem> {
        self.guard_put(email_pk(&user.email), "EMAIL", ("user_id", &user.user_id))
    }

    fn item_put(&self, item: Item) -> StoreResult<TransactWriteItem> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("build put: {e}")))?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn key_delete(&self, pk: String, sk: &str) -> StoreResult<TransactWriteItem> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk.to_string()))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("build delete: {e}")))?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    /// Run a write transaction.
    ///
    /// `guard` names the index of a uniqueness guard in `items` and the conflict
    /// to report when that guard, and only that guard, failed its condition.
    /// Any other cancellation is an infrastructure failure.
    async fn transact(
        &self,
        op: &str,
        items: Vec<TransactWriteItem>,
        guard: Option<(usize, String)>,
    ) -> StoreResult<()> {
        let err = match self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        if let Some((index, conflict)) = guard {
            let reasons: &[CancellationReason] = match err.as_service_error() {
                Some(TransactWriteItemsError::TransactionCanceledException(e)) => {
                    e.cancellation_reasons()
                }
                _ => &[],
            };
            if guard_tripped(reasons, index) {
                return Err(StoreError::Conflict(conflict));
            }
        }
        Err(unavailable(op, err))
    }

    async fn get_via_guard(&self, pk: String, id_attr: &str, entity: &str) -> StoreResult<Option<Item>> {
        let guard = self.get(pk, PAIR).await?;
        match guard.as_ref().and_then(|item| get_s(item, id_attr)) {
            Some(id) => self.get(format!("{entity}#{id}"), METADATA).await,
            None => Ok(None),
        }
    }
}

/// True when the guard item at `index` was cancelled by its own condition
fn guard_tripped(reasons: &[CancellationReason], index: usize) -> bool {
    reasons
        .get(index)
        .and_then(|reason| reason.code())
        .map_or(false, |code| code == "ConditionalCheckFailed")
}

fn unavailable<E>(op: &str, err: E) -> StoreError
where
    E: std::error::Error + 'static,
{
    tracing::error!("DynamoDB {} failed: {}", op, DisplayErrorContext(&err));
    StoreError::Unavailable(format!("{op} failed"))
}

fn user_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

fn email_pk(email: &str) -> String {
    format!("EMAIL#{}", email)
}

fn review_pair_pk(book_id: &str, user_id: &str) -> String {
    format!("REVIEW_PAIR#{}#{}", book_id, user_id)
}

fn history_pair_pk(user_id: &str, book_id: &str) -> String {
    format!("HISTORY_PAIR#{}#{}", user_id, book_id)
}

// ---------- item mapping ----------

fn get_s(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn get_n<T: std::str::FromStr>(item: &Item, key: &str) -> Option<T> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<T>().ok())
}

fn get_list(item: &Item, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(|v| v.as_l().ok())
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_s().ok().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn put_opt_s(item: &mut Item, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        item.insert(key.to_string(), AttributeValue::S(v.clone()));
    }
}

fn put_opt_n<T: ToString>(item: &mut Item, key: &str, value: &Option<T>) {
    if let Some(v) = value {
        item.insert(key.to_string(), AttributeValue::N(v.to_string()));
    }
}

fn string_list(values: &[String]) -> AttributeValue {
    AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
}

fn base_item(pk: String, sk: &str, entity_type: &str) -> Item {
    let mut item = Item::new();
    item.insert("PK".into(), AttributeValue::S(pk));
    item.insert("SK".into(), AttributeValue::S(sk.to_string()));
    item.insert("entity_type".into(), AttributeValue::S(entity_type.to_string()));
    item
}

fn user_to_item(user: &User) -> Item {
    let mut item = base_item(user_pk(&user.user_id), "PROFILE", "user");
    item.insert("user_id".into(), AttributeValue::S(user.user_id.clone()));
    item.insert("first_name".into(), AttributeValue::S(user.first_name.clone()));
    item.insert("last_name".into(), AttributeValue::S(user.last_name.clone()));
    item.insert("email".into(), AttributeValue::S(user.email.clone()));
    item.insert("password_hash".into(), AttributeValue::S(user.password_hash.clone()));
    item.insert("role".into(), AttributeValue::S(user.role.as_str().to_string()));
    item.insert("favorites".into(), string_list(&user.favorites));
    item.insert("created_at".into(), AttributeValue::S(user.created_at.clone()));
    put_opt_s(&mut item, "address", &user.address);
    put_opt_s(&mut item, "city", &user.city);
    put_opt_s(&mut item, "state", &user.state);
    put_opt_s(&mut item, "avatar", &user.avatar);
    item
}

fn item_to_user(item: &Item) -> Option<User> {
    Some(User {
        user_id: get_s(item, "user_id")?,
        first_name: get_s(item, "first_name").unwrap_or_default(),
        last_name: get_s(item, "last_name").unwrap_or_default(),
        email: get_s(item, "email").unwrap_or_default(),
        password_hash: get_s(item, "password_hash").unwrap_or_default(),
        address: get_s(item, "address"),
        city: get_s(item, "city"),
        state: get_s(item, "state"),
        role: get_s(item, "role")
            .and_then(|r| r.parse().ok())
            .unwrap_or_default(),
        favorites: get_list(item, "favorites"),
        avatar: get_s(item, "avatar"),
        created_at: get_s(item, "created_at").unwrap_or_default(),
    })
}

fn book_to_item(book: &Book) -> Item {
    let mut item = base_item(format!("BOOK#{}", book.book_id), METADATA, "book");
    item.insert("book_id".into(), AttributeValue::S(book.book_id.clone()));
    item.insert("title".into(), AttributeValue::S(book.title.clone()));
    item.insert("author".into(), AttributeValue::S(book.author.clone()));
    item.insert("rating".into(), AttributeValue::N(book.rating.to_string()));
    item.insert("genres".into(), string_list(&book.genres));
    item.insert("created_at".into(), AttributeValue::S(book.created_at.clone()));
    item.insert("updated_at".into(), AttributeValue::S(book.updated_at.clone()));
    put_opt_s(&mut item, "image", &book.image);
    put_opt_s(&mut item, "teaser", &book.teaser);
    put_opt_s(&mut item, "buy_link", &book.buy_link);
    put_opt_s(&mut item, "excerpt", &book.excerpt);
    put_opt_n(&mut item, "year", &book.year);
    put_opt_n(&mut item, "pages", &book.pages);
    put_opt_s(&mut item, "publisher", &book.publisher);
    put_opt_s(&mut item, "isbn", &book.isbn);
    put_opt_s(&mut item, "long_description", &book.long_description);
    put_opt_s(&mut item, "user", &book.user);
    item
}

fn item_to_book(item: &Item) -> Option<Book> {
    Some(Book {
        book_id: get_s(item, "book_id")?,
        title: get_s(item, "title").unwrap_or_default(),
        author: get_s(item, "author").unwrap_or_default(),
        rating: get_n(item, "rating").unwrap_or(0.0),
        image: get_s(item, "image"),
        teaser: get_s(item, "teaser"),
        buy_link: get_s(item, "buy_link"),
        excerpt: get_s(item, "excerpt"),
        year: get_n(item, "year"),
        pages: get_n(item, "pages"),
        publisher: get_s(item, "publisher"),
        isbn: get_s(item, "isbn"),
        genres: get_list(item, "genres"),
        long_description: get_s(item, "long_description"),
        user: get_s(item, "user"),
        created_at: get_s(item, "created_at").unwrap_or_default(),
        updated_at: get_s(item, "updated_at").unwrap_or_default(),
    })
}

fn review_to_item(review: &Review) -> Item {
    let mut item = base_item(format!("REVIEW#{}", review.review_id), METADATA, "review");
    item.insert("review_id".into(), AttributeValue::S(review.review_id.clone()));
    item.insert("book_id".into(), AttributeValue::S(review.book_id.clone()));
    item.insert("user_id".into(), AttributeValue::S(review.user_id.clone()));
    item.insert("rating".into(), AttributeValue::N(review.rating.to_string()));
    item.insert("comment".into(), AttributeValue::S(review.comment.clone()));
    item.insert("created_at".into(), AttributeValue::S(review.created_at.clone()));
    item.insert("updated_at".into(), AttributeValue::S(review.updated_at.clone()));
    item
}

fn item_to_review(item: &Item) -> Option<Review> {
    Some(Review {
        review_id: get_s(item, "review_id")?,
        book_id: get_s(item, "book_id")?,
        user_id: get_s(item, "user_id")?,
        rating: get_n(item, "rating")?,
        comment: get_s(item, "comment").unwrap_or_default(),
        created_at: get_s(item, "created_at").unwrap_or_default(),
        updated_at: get_s(item, "updated_at").unwrap_or_default(),
    })
}

fn history_to_item(entry: &ReadingHistoryEntry) -> Item {
    let mut item = base_item(format!("HISTORY#{}", entry.entry_id), METADATA, "history");
    item.insert("entry_id".into(), AttributeValue::S(entry.entry_id.clone()));
    item.insert("user_id".into(), AttributeValue::S(entry.user_id.clone()));
    item.insert("book_id".into(), AttributeValue::S(entry.book_id.clone()));
    item.insert("status".into(), AttributeValue::S(entry.status.as_str().to_string()));
    item.insert("created_at".into(), AttributeValue::S(entry.created_at.clone()));
    item.insert("updated_at".into(), AttributeValue::S(entry.updated_at.clone()));
    put_opt_s(&mut item, "start_date", &entry.start_date);
    put_opt_s(&mut item, "end_date", &entry.end_date);
    put_opt_n(&mut item, "rating", &entry.rating);
    item
}

fn item_to_history(item: &Item) -> Option<ReadingHistoryEntry> {
    Some(ReadingHistoryEntry {
        entry_id: get_s(item, "entry_id")?,
        user_id: get_s(item, "user_id")?,
        book_id: get_s(item, "book_id")?,
        status: get_s(item, "status")?.parse().ok()?,
        start_date: get_s(item, "start_date"),
        end_date: get_s(item, "end_date"),
        rating: get_n(item, "rating"),
        created_at: get_s(item, "created_at").unwrap_or_default(),
        updated_at: get_s(item, "updated_at").unwrap_or_default(),
    })
}

fn audit_to_item(entry: &AuditEntry) -> Item {
    let mut item = base_item(format!("AUDIT#{}", entry.entry_id), METADATA, "audit");
    item.insert("entry_id".into(), AttributeValue::S(entry.entry_id.clone()));
    item.insert("actor".into(), AttributeValue::S(entry.actor.clone()));
    item.insert("action".into(), AttributeValue::S(entry.action.clone()));
    item.insert("target_type".into(), AttributeValue::S(entry.target_type.clone()));
    item.insert("target_id".into(), AttributeValue::S(entry.target_id.clone()));
    item.insert("meta".into(), AttributeValue::S(entry.meta.to_string()));
    item.insert("created_at".into(), AttributeValue::S(entry.created_at.clone()));
    item
}

fn item_to_audit(item: &Item) -> Option<AuditEntry> {
    Some(AuditEntry {
        entry_id: get_s(item, "entry_id")?,
        actor: get_s(item, "actor").unwrap_or_default(),
        action: get_s(item, "action").unwrap_or_default(),
        target_type: get_s(item, "target_type").unwrap_or_default(),
        target_id: get_s(item, "target_id").unwrap_or_default(),
        meta: get_s(item, "meta")
            .and_then(|m| serde_json::from_str(&m).ok())
            .unwrap_or(serde_json::Value::Null),
        created_at: get_s(item, "created_at").unwrap_or_default(),
    })
}

fn sorted_desc<T>(mut values: Vec<T>, key: impl Fn(&T) -> &str) -> Vec<T> {
    values.sort_by(|a, b| key(b).cmp(key(a)));
    values
}

#[async_trait]
impl Store for DynamoStore {
    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .get(user_pk(user_id), "PROFILE")
            .await?
            .as_ref()
            .and_then(item_to_user))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let guard = self.get(email_pk(email), "EMAIL").await?;
        match guard.as_ref().and_then(|item| get_s(item, "user_id")) {
            Some(user_id) => self.find_user_by_id(&user_id).await,
            None => Ok(None),
        }
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let items = vec![self.email_guard(user)?, self.item_put(user_to_item(user))?];
        let conflict = format!("email {} already registered", user.email);
        self.transact("insert_user", items, Some((0, conflict))).await
    }

    async fn update_user(&self, user: &User, previous_email: &str) -> StoreResult<()> {
        if user.email == previous_email {
            return self.put(user_to_item(user)).await;
        }
        let items = vec![
            self.item_put(user_to_item(user))?,
            self.key_delete(email_pk(previous_email), "EMAIL")?,
            self.email_guard(user)?,
        ];
        let conflict = format!("email {} already registered", user.email);
        self.transact("update_user", items, Some((2, conflict))).await
    }

    async fn delete_user(&self, user: &User) -> StoreResult<()> {
        let items = vec![
            self.key_delete(user_pk(&user.user_id), "PROFILE")?,
            self.key_delete(email_pk(&user.email), "EMAIL")?,
        ];
        self.transact("delete_user", items, None).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let items = self.scan_entities("user", None).await?;
        let mut users: Vec<User> = items.iter().filter_map(item_to_user).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        let items = self.scan_entities("book", None).await?;
        let books = items.iter().filter_map(item_to_book).collect();
        Ok(sorted_desc(books, |b: &Book| &b.created_at))
    }

    async fn get_book(&self, book_id: &str) -> StoreResult<Option<Book>> {
        Ok(self
            .get(format!("BOOK#{}", book_id), METADATA)
            .await?
            .as_ref()
            .and_then(item_to_book))
    }

    async fn put_book(&self, book: &Book) -> StoreResult<()> {
        self.put(book_to_item(book)).await
    }

    async fn delete_book(&self, book_id: &str) -> StoreResult<()> {
        self.delete(format!("BOOK#{}", book_id), METADATA).await
    }

    async fn reviews_for_book(&self, book_id: &str) -> StoreResult<Vec<Review>> {
        let items = self.scan_entities("review", Some(("book_id", book_id))).await?;
        let reviews = items.iter().filter_map(item_to_review).collect();
        Ok(sorted_desc(reviews, |r: &Review| &r.created_at))
    }

    async fn reviews_for_user(&self, user_id: &str) -> StoreResult<Vec<Review>> {
        let items = self.scan_entities("review", Some(("user_id", user_id))).await?;
        let reviews = items.iter().filter_map(item_to_review).collect();
        Ok(sorted_desc(reviews, |r: &Review| &r.created_at))
    }

    async fn find_review(&self, book_id: &str, user_id: &str) -> StoreResult<Option<Review>> {
        Ok(self
            .get_via_guard(review_pair_pk(book_id, user_id), "review_id", "REVIEW")
            .await?
            .as_ref()
            .and_then(item_to_review))
    }

    async fn get_review(&self, review_id: &str) -> StoreResult<Option<Review>> {
        Ok(self
            .get(format!("REVIEW#{}", review_id), METADATA)
            .await?
            .as_ref()
            .and_then(item_to_review))
    }

    async fn insert_review(&self, review: &Review) -> StoreResult<()> {
        let items = vec![
            self.guard_put(
                review_pair_pk(&review.book_id, &review.user_id),
                PAIR,
                ("review_id", &review.review_id),
            )?,
            self.item_put(review_to_item(review))?,
        ];
        let conflict = format!("review of {} by {} exists", review.book_id, review.user_id);
        self.transact("insert_review", items, Some((0, conflict))).await
    }

    async fn put_review(&self, review: &Review) -> StoreResult<()> {
        self.put(review_to_item(review)).await
    }

    async fn delete_review(&self, review: &Review) -> StoreResult<()> {
        let items = vec![
            self.key_delete(format!("REVIEW#{}", review.review_id), METADATA)?,
            self.key_delete(review_pair_pk(&review.book_id, &review.user_id), PAIR)?,
        ];
        self.transact("delete_review", items, None).await
    }

    async fn history_for_user(&self, user_id: &str) -> StoreResult<Vec<ReadingHistoryEntry>> {
        let items = self.scan_entities("history", Some(("user_id", user_id))).await?;
        let entries = items.iter().filter_map(item_to_history).collect();
        Ok(sorted_desc(entries, |e: &ReadingHistoryEntry| &e.updated_at))
    }

    async fn find_history(
        &self,
        user_id: &str,
        book_id: &str,
    ) -> StoreResult<Option<ReadingHistoryEntry>> {
        Ok(self
            .get_via_guard(history_pair_pk(user_id, book_id), "entry_id", "HISTORY")
            .await?
            .as_ref()
            .and_then(item_to_history))
    }

    async fn get_history(&self, entry_id: &str) -> StoreResult<Option<ReadingHistoryEntry>> {
        Ok(self
            .get(format!("HISTORY#{}", entry_id), METADATA)
            .await?
            .as_ref()
            .and_then(item_to_history))
    }

    async fn insert_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()> {
        let items = vec![
            self.guard_put(
                history_pair_pk(&entry.user_id, &entry.book_id),
                PAIR,
                ("entry_id", &entry.entry_id),
            )?,
            self.item_put(history_to_item(entry))?,
        ];
        let conflict = format!("history of {} for {} exists", entry.book_id, entry.user_id);
        self.transact("insert_history", items, Some((0, conflict))).await
    }

    async fn put_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()> {
        self.put(history_to_item(entry)).await
    }

    async fn delete_history(&self, entry: &ReadingHistoryEntry) -> StoreResult<()> {
        let items = vec![
            self.key_delete(format!("HISTORY#{}", entry.entry_id), METADATA)?,
            self.key_delete(history_pair_pk(&entry.user_id, &entry.book_id), PAIR)?,
        ];
        self.transact("delete_history", items, None).await
    }

    async fn insert_audit_entry(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.put(audit_to_item(entry)).await
    }

    async fn recent_audit_entries(&self, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        let items = self.scan_entities("audit", None).await?;
        let entries = items.iter().filter_map(item_to_audit).collect();
        let mut entries = sorted_desc(entries, |e: &AuditEntry| &e.created_at);
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReadingStatus, Role};

    fn sample_user() -> User {
        User {
            user_id: "u1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$v=19$hash".into(),
            address: Some("12 rue des Livres".into()),
            city: None,
            state: None,
            role: Role::Creator,
            favorites: vec!["b1".into(), "b2".into()],
            avatar: None,
            created_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_user_item_keys_and_round_trip() {
        let user = sample_user();
        let item = user_to_item(&user);
        assert_eq!(get_s(&item, "PK").unwrap(), "USER#u1");
        assert_eq!(get_s(&item, "SK").unwrap(), "PROFILE");
        assert_eq!(get_s(&item, "entity_type").unwrap(), "user");
        assert!(!item.contains_key("city"));
        assert_eq!(item_to_user(&item).unwrap(), user);
    }

    #[test]
    fn test_audit_meta_is_stored_as_json_text() {
        let entry = AuditEntry {
            entry_id: "a1".into(),
            actor: "admin1".into(),
            action: "delete_user".into(),
            target_type: "user".into(),
            target_id: "u2".into(),
            meta: serde_json::json!({"email": "u2@example.com"}),
            created_at: "2026-01-01T00:00:00+00:00".into(),
        };
        let item = audit_to_item(&entry);
        assert!(item.get("meta").unwrap().as_s().is_ok());
        assert_eq!(item_to_audit(&item).unwrap(), entry);
    }

    fn reason(code: &str) -> CancellationReason {
        CancellationReason::builder().code(code).build()
    }

    #[test]
    fn test_only_the_guard_condition_is_a_conflict() {
        let guard_failed = [reason("ConditionalCheckFailed"), reason("None")];
        assert!(guard_tripped(&guard_failed, 0));
        assert!(!guard_tripped(&guard_failed, 1));

        let write_conflict = [reason("None"), reason("TransactionConflict")];
        assert!(!guard_tripped(&write_conflict, 0));

        let racing_write = [reason("TransactionConflict"), reason("None")];
        assert!(!guard_tripped(&racing_write, 0));

        assert!(!guard_tripped(&[], 0));
    }

    #[test]
    fn test_pair_guard_keys() {
        assert_eq!(review_pair_pk("b1", "u1"), "REVIEW_PAIR#b1#u1");
        assert_eq!(history_pair_pk("u1", "b1"), "HISTORY_PAIR#u1#b1");
    }

    #[test]
    fn test_history_with_unknown_status_is_skipped() {
        let entry = ReadingHistoryEntry {
            entry_id: "h1".into(),
            user_id: "u1".into(),
            book_id: "b1".into(),
            status: ReadingStatus::Reading,
            start_date: Some("2026-02-01T00:00:00+00:00".into()),
            end_date: None,
            rating: Some(4),
            created_at: "2026-02-01T00:00:00+00:00".into(),
            updated_at: "2026-02-01T00:00:00+00:00".into(),
        };
        let mut item = history_to_item(&entry);
        assert_eq!(item_to_history(&item).unwrap(), entry);

        item.insert("status".into(), AttributeValue::S("abandoned".into()));
        assert!(item_to_history(&item).is_none());
    }
}
