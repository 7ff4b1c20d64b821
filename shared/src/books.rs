use chrono::Utc;
use lambda_http::{http::StatusCode, Body, Response};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{Principal, RequestContext};
use crate::error::{ApiError, FieldError};
use crate::response;
use crate::types::{Book, BookFields};
use crate::AppState;

/// Client-side catalogue entries carry ids starting with `m` and never live in the store.
fn is_manual(book_id: &str) -> bool {
    book_id.starts_with('m')
}

fn book_not_found() -> ApiError {
    ApiError::NotFound("Book not found".to_string())
}

/// Resolve a path id to a stored book. Manual ids are rejected with `on_manual`.
async fn load_book(state: &AppState, book_id: &str, on_manual: ApiError) -> Result<Book, ApiError> {
    if is_manual(book_id) {
        return Err(on_manual);
    }
    if Uuid::parse_str(book_id).is_err() {
        return Err(book_not_found());
    }
    state.store.get_book(book_id).await?.ok_or_else(book_not_found)
}

fn required(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

/// Build a new book record from request fields.
pub(crate) fn new_book(fields: BookFields, owner: Option<String>) -> Result<Book, ApiError> {
    let mut errors = Vec::new();
    if !required(&fields.title) {
        errors.push(FieldError::new("title", "Title required"));
    }
    if !required(&fields.author) {
        errors.push(FieldError::new("author", "Author required"));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let now = Utc::now().to_rfc3339();
    Ok(Book {
        book_id: Uuid::new_v4().to_string(),
        title: fields.title.unwrap_or_default(),
        author: fields.author.unwrap_or_default(),
        rating: fields.rating.unwrap_or(0.0),
        image: fields.image,
        teaser: fields.teaser,
        buy_link: fields.buy_link,
        excerpt: fields.excerpt,
        year: fields.year,
        pages: fields.pages,
        publisher: fields.publisher,
        isbn: fields.isbn,
        genres: fields.genres.unwrap_or_default(),
        long_description: fields.long_description,
        user: owner,
        created_at: now.clone(),
        updated_at: now,
    })
}

fn apply_fields(book: &mut Book, fields: BookFields) {
    macro_rules! assign {
        ($($name:ident),*) => {
            $(if let Some(v) = fields.$name { book.$name = v; })*
        };
    }
    macro_rules! assign_opt {
        ($($name:ident),*) => {
            $(if fields.$name.is_some() { book.$name = fields.$name; })*
        };
    }
    assign!(title, author, rating, genres);
    assign_opt!(image, teaser, buy_link, excerpt, year, pages, publisher, isbn, long_description);
    book.updated_at = Utc::now().to_rfc3339();
}

/// GET /api/books
pub async fn list_books(state: &AppState) -> Result<Response<Body>, ApiError> {
    let books = state.store.list_books().await?;
    response::json(StatusCode::OK, &books)
}

/// GET /api/books/{id}
pub async fn get_book(state: &AppState, book_id: &str) -> Result<Response<Body>, ApiError> {
    let book = load_book(state, book_id, book_not_found()).await?;
    response::json(StatusCode::OK, &book)
}

/// POST /api/books
pub async fn create_book(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let fields: BookFields = serde_json::from_slice(body)?;
    let book = new_book(fields, Some(principal.subject.clone()))?;
    state.store.put_book(&book).await?;

    tracing::info!("Book {} created by {}", book.book_id, principal.subject);

    state
        .audit
        .record_mutation(ctx, principal, &book.book_id, json!({ "title": book.title }))
        .await;

    response::json(StatusCode::CREATED, &book)
}

/// PUT /api/books/{id}
pub async fn update_book(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
    book_id: &str,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let fields: BookFields = serde_json::from_slice(body)?;
    let mut book = load_book(state, book_id, ApiError::Forbidden).await?;

    let mut changes = serde_json::to_value(&fields)?;
    if let Value::Object(map) = &mut changes {
        map.retain(|_, v| !v.is_null());
    }
    apply_fields(&mut book, fields);
    state.store.put_book(&book).await?;

    state
        .audit
        .record_mutation(ctx, principal, &book.book_id, json!({ "changes": changes }))
        .await;

    response::json(StatusCode::OK, &book)
}

/// DELETE /api/books/{id}
pub async fn delete_book(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
    book_id: &str,
) -> Result<Response<Body>, ApiError> {
    let book = load_book(state, book_id, ApiError::Forbidden).await?;
    state.store.delete_book(&book.book_id).await?;

    state
        .audit
        .record_mutation(ctx, principal, &book.book_id, json!({ "title": book.title }))
        .await;

    response::message(StatusCode::OK, "Book deleted")
}
