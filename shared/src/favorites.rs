use lambda_http::{http::StatusCode, Body, Response};

use crate::auth::Principal;
use crate::books::new_book;
use crate::error::ApiError;
use crate::response;
use crate::types::{AddFavoriteRequest, Book, BookFields};
use crate::AppState;

/// GET /api/favorites
pub async fn list_favorites(state: &AppState, principal: &Principal) -> Result<Response<Body>, ApiError> {
    let user = principal.require_user()?;

    let mut books: Vec<Book> = Vec::with_capacity(user.favorites.len());
    for book_id in &user.favorites {
        match state.store.get_book(book_id).await? {
            Some(book) => books.push(book),
            None => tracing::debug!("Favorite {} no longer resolves, skipping", book_id),
        }
    }

    response::json(StatusCode::OK, &books)
}

/// POST /api/favorites
///
/// With `_id` the existing book is favorited; without it a book is created
/// from the title/author/image in the body first.
pub async fn add_favorite(
    state: &AppState,
    principal: &Principal,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: AddFavoriteRequest = serde_json::from_slice(body)?;
    let current = principal.require_user()?;

    let book = match req.book_id.filter(|id| !id.is_empty()) {
        Some(book_id) => state
            .store
            .get_book(&book_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?,
        None => {
            let book = new_book(
                BookFields {
                    title: req.title,
                    author: req.author,
                    image: req.image,
                    ..Default::default()
                },
                None,
            )?;
            state.store.put_book(&book).await?;
            book
        }
    };

    if !current.favorites.contains(&book.book_id) {
        let mut user = current.clone();
        user.favorites.push(book.book_id.clone());
        state.store.update_user(&user, &current.email).await?;
    }

    response::json(StatusCode::CREATED, &book)
}

/// DELETE /api/favorites/{bookId}
pub async fn remove_favorite(
    state: &AppState,
    principal: &Principal,
    book_id: &str,
) -> Result<Response<Body>, ApiError> {
    let current = principal.require_user()?;

    if current.favorites.iter().any(|id| id == book_id) {
        let mut user = current.clone();
        user.favorites.retain(|id| id != book_id);
        state.store.update_user(&user, &current.email).await?;
    }

    response::message(StatusCode::OK, "Favorite removed")
}
