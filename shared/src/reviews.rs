use chrono::Utc;
use lambda_http::{http::StatusCode, Body, Response};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::response;
use crate::store::{StoreError, StoreResult};
use crate::types::{Review, ReviewWithAuthor, UpsertReviewRequest};
use crate::AppState;

/// Validate a 1..=5 star rating
pub(crate) fn star_rating(rating: i64) -> Result<u8, ApiError> {
    match u8::try_from(rating) {
        Ok(r @ 1..=5) => Ok(r),
        _ => Err(ApiError::BadRequest("Rating must be between 1 and 5".to_string())),
    }
}

async fn with_authors(state: &AppState, reviews: Vec<Review>) -> StoreResult<Vec<ReviewWithAuthor>> {
    let mut populated = Vec::with_capacity(reviews.len());
    for review in reviews {
        let author = state.store.find_user_by_id(&review.user_id).await?;
        populated.push(ReviewWithAuthor::new(review, author.as_ref()));
    }
    Ok(populated)
}

/// GET /api/reviews/book/{bookId}
///
/// A store failure degrades to an empty list instead of an error.
pub async fn reviews_for_book(state: &AppState, book_id: &str) -> Result<Response<Body>, ApiError> {
    let reviews = match state.store.reviews_for_book(book_id).await {
        Ok(reviews) => with_authors(state, reviews).await,
        Err(e) => Err(e),
    };

    match reviews {
        Ok(reviews) => response::json(StatusCode::OK, &reviews),
        Err(e) => {
            tracing::warn!("Reviews for book {} unavailable: {}", book_id, e);
            response::json(StatusCode::OK, &Vec::<ReviewWithAuthor>::new())
        }
    }
}

/// GET /api/reviews/user/{userId}
pub async fn reviews_for_user(state: &AppState, user_id: &str) -> Result<Response<Body>, ApiError> {
    let reviews = state.store.reviews_for_user(user_id).await?;
    response::json(StatusCode::OK, &reviews)
}

async fn revise_review(
    state: &AppState,
    mut existing: Review,
    rating: u8,
    comment: String,
    now: String,
) -> Result<Review, ApiError> {
    existing.rating = rating;
    existing.comment = comment;
    existing.updated_at = now;
    state.store.put_review(&existing).await?;
    Ok(existing)
}

/// POST /api/reviews
///
/// One review per (book, user): posting again overwrites rating and comment.
pub async fn upsert_review(
    state: &AppState,
    principal: &Principal,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: UpsertReviewRequest = serde_json::from_slice(body)?;

    // a zero rating counts as absent
    let (book_id, rating) = match (req.book_id.filter(|b| !b.is_empty()), req.rating) {
        (Some(book_id), Some(rating)) if rating != 0 => (book_id, rating),
        _ => return Err(ApiError::BadRequest("bookId and rating are required".to_string())),
    };
    let rating = star_rating(rating)?;
    let comment = req.comment.unwrap_or_default();
    let now = Utc::now().to_rfc3339();

    let review = match state.store.find_review(&book_id, &principal.subject).await? {
        Some(existing) => revise_review(state, existing, rating, comment, now).await?,
        None => {
            let review = Review {
                review_id: Uuid::new_v4().to_string(),
                book_id,
                user_id: principal.subject.clone(),
                rating,
                comment,
                created_at: now.clone(),
                updated_at: now.clone(),
            };
            match state.store.insert_review(&review).await {
                Ok(()) => review,
                // another post for the same pair committed first
                Err(StoreError::Conflict(_)) => {
                    let existing = state
                        .store
                        .find_review(&review.book_id, &principal.subject)
                        .await?
                        .ok_or_else(|| {
                            ApiError::PersistenceUnavailable("review guard without review".to_string())
                        })?;
                    revise_review(state, existing, rating, review.comment, now).await?
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let author = state.store.find_user_by_id(&principal.subject).await?;
    response::json(
        StatusCode::CREATED,
        &ReviewWithAuthor::new(review, author.as_ref()),
    )
}

/// DELETE /api/reviews/{reviewId}
pub async fn delete_review(
    state: &AppState,
    principal: &Principal,
    review_id: &str,
) -> Result<Response<Body>, ApiError> {
    let review = state
        .store
        .get_review(review_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;

    if review.user_id != principal.subject {
        return Err(ApiError::Forbidden);
    }

    state.store.delete_review(&review).await?;
    response::message(StatusCode::OK, "Review deleted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_rating_bounds() {
        assert_eq!(star_rating(1).unwrap(), 1);
        assert_eq!(star_rating(5).unwrap(), 5);
        assert!(star_rating(0).is_err());
        assert!(star_rating(6).is_err());
        assert!(star_rating(-3).is_err());
        assert!(star_rating(261).is_err());
    }
}
