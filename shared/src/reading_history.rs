use chrono::{DateTime, NaiveDate, Utc};
use lambda_http::{http::StatusCode, Body, Response};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::response;
use crate::reviews::star_rating;
use crate::store::StoreError;
use crate::types::{ReadingHistoryEntry, ReadingStatus, UpsertHistoryRequest};
use crate::AppState;

/// Normalize a client date (RFC 3339 or `YYYY-MM-DD`) to RFC 3339 UTC.
fn parse_date(field: &str, raw: &str) -> Result<String, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc).to_rfc3339());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().to_rfc3339())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid {field}")))
}

fn optional_date(field: &str, raw: Option<String>) -> Result<Option<String>, ApiError> {
    raw.filter(|r| !r.is_empty())
        .map(|r| parse_date(field, &r))
        .transpose()
}

/// Move an entry to `status`, applying the date rules that go with it.
fn apply_status(
    entry: &mut ReadingHistoryEntry,
    status: ReadingStatus,
    start_date: Option<String>,
    end_date: Option<String>,
) {
    entry.status = status;
    match status {
        ReadingStatus::ToRead => {
            entry.start_date = None;
            entry.end_date = None;
        }
        ReadingStatus::Reading | ReadingStatus::Read => {
            if start_date.is_some() {
                entry.start_date = start_date;
            }
            if status == ReadingStatus::Read && end_date.is_some() {
                entry.end_date = end_date;
            }
        }
    }
}

fn advance(
    entry: &mut ReadingHistoryEntry,
    status: ReadingStatus,
    start_date: Option<String>,
    end_date: Option<String>,
    rating: Option<u8>,
    now: &str,
) {
    apply_status(entry, status, start_date, end_date);
    if rating.is_some() {
        entry.rating = rating;
    }
    entry.updated_at = now.to_string();
}

/// GET /api/reading-history
pub async fn list_history(state: &AppState, principal: &Principal) -> Result<Response<Body>, ApiError> {
    let entries = state.store.history_for_user(&principal.subject).await?;
    response::json(StatusCode::OK, &entries)
}

/// GET /api/reading-history/book/{bookId}
pub async fn history_for_book(
    state: &AppState,
    principal: &Principal,
    book_id: &str,
) -> Result<Response<Body>, ApiError> {
    let entry = state.store.find_history(&principal.subject, book_id).await?;
    response::json(StatusCode::OK, &entry)
}

/// POST /api/reading-history
pub async fn upsert_history(
    state: &AppState,
    principal: &Principal,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: UpsertHistoryRequest = serde_json::from_slice(body)?;

    let (book_id, status) = match (req.book_id.filter(|b| !b.is_empty()), req.status) {
        (Some(book_id), Some(status)) if !status.is_empty() => (book_id, status),
        _ => return Err(ApiError::BadRequest("bookId and status are required".to_string())),
    };
    let status: ReadingStatus = status
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid status".to_string()))?;
    let start_date = optional_date("startDate", req.start_date)?;
    let end_date = optional_date("endDate", req.end_date)?;
    let rating = req
        .rating
        .filter(|r| *r != 0)
        .map(star_rating)
        .transpose()?;

    let now = Utc::now().to_rfc3339();
    let mut entry = match state.store.find_history(&principal.subject, &book_id).await? {
        Some(existing) => existing,
        None => {
            let mut fresh = ReadingHistoryEntry {
                entry_id: Uuid::new_v4().to_string(),
                user_id: principal.subject.clone(),
                book_id,
                status,
                start_date: None,
                end_date: None,
                rating: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            };
            advance(&mut fresh, status, start_date.clone(), end_date.clone(), rating, &now);
            match state.store.insert_history(&fresh).await {
                Ok(()) => return response::json(StatusCode::CREATED, &fresh),
                // another post for the same pair committed first
                Err(StoreError::Conflict(_)) => state
                    .store
                    .find_history(&principal.subject, &fresh.book_id)
                    .await?
                    .ok_or_else(|| {
                        ApiError::PersistenceUnavailable("history guard without entry".to_string())
                    })?,
                Err(e) => return Err(e.into()),
            }
        }
    };

    advance(&mut entry, status, start_date, end_date, rating, &now);
    state.store.put_history(&entry).await?;
    response::json(StatusCode::CREATED, &entry)
}

/// DELETE /api/reading-history/{historyId}
pub async fn delete_history(
    state: &AppState,
    principal: &Principal,
    entry_id: &str,
) -> Result<Response<Body>, ApiError> {
    let entry = state
        .store
        .get_history(entry_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Entry not found".to_string()))?;

    if entry.user_id != principal.subject {
        return Err(ApiError::Forbidden);
    }

    state.store.delete_history(&entry).await?;
    response::message(StatusCode::OK, "Entry deleted")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ReadingHistoryEntry {
        ReadingHistoryEntry {
            entry_id: "h1".into(),
            user_id: "u1".into(),
            book_id: "b1".into(),
            status: ReadingStatus::ToRead,
            start_date: None,
            end_date: None,
            rating: Some(4),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(
            parse_date("startDate", "2024-03-01").unwrap(),
            "2024-03-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_date("startDate", "2024-03-01T10:00:00+02:00").unwrap(),
            "2024-03-01T08:00:00+00:00"
        );
        assert!(parse_date("startDate", "01/03/2024").is_err());
    }

    #[test]
    fn test_status_date_rules() {
        let mut e = entry();
        apply_status(&mut e, ReadingStatus::Reading, Some("s".into()), Some("x".into()));
        assert_eq!(e.start_date.as_deref(), Some("s"));
        assert_eq!(e.end_date, None);

        apply_status(&mut e, ReadingStatus::Read, None, Some("e".into()));
        assert_eq!(e.start_date.as_deref(), Some("s"));
        assert_eq!(e.end_date.as_deref(), Some("e"));

        apply_status(&mut e, ReadingStatus::ToRead, Some("s2".into()), None);
        assert_eq!(e.start_date, None);
        assert_eq!(e.end_date, None);
        assert_eq!(e.rating, Some(4));
    }
}
