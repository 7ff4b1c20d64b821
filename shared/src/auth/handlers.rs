use lambda_http::{http::StatusCode, Body, Response};

use super::password::{hash_password, verify_password};
use crate::error::{ApiError, FieldError};
use crate::response;
use crate::types::{LoginRequest, RegisterRequest, TokenResponse, User};
use crate::AppState;

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

/// Loose shape check: one `@`, non-empty local part, dotted domain, no spaces
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Field checks shared by self-registration and admin user creation
pub(crate) fn validate_new_user(
    first_name: &str,
    last_name: &str,
    email: &str,
    password: &str,
) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if first_name.trim().is_empty() {
        errors.push(FieldError::new("firstName", "First name required"));
    }
    if last_name.trim().is_empty() {
        errors.push(FieldError::new("lastName", "Last name required"));
    }
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Invalid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new("password", "Password too short"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// POST /auth/register
pub async fn register(state: &AppState, body: &[u8]) -> Result<Response<Body>, ApiError> {
    tracing::info!("Register request received");

    let req: RegisterRequest = serde_json::from_slice(body)?;
    validate_new_user(&req.first_name, &req.last_name, &req.email, &req.password)?;

    if state.store.find_user_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already in use".to_string()));
    }

    let user = User {
        user_id: uuid::Uuid::new_v4().to_string(),
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        password_hash: hash_password(&req.password)?,
        address: req.address,
        city: req.city,
        state: req.state,
        role: req.role.unwrap_or_default(),
        favorites: Vec::new(),
        avatar: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    state.store.insert_user(&user).await?;

    tracing::info!("User registered: {}", user.user_id);

    let token = state.tokens.issue(&user.user_id)?;
    response::json(
        StatusCode::CREATED,
        &TokenResponse {
            message: Some("Account created".to_string()),
            token,
            role: user.role,
        },
    )
}

/// POST /auth/login
pub async fn login(state: &AppState, body: &[u8]) -> Result<Response<Body>, ApiError> {
    let req: LoginRequest = serde_json::from_slice(body)?;

    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::info!("Login rejected for user {}", user.user_id);
        return Err(ApiError::BadRequest("Incorrect password".to_string()));
    }

    let token = state.tokens.issue(&user.user_id)?;
    response::json(
        StatusCode::OK,
        &TokenResponse {
            message: None,
            token,
            role: user.role,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("jean@dupont.fr"));
        assert!(!is_valid_email("jean.dupont.fr"));
        assert!(!is_valid_email("@dupont.fr"));
        assert!(!is_valid_email("jean@dupont"));
        assert!(!is_valid_email("jean@.fr"));
        assert!(!is_valid_email("jean @dupont.fr"));
        assert!(!is_valid_email("a@b@c.fr"));
    }

    #[test]
    fn test_validate_new_user_collects_every_field() {
        match validate_new_user("", " ", "nope", "123") {
            Err(ApiError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["firstName", "lastName", "email", "password"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(validate_new_user("Jean", "Dupont", "j@d.fr", "secret").is_ok());
    }
}
