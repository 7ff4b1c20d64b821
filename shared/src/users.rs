use base64::{engine::general_purpose, Engine as _};
use lambda_http::{http::StatusCode, Body, Response};
use serde_json::{json, Map, Value};

use crate::auth::handlers::{is_valid_email, validate_new_user, MIN_PASSWORD_LEN};
use crate::auth::password::hash_password;
use crate::auth::{Principal, RequestContext};
use crate::error::{ApiError, FieldError};
use crate::response;
use crate::types::{
    AdminCreateUserRequest, AdminUpdateUserRequest, UpdateProfileRequest, User,
};
use crate::AppState;

fn set_text(changes: &mut Map<String, Value>, key: &str, field: &mut String, value: Option<String>) {
    if let Some(v) = value {
        changes.insert(key.to_string(), Value::String(v.clone()));
        *field = v;
    }
}

fn set_opt_text(
    changes: &mut Map<String, Value>,
    key: &str,
    field: &mut Option<String>,
    value: Option<String>,
) {
    if let Some(v) = value {
        changes.insert(key.to_string(), Value::String(v.clone()));
        *field = Some(v);
    }
}

fn check_email(email: &Option<String>) -> Result<(), ApiError> {
    match email {
        Some(e) if !is_valid_email(e) => Err(ApiError::Validation(vec![FieldError::new(
            "email",
            "Invalid email",
        )])),
        _ => Ok(()),
    }
}

/// Rehash a new password. The change is logged as a flag, never the value.
fn set_password(
    changes: &mut Map<String, Value>,
    user: &mut User,
    password: Option<String>,
) -> Result<(), ApiError> {
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(vec![FieldError::new(
                "password",
                "Password too short",
            )]));
        }
        user.password_hash = hash_password(&password)?;
        changes.insert("passwordChanged".to_string(), Value::Bool(true));
    }
    Ok(())
}

// ========== PROFILE ==========

/// GET /auth/profile
pub async fn get_profile(principal: &Principal) -> Result<Response<Body>, ApiError> {
    response::json(StatusCode::OK, principal.require_user()?)
}

/// PUT /auth/profile
pub async fn update_profile(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: UpdateProfileRequest = serde_json::from_slice(body)?;
    check_email(&req.email)?;

    let current = principal.require_user()?;
    let mut user = current.clone();
    let mut changes = Map::new();

    set_text(&mut changes, "firstName", &mut user.first_name, req.first_name);
    set_text(&mut changes, "lastName", &mut user.last_name, req.last_name);
    set_text(&mut changes, "email", &mut user.email, req.email);
    set_opt_text(&mut changes, "address", &mut user.address, req.address);
    set_opt_text(&mut changes, "city", &mut user.city, req.city);
    set_opt_text(&mut changes, "state", &mut user.state, req.state);
    set_password(&mut changes, &mut user, req.password)?;

    state.store.update_user(&user, &current.email).await?;

    state
        .audit
        .record_mutation(ctx, principal, &user.user_id, json!({ "changes": changes }))
        .await;

    response::json(
        StatusCode::OK,
        &json!({ "message": "Profile updated", "user": user }),
    )
}

fn initials(user: &User) -> String {
    let letters: String = user
        .first_name
        .chars()
        .take(1)
        .chain(user.last_name.chars().take(1))
        .collect::<String>()
        .to_uppercase();
    if letters.is_empty() {
        "U".to_string()
    } else {
        letters
    }
}

fn avatar_data_url(initials: &str) -> String {
    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='256' height='256'>\
<rect width='100%' height='100%' fill='#f8d7e0'/>\
<text x='50%' y='50%' dy='.07em' font-family='Arial, Helvetica, sans-serif' font-size='96' \
font-weight='700' text-anchor='middle' fill='#6b4754'>{}</text></svg>",
        initials
    );
    format!(
        "data:image/svg+xml;base64,{}",
        general_purpose::STANDARD.encode(svg.as_bytes())
    )
}

/// POST /auth/profile/generate-avatar
pub async fn generate_avatar(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
) -> Result<Response<Body>, ApiError> {
    let current = principal.require_user()?;
    let initials = initials(current);

    let mut user = current.clone();
    user.avatar = Some(avatar_data_url(&initials));
    state.store.update_user(&user, &current.email).await?;

    state
        .audit
        .record_mutation(ctx, principal, &user.user_id, json!({ "initials": initials }))
        .await;

    response::json(
        StatusCode::OK,
        &json!({ "message": "Avatar generated", "avatar": user.avatar }),
    )
}

// ========== ADMIN ==========

/// GET /auth/audit
pub async fn list_audit(state: &AppState) -> Result<Response<Body>, ApiError> {
    let entries = state
        .store
        .recent_audit_entries(state.config.audit_query_limit)
        .await?;
    response::json(StatusCode::OK, &entries)
}

/// GET /auth/users
pub async fn list_users(state: &AppState) -> Result<Response<Body>, ApiError> {
    let users = state.store.list_users().await?;
    response::json(StatusCode::OK, &users)
}

/// POST /auth/users
pub async fn create_user(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: AdminCreateUserRequest = serde_json::from_slice(body)?;
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
        address: None,
        city: None,
        state: None,
        role: req.role,
        favorites: Vec::new(),
        avatar: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    state.store.insert_user(&user).await?;

    state
        .audit
        .record_mutation(
            ctx,
            principal,
            &user.user_id,
            json!({ "email": user.email, "role": user.role }),
        )
        .await;

    response::json(StatusCode::CREATED, &json!({ "user": user }))
}

/// PUT /auth/users/{id}
pub async fn update_user(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
    target_id: &str,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    let req: AdminUpdateUserRequest = serde_json::from_slice(body)?;
    check_email(&req.email)?;

    let current = state
        .store
        .find_user_by_id(target_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut user = current.clone();
    let mut changes = Map::new();
    set_text(&mut changes, "firstName", &mut user.first_name, req.first_name);
    set_text(&mut changes, "lastName", &mut user.last_name, req.last_name);
    set_text(&mut changes, "email", &mut user.email, req.email);
    if let Some(role) = req.role {
        changes.insert("role".to_string(), Value::String(role.as_str().to_string()));
        user.role = role;
    }
    set_password(&mut changes, &mut user, req.password)?;

    state.store.update_user(&user, &current.email).await?;

    state
        .audit
        .record_mutation(ctx, principal, &user.user_id, json!({ "changes": changes }))
        .await;

    response::json(
        StatusCode::OK,
        &json!({ "message": "User updated", "user": user }),
    )
}

/// DELETE /auth/users/{id}
pub async fn delete_user(
    state: &AppState,
    ctx: &RequestContext,
    principal: &Principal,
    target_id: &str,
) -> Result<Response<Body>, ApiError> {
    let target = state
        .store
        .find_user_by_id(target_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    state.store.delete_user(&target).await?;
    tracing::info!("User {} deleted by {}", target.user_id, principal.subject);

    state
        .audit
        .record_mutation(ctx, principal, &target.user_id, json!({ "email": target.email }))
        .await;

    response::message(StatusCode::OK, "User deleted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn named(first: &str, last: &str) -> User {
        User {
            user_id: "u1".into(),
            first_name: first.into(),
            last_name: last.into(),
            email: "x@y.z".into(),
            password_hash: String::new(),
            address: None,
            city: None,
            state: None,
            role: Role::User,
            favorites: vec![],
            avatar: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials(&named("jean", "dupont")), "JD");
        assert_eq!(initials(&named("", "dupont")), "D");
        assert_eq!(initials(&named("", "")), "U");
    }

    #[test]
    fn test_avatar_is_base64_svg() {
        let url = avatar_data_url("JD");
        let encoded = url.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(general_purpose::STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(">JD</text>"));
    }

    #[test]
    fn test_password_change_is_flagged_not_recorded() {
        let mut user = named("a", "b");
        let mut changes = Map::new();
        set_password(&mut changes, &mut user, Some("new-secret".into())).unwrap();
        assert_eq!(changes["passwordChanged"], Value::Bool(true));
        assert!(!Value::Object(changes).to_string().contains("new-secret"));
        assert!(user.password_hash.starts_with("$argon2"));
    }
}
