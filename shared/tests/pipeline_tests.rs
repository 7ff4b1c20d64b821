use std::sync::Arc;

use bookclub_shared::{
    auth::{Access, Admission, RequestContext, TokenService},
    config::Config,
    error::ApiError,
    store::{MemoryStore, Store},
    types::{Role, User},
    AppState,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

const SECRET: &str = "pipeline-secret";

fn user(id: &str, role: Role) -> User {
    User {
        user_id: id.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("{id}@bookclub.test"),
        password_hash: String::new(),
        address: None,
        city: None,
        state: None,
        role,
        favorites: vec![],
        avatar: None,
        created_at: "2024-01-01T00:00:00+00:00".to_string(),
    }
}

async fn setup() -> (Arc<MemoryStore>, Arc<AppState>) {
    let store = Arc::new(MemoryStore::new());
    for (id, role) in [("u1", Role::User), ("admin1", Role::Admin), ("c1", Role::Creator)] {
        store.insert_user(&user(id, role)).await.unwrap();
    }
    let state = AppState::new(Config::new(SECRET), store.clone());
    (store, state)
}

fn bearer(state: &AppState, subject: &str) -> Option<String> {
    Some(format!("Bearer {}", state.tokens.issue(subject).unwrap()))
}

fn rejection(admission: Admission) -> ApiError {
    match admission {
        Admission::Rejected(err) => err,
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_header_never_reaches_the_store() {
    let (store, state) = setup().await;

    for access in [Access::Token, Access::Identity, Access::Role(Role::Admin)] {
        let ctx = RequestContext::new(None, access);
        let err = rejection(state.pipeline().admit(&ctx).await);
        assert!(matches!(err, ApiError::MissingCredential));
        assert_eq!(err.status().as_u16(), 401);
    }
    assert_eq!(store.user_lookups(), 0);
}

#[tokio::test]
async fn test_foreign_signature_is_invalid_credential() {
    let (store, state) = setup().await;
    let foreign = TokenService::new("another-secret", 24).issue("admin1").unwrap();

    let ctx = RequestContext::new(Some(format!("Bearer {foreign}")), Access::Identity);
    let err = rejection(state.pipeline().admit(&ctx).await);

    assert!(matches!(err, ApiError::InvalidCredential));
    assert_eq!(err.status().as_u16(), 403);
    assert_eq!(store.user_lookups(), 0);
}

#[tokio::test]
async fn test_expired_token_is_invalid_credential() {
    let (_, state) = setup().await;
    let now = chrono::Utc::now().timestamp() as usize;
    let token = encode(
        &Header::default(),
        &json!({ "sub": "admin1", "iat": now - 120, "exp": now - 60 }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let ctx = RequestContext::new(Some(format!("Bearer {token}")), Access::Role(Role::Admin));
    let err = rejection(state.pipeline().admit(&ctx).await);
    assert!(matches!(err, ApiError::InvalidCredential));
}

#[tokio::test]
async fn test_token_access_skips_identity_loading() {
    let (store, state) = setup().await;

    let ctx = RequestContext::new(bearer(&state, "someone-deleted"), Access::Token);
    match state.pipeline().admit(&ctx).await {
        Admission::Allowed(principal) => {
            assert_eq!(principal.subject, "someone-deleted");
            assert!(principal.user().is_none());
        }
        other => panic!("expected admission, got {:?}", other),
    }
    assert_eq!(store.user_lookups(), 0);
}

#[tokio::test]
async fn test_unknown_subject_is_identity_not_found() {
    let (_, state) = setup().await;

    let ctx = RequestContext::new(bearer(&state, "ghost"), Access::Identity);
    let err = rejection(state.pipeline().admit(&ctx).await);

    assert!(matches!(err, ApiError::IdentityNotFound));
    assert_eq!(err.status().as_u16(), 404);
}

#[tokio::test]
async fn test_store_outage_is_persistence_unavailable() {
    let (store, state) = setup().await;
    store.set_unavailable(true);

    let ctx = RequestContext::new(bearer(&state, "u1"), Access::Identity);
    let err = rejection(state.pipeline().admit(&ctx).await);

    assert!(matches!(err, ApiError::PersistenceUnavailable(_)));
    assert_eq!(err.status().as_u16(), 500);
}

#[tokio::test]
async fn test_role_gate_is_exact_match() {
    let (_, state) = setup().await;
    let pipeline = state.pipeline();

    let cases = [
        ("u1", Role::Creator, false),
        ("admin1", Role::Creator, false),
        ("c1", Role::Admin, false),
        ("admin1", Role::Admin, true),
        ("c1", Role::Creator, true),
    ];

    for (subject, required, allowed) in cases {
        let ctx = RequestContext::new(bearer(&state, subject), Access::Role(required));
        match pipeline.admit(&ctx).await {
            Admission::Allowed(principal) => {
                assert!(allowed, "{subject} should not pass {required}");
                assert_eq!(principal.role(), Some(required));
                assert_eq!(principal.subject, subject);
            }
            Admission::Rejected(err) => {
                assert!(!allowed, "{subject} should pass {required}");
                assert!(matches!(err, ApiError::Forbidden));
            }
            Admission::Bypassed => panic!("guarded route bypassed"),
        }
    }
}

#[tokio::test]
async fn test_public_access_bypasses_everything() {
    let (store, state) = setup().await;

    for header in [None, Some("garbage".to_string()), bearer(&state, "ghost")] {
        let ctx = RequestContext::new(header, Access::Public);
        assert!(matches!(
            state.pipeline().admit(&ctx).await,
            Admission::Bypassed
        ));
    }
    assert_eq!(store.user_lookups(), 0);
}
