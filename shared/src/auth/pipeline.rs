//! Per-request auth pipeline: verify → load → authorize.
//!
//! Each step runs only if the previous one succeeded and the route asked for
//! it. Nothing here outlives the request; the only shared state is the store.

use lambda_http::Request;

use super::identity::{authorize, load_identity};
use super::token::TokenService;
use crate::error::ApiError;
use crate::store::Store;
use crate::types::{Role, User};

/// What a route requires before its business logic runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Pipeline bypassed entirely, even if a header is present
    Public,
    /// Valid token only; the principal carries the subject id
    Token,
    /// Valid token whose subject resolves to a stored user
    Identity,
    /// As `Identity`, plus an exact role match
    Role(Role),
}

/// Audit tag for routes that mutate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    pub action: &'static str,
    pub target_type: &'static str,
}

/// Everything the pipeline reads from a request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub raw_auth_header: Option<String>,
    pub access: Access,
    pub mutation: Option<Mutation>,
}

impl RequestContext {
    pub fn new(raw_auth_header: Option<String>, access: Access) -> Self {
        Self {
            raw_auth_header,
            access,
            mutation: None,
        }
    }

    /// Capture the `Authorization` header of an incoming request
    pub fn from_request(event: &Request, access: Access) -> Self {
        let raw = event
            .headers()
            .get("Authorization")
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        Self::new(raw, access)
    }

    pub fn with_mutation(mut self, action: &'static str, target_type: &'static str) -> Self {
        self.mutation = Some(Mutation {
            action,
            target_type,
        });
        self
    }
}

/// The authenticated caller for one request
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    user: Option<User>,
}

impl Principal {
    fn token_only(subject: String) -> Self {
        Self {
            subject,
            user: None,
        }
    }

    fn loaded(subject: String, user: User) -> Self {
        Self {
            subject,
            user: Some(user),
        }
    }

    /// The user record loaded by the pipeline, if the route required one
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Same role the gate compared against; never re-fetched
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    /// Loaded user, for handlers mounted behind `Identity` or `Role`
    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user
            .as_ref()
            .ok_or_else(|| ApiError::Internal("route requires a loaded identity".to_string()))
    }
}

/// Terminal state of the pipeline
#[derive(Debug)]
pub enum Admission {
    /// Public route: nothing was checked
    Bypassed,
    Allowed(Principal),
    Rejected(ApiError),
}

pub struct Pipeline<'a> {
    tokens: &'a TokenService,
    store: &'a dyn Store,
}

impl<'a> Pipeline<'a> {
    pub fn new(tokens: &'a TokenService, store: &'a dyn Store) -> Self {
        Self { tokens, store }
    }

    pub async fn admit(&self, ctx: &RequestContext) -> Admission {
        if ctx.access == Access::Public {
            return Admission::Bypassed;
        }
        match self.run(ctx).await {
            Ok(principal) => Admission::Allowed(principal),
            Err(err) => {
                tracing::warn!(kind = err.kind(), access = ?ctx.access, "Request rejected");
                Admission::Rejected(err)
            }
        }
    }

    async fn run(&self, ctx: &RequestContext) -> Result<Principal, ApiError> {
        let subject = self.tokens.verify(ctx.raw_auth_header.as_deref())?;

        let required = match ctx.access {
            Access::Public | Access::Token => return Ok(Principal::token_only(subject)),
            Access::Identity => None,
            Access::Role(role) => Some(role),
        };

        let user = load_identity(self.store, &subject).await?;
        if let Some(role) = required {
            authorize(&user, role)?;
        }
        Ok(Principal::loaded(subject, user))
    }
}
