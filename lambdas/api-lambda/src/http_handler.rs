use bookclub_shared::{
    auth::{self, Access, Admission, Principal, RequestContext},
    books, favorites, reading_history, response, reviews,
    error::ApiError,
    types::Role,
    users, AppState,
};
use lambda_http::{http::Method, Body, Error, Request, Response};
use std::sync::Arc;

/// A matched route with its path parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint<'a> {
    Register,
    Login,
    GetProfile,
    UpdateProfile,
    GenerateAvatar,
    ListAudit,
    ListUsers,
    CreateUser,
    UpdateUser(&'a str),
    DeleteUser(&'a str),
    ListBooks,
    GetBook(&'a str),
    CreateBook,
    UpdateBook(&'a str),
    DeleteBook(&'a str),
    ListFavorites,
    AddFavorite,
    RemoveFavorite(&'a str),
    ReviewsForBook(&'a str),
    ReviewsForUser(&'a str),
    UpsertReview,
    DeleteReview(&'a str),
    ListHistory,
    HistoryForBook(&'a str),
    UpsertHistory,
    DeleteHistory(&'a str),
}

impl<'a> Endpoint<'a> {
    fn resolve(method: &Method, parts: &[&'a str]) -> Option<Self> {
        use Endpoint::*;

        let endpoint = match (method, parts) {
            // --- AUTH & PROFILE ---
            (&Method::POST, ["auth", "register"]) => Register,
            (&Method::POST, ["auth", "login"]) => Login,
            (&Method::GET, ["auth", "profile"]) => GetProfile,
            (&Method::PUT, ["auth", "profile"]) => UpdateProfile,
            (&Method::POST, ["auth", "profile", "generate-avatar"]) => GenerateAvatar,

            // --- ADMIN ---
            (&Method::GET, ["auth", "audit"]) => ListAudit,
            (&Method::GET, ["auth", "users"]) => ListUsers,
            (&Method::POST, ["auth", "users"]) => CreateUser,
            (&Method::PUT, ["auth", "users", id]) => UpdateUser(*id),
            (&Method::DELETE, ["auth", "users", id]) => DeleteUser(*id),

            // --- BOOKS ---
            (&Method::GET, ["api", "books"]) => ListBooks,
            (&Method::GET, ["api", "books", id]) => GetBook(*id),
            (&Method::POST, ["api", "books"]) => CreateBook,
            (&Method::PUT, ["api", "books", id]) => UpdateBook(*id),
            (&Method::DELETE, ["api", "books", id]) => DeleteBook(*id),

            // --- FAVORITES ---
            (&Method::GET, ["api", "favorites"]) => ListFavorites,
            (&Method::POST, ["api", "favorites"]) => AddFavorite,
            (&Method::DELETE, ["api", "favorites", id]) => RemoveFavorite(*id),

            // --- REVIEWS ---
            (&Method::GET, ["api", "reviews", "book", id]) => ReviewsForBook(*id),
            (&Method::GET, ["api", "reviews", "user", id]) => ReviewsForUser(*id),
            (&Method::POST, ["api", "reviews"]) => UpsertReview,
            (&Method::DELETE, ["api", "reviews", id]) => DeleteReview(*id),

            // --- READING HISTORY ---
            (&Method::GET, ["api", "reading-history"]) => ListHistory,
            (&Method::GET, ["api", "reading-history", "book", id]) => HistoryForBook(*id),
            (&Method::POST, ["api", "reading-history"]) => UpsertHistory,
            (&Method::DELETE, ["api", "reading-history", id]) => DeleteHistory(*id),

            _ => return None,
        };
        Some(endpoint)
    }

    fn access(&self) -> Access {
        use Endpoint::*;

        match self {
            Register | Login | ListBooks | GetBook(_) | ReviewsForBook(_) | ReviewsForUser(_) => {
                Access::Public
            }
            GetProfile | UpdateProfile | GenerateAvatar | ListFavorites | AddFavorite
            | RemoveFavorite(_) => Access::Identity,
            ListAudit | ListUsers | CreateUser | UpdateUser(_) | DeleteUser(_) => {
                Access::Role(Role::Admin)
            }
            CreateBook | UpdateBook(_) | DeleteBook(_) => Access::Role(Role::Creator),
            UpsertReview | DeleteReview(_) | ListHistory | HistoryForBook(_) | UpsertHistory
            | DeleteHistory(_) => Access::Token,
        }
    }

    /// Audit action and target type for sensitive mutations
    fn mutation(&self) -> Option<(&'static str, &'static str)> {
        use Endpoint::*;

        match self {
            UpdateProfile => Some(("update_profile", "user")),
            GenerateAvatar => Some(("generate_avatar", "user")),
            CreateUser => Some(("create_user", "user")),
            UpdateUser(_) => Some(("update_user", "user")),
            DeleteUser(_) => Some(("delete_user", "user")),
            CreateBook => Some(("create_book", "book")),
            UpdateBook(_) => Some(("update_book", "book")),
            DeleteBook(_) => Some(("delete_book", "book")),
            _ => None,
        }
    }

    fn context(&self, event: &Request) -> RequestContext {
        let ctx = RequestContext::from_request(event, self.access());
        match self.mutation() {
            Some((action, target_type)) => ctx.with_mutation(action, target_type),
            None => ctx,
        }
    }
}

/// Main Lambda handler: route, run the auth pipeline, then the business logic
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    tracing::info!("Book club API invoked - Method: {} Path: {}", method, path);

    if *method == Method::OPTIONS {
        return Ok(response::cors_preflight().unwrap_or_else(ApiError::into_response));
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some(endpoint) = Endpoint::resolve(method, &parts) else {
        tracing::warn!("No route matched - Method: {} Path: {}", method, path);
        return Ok(response::not_found().unwrap_or_else(ApiError::into_response));
    };

    let ctx = endpoint.context(&event);
    let principal = match state.pipeline().admit(&ctx).await {
        Admission::Bypassed => None,
        Admission::Allowed(principal) => Some(principal),
        Admission::Rejected(err) => return Ok(err.into_response()),
    };

    let result = dispatch(endpoint, &state, &ctx, principal.as_ref(), event.body()).await;
    Ok(result.unwrap_or_else(|err| {
        if err.status().is_server_error() {
            tracing::error!("{} {} failed: {}", method, path, err);
        }
        err.into_response()
    }))
}

fn caller(principal: Option<&Principal>) -> Result<&Principal, ApiError> {
    principal.ok_or_else(|| ApiError::Internal("guarded route reached without a principal".to_string()))
}

async fn dispatch(
    endpoint: Endpoint<'_>,
    state: &AppState,
    ctx: &RequestContext,
    principal: Option<&Principal>,
    body: &[u8],
) -> Result<Response<Body>, ApiError> {
    use Endpoint::*;

    match endpoint {
        Register => auth::handlers::register(state, body).await,
        Login => auth::handlers::login(state, body).await,
        GetProfile => users::get_profile(caller(principal)?).await,
        UpdateProfile => users::update_profile(state, ctx, caller(principal)?, body).await,
        GenerateAvatar => users::generate_avatar(state, ctx, caller(principal)?).await,

        ListAudit => users::list_audit(state).await,
        ListUsers => users::list_users(state).await,
        CreateUser => users::create_user(state, ctx, caller(principal)?, body).await,
        UpdateUser(id) => users::update_user(state, ctx, caller(principal)?, id, body).await,
        DeleteUser(id) => users::delete_user(state, ctx, caller(principal)?, id).await,

        ListBooks => books::list_books(state).await,
        GetBook(id) => books::get_book(state, id).await,
        CreateBook => books::create_book(state, ctx, caller(principal)?, body).await,
        UpdateBook(id) => books::update_book(state, ctx, caller(principal)?, id, body).await,
        DeleteBook(id) => books::delete_book(state, ctx, caller(principal)?, id).await,

        ListFavorites => favorites::list_favorites(state, caller(principal)?).await,
        AddFavorite => favorites::add_favorite(state, caller(principal)?, body).await,
        RemoveFavorite(id) => favorites::remove_favorite(state, caller(principal)?, id).await,

        ReviewsForBook(id) => reviews::reviews_for_book(state, id).await,
        ReviewsForUser(id) => reviews::reviews_for_user(state, id).await,
        UpsertReview => reviews::upsert_review(state, caller(principal)?, body).await,
        DeleteReview(id) => reviews::delete_review(state, caller(principal)?, id).await,

        ListHistory => reading_history::list_history(state, caller(principal)?).await,
        HistoryForBook(id) => {
            reading_history::history_for_book(state, caller(principal)?, id).await
        }
        UpsertHistory => reading_history::upsert_history(state, caller(principal)?, body).await,
        DeleteHistory(id) => reading_history::delete_history(state, caller(principal)?, id).await,
    }
}
