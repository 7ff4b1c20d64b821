pub mod types;
pub mod error;
pub mod config;
pub mod response;
pub mod store;
pub mod auth;
pub mod audit;
pub mod users;
pub mod books;
pub mod favorites;
pub mod reviews;
pub mod reading_history;

use audit::AuditRecorder;
use auth::{Pipeline, TokenService};
use config::Config;
use std::sync::Arc;
use store::Store;

/// Shared application state, built once per cold start
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub audit: AuditRecorder,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl_hours);
        let audit = AuditRecorder::new(Arc::clone(&store));
        Arc::new(Self {
            config,
            store,
            tokens,
            audit,
        })
    }

    /// Auth pipeline bound to this state's token service and store
    pub fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.tokens, self.store.as_ref())
    }
}
