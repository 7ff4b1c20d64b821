use aws_sdk_dynamodb::Client as DynamoClient;
use bookclub_shared::{config::Config, store::DynamoStore, AppState};
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;

    // Initialize AWS clients once at startup
    let aws_config = aws_config::load_from_env().await;
    let store = DynamoStore::new(DynamoClient::new(&aws_config), config.table_name.clone());

    tracing::info!("Starting book club API on table {}", config.table_name);
    let state = AppState::new(config, Arc::new(store));

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
