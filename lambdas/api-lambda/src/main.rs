use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use lambda_http::{run, service_fn, tracing, Error, Request};
use portal_shared::{AppState, Config};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Initialize AWS clients once at startup
    let aws_config = aws_config::load_from_env().await;
    let state = AppState::new(
        CognitoClient::new(&aws_config),
        DynamoClient::new(&aws_config),
        S3Client::new(&aws_config),
        Config::from_env(),
    );

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
