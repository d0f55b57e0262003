pub mod admin;
pub mod auth;
pub mod error;
pub mod guard;
pub mod http;
pub mod jobs;
pub mod policy;
pub mod profiles;
pub mod storage;
pub mod types;

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

/// Environment-derived configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub files_bucket: String,
    pub cognito_client_id: String,
    pub cognito_client_secret: String,
    pub cognito_user_pool_id: String,
    pub signed_url_ttl_secs: u64,
    pub notes_max_len: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            table_name: std::env::var("TABLE_NAME").unwrap_or_else(|_| "scc-portal".to_string()),
            files_bucket: std::env::var("FILES_BUCKET")
                .unwrap_or_else(|_| "scc-print-files".to_string()),
            cognito_client_id: std::env::var("COGNITO_CLIENT_ID")
                .expect("COGNITO_CLIENT_ID must be set"),
            cognito_client_secret: std::env::var("COGNITO_CLIENT_SECRET")
                .expect("COGNITO_CLIENT_SECRET must be set"),
            cognito_user_pool_id: std::env::var("COGNITO_USER_POOL_ID")
                .expect("COGNITO_USER_POOL_ID must be set"),
            signed_url_ttl_secs: std::env::var("SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            notes_max_len: std::env::var("NOTES_MAX_LEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub cognito_client: CognitoClient,
    pub dynamo_client: DynamoClient,
    pub s3_client: S3Client,
    pub config: Config,
}

impl AppState {
    pub fn new(
        cognito_client: CognitoClient,
        dynamo_client: DynamoClient,
        s3_client: S3Client,
        config: Config,
    ) -> Arc<Self> {
        Arc::new(Self {
            cognito_client,
            dynamo_client,
            s3_client,
            config,
        })
    }
}
