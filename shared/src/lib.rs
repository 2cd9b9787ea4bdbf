pub mod auth;
pub mod avatars;
pub mod bookings;
pub mod destinations;
pub mod guard;
pub mod identity;
pub mod session;
pub mod store;
pub mod types;
pub mod users;

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use identity::{CognitoIdentity, IdentityProvider, LocalOverrideIdentity};
use lambda_http::{http::StatusCode, Body, Error, Response};
use session::SessionSync;
use store::{FileProfileStore, ProfileStore};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub cognito_client: CognitoClient,
    pub dynamo_client: DynamoClient,
    pub s3_client: S3Client,
    pub session: SessionSync,
    pub override_identity: Arc<LocalOverrideIdentity>,
}

impl AppState {
    pub fn new(
        cognito_client: CognitoClient,
        dynamo_client: DynamoClient,
        s3_client: S3Client,
    ) -> Arc<Self> {
        let store: Arc<dyn ProfileStore> = Arc::new(FileProfileStore::from_env());
        let override_identity = Arc::new(LocalOverrideIdentity::new(store.clone()));
        let providers: Vec<Arc<dyn IdentityProvider>> = vec![
            override_identity.clone(),
            Arc::new(CognitoIdentity::new(cognito_client.clone())),
        ];
        let session = SessionSync::new(providers, store);

        Arc::new(Self {
            cognito_client,
            dynamo_client,
            s3_client,
            session,
            override_identity,
        })
    }
}

pub fn table_name() -> String {
    std::env::var("TABLE_NAME").unwrap_or_else(|_| "somtravel".to_string())
}

/// JSON response with the CORS header every handler carries.
pub fn json_response<T: serde::Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(body)?.into())
        .map_err(Box::new)?)
}

/// Flat error envelope: logged at the call site, surfaced once to the user.
pub fn error_response(
    status: StatusCode,
    error: &str,
    message: &str,
) -> Result<Response<Body>, Error> {
    let envelope = types::ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
    };
    json_response(status, &envelope)
}
