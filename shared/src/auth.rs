use crate::identity::{LocalOverrideIdentity, OPERATOR_ACCESS_TOKEN};
use crate::session::{SessionOrigin, SessionState, SessionSync};
use crate::types::User;
use crate::{error_response, json_response};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub email: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i32,
    pub user: Option<User>,
}

type HmacSha256 = Hmac<Sha256>;

/// Compute the SECRET_HASH for Cognito authentication
pub fn compute_secret_hash(username: &str, client_id: &str, client_secret: &str) -> String {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    general_purpose::STANDARD.encode(result.into_bytes())
}

fn body_str(body: &Body) -> &str {
    match body {
        Body::Text(text) => text,
        Body::Binary(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
        Body::Empty => "",
    }
}

/// Map a Cognito login failure onto the message the frontend shows.
pub fn login_error_message(error_debug: &str) -> &'static str {
    if error_debug.contains("UserNotConfirmedException") {
        "Please confirm your email address before logging in. Check your inbox for a confirmation link."
    } else if error_debug.contains("NotAuthorizedException") {
        "Invalid email or password. Please try again."
    } else if error_debug.contains("UserNotFoundException") {
        "No account found with this email"
    } else if error_debug.contains("PasswordResetRequiredException") {
        "Password reset required"
    } else if error_debug.contains("TooManyRequestsException") {
        "Too many login attempts. Please try again later"
    } else {
        "Login failed. Please check your credentials"
    }
}

/// Map a Cognito signup failure onto the message the frontend shows.
pub fn signup_error_message(error_debug: &str) -> &'static str {
    if error_debug.contains("InvalidPasswordException") {
        "Password must contain at least 8 characters with uppercase, lowercase, number, and special character"
    } else if error_debug.contains("UsernameExistsException") {
        "An account with this email already exists"
    } else if error_debug.contains("InvalidParameterException") {
        "Invalid email or password format"
    } else {
        "Signup failed. Please check your details and try again."
    }
}

/// Handle login: the operator bypass pair is checked before the hosted
/// backend is consulted; everything else authenticates against Cognito.
pub async fn login(
    cognito_client: &CognitoClient,
    session: &SessionSync,
    override_identity: &LocalOverrideIdentity,
    client_id: &str,
    client_secret: &str,
    body: &Body,
) -> Result<Response<Body>, Error> {
    tracing::info!("Login request received");

    let login_request: LoginRequest = match serde_json::from_str(body_str(body)) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse request body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    // Operator bypass: a fixed local identity, never sent to the backend.
    if let Some(operator) = override_identity.authenticate(&login_request.email, &login_request.password) {
        tracing::info!("Operator bypass login");
        session.login(operator.clone(), SessionOrigin::LocalOverride, OPERATOR_ACCESS_TOKEN);
        let response = LoginResponse {
            id_token: String::new(),
            access_token: OPERATOR_ACCESS_TOKEN.to_string(),
            refresh_token: String::new(),
            expires_in: 0,
            user: Some(operator),
        };
        return json_response(StatusCode::OK, &response);
    }

    tracing::info!("Authenticating user: {}", login_request.email);

    let secret_hash = compute_secret_hash(&login_request.email, client_id, client_secret);

    let auth_result = cognito_client
        .initiate_auth()
        .auth_flow(aws_sdk_cognitoidentityprovider::types::AuthFlowType::UserPasswordAuth)
        .client_id(client_id)
        .auth_parameters("USERNAME", &login_request.email)
        .auth_parameters("PASSWORD", &login_request.password)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await;

    match auth_result {
        Ok(response) => {
            if let Some(auth_result) = response.authentication_result() {
                tracing::info!("Authentication successful for user: {}", login_request.email);

                let access_token = auth_result.access_token().unwrap_or_default().to_string();
                // Let the synchronizer derive and publish the profile for
                // this fresh session.
                let state = session.observe(&access_token).await;
                let user = state.current_user().map(|c| c.profile.clone());

                let login_response = LoginResponse {
                    id_token: auth_result.id_token().unwrap_or_default().to_string(),
                    access_token,
                    refresh_token: auth_result.refresh_token().unwrap_or_default().to_string(),
                    expires_in: auth_result.expires_in(),
                    user,
                };
                json_response(StatusCode::OK, &login_response)
            } else {
                tracing::error!("No authentication result returned");
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "AuthenticationFailed",
                    "No authentication result returned",
                )
            }
        }
        Err(e) => {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito authentication error: {}", error_message);
            error_response(
                StatusCode::UNAUTHORIZED,
                "AuthenticationFailed",
                login_error_message(&error_message),
            )
        }
    }
}

/// Handle signup: create the Cognito account with the default `user` role,
/// then mirror a profile row into the users table.
pub async fn signup(
    cognito_client: &CognitoClient,
    dynamo_client: &DynamoClient,
    table_name: &str,
    client_id: &str,
    client_secret: &str,
    body: &Body,
) -> Result<Response<Body>, Error> {
    tracing::info!("Signup request received");

    let signup_request: SignupRequest = match serde_json::from_str(body_str(body)) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse request body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    tracing::info!("Signing up user: {}", signup_request.email);

    let secret_hash = compute_secret_hash(&signup_request.email, client_id, client_secret);

    let signup_result = cognito_client
        .sign_up()
        .client_id(client_id)
        .username(&signup_request.email)
        .password(&signup_request.password)
        .secret_hash(&secret_hash)
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("email")
                .value(&signup_request.email)
                .build()?,
        )
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("name")
                .value(&signup_request.full_name)
                .build()?,
        )
        .user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("custom:role")
                .value("user")
                .build()?,
        )
        .send()
        .await;

    match signup_result {
        Ok(response) => {
            tracing::info!("Signup successful for user: {}", signup_request.email);

            // Mirror a profile row so the admin user list can see the
            // account before first login. Not fatal if it fails.
            let user_id = response.user_sub().to_string();
            if let Err(e) = crate::users::put_profile_row(
                dynamo_client,
                table_name,
                &user_id,
                &signup_request.email,
                &signup_request.full_name,
                "user",
            )
            .await
            {
                tracing::error!("Failed to mirror profile row for {}: {}", signup_request.email, e);
            }

            json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "message": "Signup successful. Please check your email to confirm your account."
                }),
            )
        }
        Err(e) => {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito signup error: {}", error_message);
            error_response(
                StatusCode::BAD_REQUEST,
                "SignupFailed",
                signup_error_message(&error_message),
            )
        }
    }
}

/// Exchange a refresh token for fresh session tokens.
pub async fn refresh_token(
    cognito_client: &CognitoClient,
    client_id: &str,
    client_secret: &str,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let refresh_request: RefreshRequest = match serde_json::from_str(body_str(body)) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse request body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    let secret_hash = compute_secret_hash(&refresh_request.email, client_id, client_secret);

    let auth_result = cognito_client
        .initiate_auth()
        .auth_flow(aws_sdk_cognitoidentityprovider::types::AuthFlowType::RefreshTokenAuth)
        .client_id(client_id)
        .auth_parameters("REFRESH_TOKEN", &refresh_request.refresh_token)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await;

    match auth_result {
        Ok(response) => {
            if let Some(auth_result) = response.authentication_result() {
                let login_response = LoginResponse {
                    id_token: auth_result.id_token().unwrap_or_default().to_string(),
                    access_token: auth_result.access_token().unwrap_or_default().to_string(),
                    // Cognito does not rotate the refresh token here.
                    refresh_token: refresh_request.refresh_token,
                    expires_in: auth_result.expires_in(),
                    user: None,
                };
                json_response(StatusCode::OK, &login_response)
            } else {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "RefreshFailed",
                    "No authentication result returned",
                )
            }
        }
        Err(e) => {
            tracing::error!("Cognito token refresh error: {:?}", e);
            error_response(
                StatusCode::UNAUTHORIZED,
                "RefreshFailed",
                "Session expired. Please log in again.",
            )
        }
    }
}

/// Explicit logout: clears the published user (bypass included), drops the
/// local mirror and invalidates the backend session best-effort.
pub async fn logout(session: &SessionSync) -> Result<Response<Body>, Error> {
    let redirect = session.logout().await;
    tracing::info!("User logged out");
    json_response(StatusCode::OK, &serde_json::json!({ "redirect": redirect }))
}

/// The frontend's startup session fetch: resolve the bearer token (if any)
/// and report the published user.
pub async fn current_session(
    session: &SessionSync,
    access_token: Option<&str>,
) -> Result<Response<Body>, Error> {
    let state = match access_token {
        Some(token) => session.observe(token).await,
        None => session.snapshot(),
    };

    match state {
        SessionState::SignedIn(current) => json_response(StatusCode::OK, &current.profile),
        SessionState::Loading => json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({ "status": "loading" }),
        ),
        SessionState::Unreachable => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "BackendUnreachable",
            "Could not reach the authentication backend",
        ),
        SessionState::SignedOut => error_response(
            StatusCode::UNAUTHORIZED,
            "NotAuthenticated",
            "No active session",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hash_is_deterministic() {
        let a = compute_secret_hash("asha@example.com", "client", "secret");
        let b = compute_secret_hash("asha@example.com", "client", "secret");
        assert_eq!(a, b);
        // Different user, different hash.
        let c = compute_secret_hash("other@example.com", "client", "secret");
        assert_ne!(a, c);
    }

    #[test]
    fn test_login_error_mapping() {
        assert!(login_error_message("NotAuthorizedException: nope").contains("Invalid email or password"));
        assert!(login_error_message("UserNotConfirmedException").contains("confirm your email"));
        assert!(login_error_message("weird").contains("Login failed"));
    }

    #[test]
    fn test_signup_error_mapping() {
        assert!(signup_error_message("UsernameExistsException").contains("already exists"));
        assert!(signup_error_message("InvalidPasswordException").contains("8 characters"));
        assert!(signup_error_message("weird").contains("Signup failed"));
    }
}
