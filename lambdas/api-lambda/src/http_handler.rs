use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use somtravel_shared::guard::{self, GuardDecision, RouteAccess, HOME_ROUTE, LOGIN_ROUTE};
use somtravel_shared::types::Role;
use somtravel_shared::{auth, avatars, bookings, destinations, users, AppState};
use std::env;
use std::sync::Arc;

/// Access each route demands. The guard consumes this together with the
/// published session state.
pub(crate) fn route_access(method: &Method, segments: &[&str]) -> RouteAccess {
    match (method, segments) {
        // Auth endpoints do their own credential handling.
        (_, ["auth", ..]) => RouteAccess::Public,

        // Browsing the catalogue is public; mutating it is the admin's.
        (&Method::GET, ["destinations", ..]) => RouteAccess::Public,
        (_, ["destinations", ..]) => RouteAccess::Role(Role::Admin),

        (&Method::POST, ["bookings"]) => RouteAccess::Authenticated,
        (&Method::GET, ["bookings", "me"]) => RouteAccess::Authenticated,
        (_, ["bookings", ..]) => RouteAccess::Role(Role::Admin),

        (_, ["users", "me", ..]) => RouteAccess::Authenticated,
        (_, ["users", ..]) => RouteAccess::Role(Role::Admin),

        // Anything else falls through to the 404 below.
        _ => RouteAccess::Public,
    }
}

fn bearer_token(event: &Request) -> Option<String> {
    event
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn preflight_response() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET,POST,PUT,PATCH,DELETE,OPTIONS",
        )
        .header("Access-Control-Allow-Headers", "Content-Type,Authorization")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

fn guard_response(decision: GuardDecision) -> Option<Result<Response<Body>, Error>> {
    match decision {
        GuardDecision::Render => None,
        GuardDecision::Placeholder => Some(
            somtravel_shared::json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &serde_json::json!({ "status": "loading" }),
            ),
        ),
        GuardDecision::RedirectToLogin => Some(somtravel_shared::json_response(
            StatusCode::UNAUTHORIZED,
            &serde_json::json!({
                "error": "NotAuthenticated",
                "message": "Please log in to continue",
                "redirect": LOGIN_ROUTE,
            }),
        )),
        GuardDecision::RedirectToHome => Some(somtravel_shared::json_response(
            StatusCode::FORBIDDEN,
            &serde_json::json!({
                "error": "Forbidden",
                "message": "This area needs a different role",
                "redirect": HOME_ROUTE,
            }),
        )),
    }
}

/// Main Lambda handler - routes requests through the route guard to the
/// auth, destination, booking and user endpoints.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("API request - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return preflight_response();
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let table_name = somtravel_shared::table_name();
    let token = bearer_token(&event);
    let body = event.body();

    // One navigation attempt: resolve the session for this token (the
    // synchronizer dedupes repeats), then let the guard decide.
    let session_state = match token.as_deref() {
        Some(token) => state.session.observe(token).await,
        None => state.session.snapshot(),
    };
    let access = route_access(&method, &segments);
    if let Some(response) = guard_response(guard::evaluate(&session_state, access)) {
        return response;
    }
    let current_user = session_state.current_user().map(|c| c.profile.clone());

    match (&method, segments.as_slice()) {
        // ---------- auth ----------
        (&Method::POST, ["auth", "login"]) => {
            let client_id = env::var("COGNITO_CLIENT_ID").expect("COGNITO_CLIENT_ID must be set");
            let client_secret =
                env::var("COGNITO_CLIENT_SECRET").expect("COGNITO_CLIENT_SECRET must be set");
            auth::login(
                &state.cognito_client,
                &state.session,
                &state.override_identity,
                &client_id,
                &client_secret,
                body,
            )
            .await
        }
        (&Method::POST, ["auth", "signup"]) => {
            let client_id = env::var("COGNITO_CLIENT_ID").expect("COGNITO_CLIENT_ID must be set");
            let client_secret =
                env::var("COGNITO_CLIENT_SECRET").expect("COGNITO_CLIENT_SECRET must be set");
            auth::signup(
                &state.cognito_client,
                &state.dynamo_client,
                &table_name,
                &client_id,
                &client_secret,
                body,
            )
            .await
        }
        (&Method::POST, ["auth", "refresh"]) => {
            let client_id = env::var("COGNITO_CLIENT_ID").expect("COGNITO_CLIENT_ID must be set");
            let client_secret =
                env::var("COGNITO_CLIENT_SECRET").expect("COGNITO_CLIENT_SECRET must be set");
            auth::refresh_token(&state.cognito_client, &client_id, &client_secret, body).await
        }
        (&Method::POST, ["auth", "logout"]) => auth::logout(&state.session).await,
        (&Method::GET, ["auth", "session"]) => {
            auth::current_session(&state.session, token.as_deref()).await
        }

        // ---------- destinations ----------
        (&Method::GET, ["destinations"]) => {
            destinations::list_destinations(&state.dynamo_client, &table_name).await
        }
        (&Method::GET, ["destinations", "search"]) => {
            let params = event.query_string_parameters();
            let query = params.first("q").unwrap_or("");
            destinations::search_destinations(&state.dynamo_client, &table_name, query).await
        }
        (&Method::GET, ["destinations", destination_id]) => {
            destinations::get_destination(&state.dynamo_client, &table_name, destination_id).await
        }
        (&Method::POST, ["destinations"]) => {
            destinations::create_destination(&state.dynamo_client, &table_name, body).await
        }
        (&Method::PUT, ["destinations", destination_id]) => {
            destinations::update_destination(&state.dynamo_client, &table_name, destination_id, body)
                .await
        }
        (&Method::DELETE, ["destinations", destination_id]) => {
            destinations::delete_destination(&state.dynamo_client, &table_name, destination_id).await
        }

        // ---------- bookings ----------
        (&Method::POST, ["bookings"]) => {
            let user = match current_user {
                Some(user) => user,
                None => {
                    return somtravel_shared::error_response(
                        StatusCode::UNAUTHORIZED,
                        "NotAuthenticated",
                        "No active session",
                    )
                }
            };
            bookings::create_booking(&state.dynamo_client, &table_name, &user, body).await
        }
        (&Method::GET, ["bookings", "me"]) => {
            let user = match current_user {
                Some(user) => user,
                None => {
                    return somtravel_shared::error_response(
                        StatusCode::UNAUTHORIZED,
                        "NotAuthenticated",
                        "No active session",
                    )
                }
            };
            bookings::list_user_bookings(&state.dynamo_client, &table_name, &user.id).await
        }
        (&Method::GET, ["bookings"]) => {
            bookings::list_all_bookings(&state.dynamo_client, &table_name).await
        }
        (&Method::PATCH, ["bookings", booking_id, "status"]) => {
            bookings::update_booking_status(&state.dynamo_client, &table_name, booking_id, body)
                .await
        }
        (&Method::DELETE, ["bookings", booking_id]) => {
            bookings::delete_booking(&state.dynamo_client, &table_name, booking_id).await
        }

        // ---------- users ----------
        (&Method::GET, ["users", "me"]) => {
            let user = match current_user {
                Some(user) => user,
                None => {
                    return somtravel_shared::error_response(
                        StatusCode::UNAUTHORIZED,
                        "NotAuthenticated",
                        "No active session",
                    )
                }
            };
            somtravel_shared::json_response(StatusCode::OK, &user)
        }
        (&Method::PATCH, ["users", "me"]) => {
            users::update_my_profile(
                &state.cognito_client,
                &state.dynamo_client,
                &table_name,
                &state.session,
                token.as_deref(),
                body,
            )
            .await
        }
        (&Method::POST, ["users", "me", "avatar"]) => {
            let user = match current_user {
                Some(user) => user,
                None => {
                    return somtravel_shared::error_response(
                        StatusCode::UNAUTHORIZED,
                        "NotAuthenticated",
                        "No active session",
                    )
                }
            };
            avatars::upload_avatar(&state.s3_client, &user.id, body).await
        }
        (&Method::GET, ["users"]) => users::list_users(&state.dynamo_client, &table_name).await,
        (&Method::POST, ["users"]) => {
            users::create_user(&state.dynamo_client, &table_name, body).await
        }
        (&Method::GET, ["users", user_id]) => {
            users::get_user(&state.dynamo_client, &table_name, user_id).await
        }
        (&Method::PATCH, ["users", user_id]) => {
            users::admin_update_user(&state.dynamo_client, &table_name, user_id, body).await
        }
        (&Method::DELETE, ["users", user_id]) => {
            users::delete_user(&state.dynamo_client, &table_name, user_id).await
        }

        _ => somtravel_shared::error_response(StatusCode::NOT_FOUND, "NotFound", "Not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_carries_cors_headers() {
        let response = preflight_response().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
        assert!(response
            .headers()
            .get("Access-Control-Allow-Methods")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("PATCH"));
    }

    #[test]
    fn test_route_access_table() {
        assert_eq!(
            route_access(&Method::POST, &["auth", "login"]),
            RouteAccess::Public
        );
        assert_eq!(
            route_access(&Method::GET, &["destinations"]),
            RouteAccess::Public
        );
        assert_eq!(
            route_access(&Method::GET, &["destinations", "abc"]),
            RouteAccess::Public
        );
        assert_eq!(
            route_access(&Method::POST, &["destinations"]),
            RouteAccess::Role(Role::Admin)
        );
        assert_eq!(
            route_access(&Method::DELETE, &["destinations", "abc"]),
            RouteAccess::Role(Role::Admin)
        );
        assert_eq!(
            route_access(&Method::POST, &["bookings"]),
            RouteAccess::Authenticated
        );
        assert_eq!(
            route_access(&Method::GET, &["bookings", "me"]),
            RouteAccess::Authenticated
        );
        assert_eq!(
            route_access(&Method::GET, &["bookings"]),
            RouteAccess::Role(Role::Admin)
        );
        assert_eq!(
            route_access(&Method::PATCH, &["bookings", "b-1", "status"]),
            RouteAccess::Role(Role::Admin)
        );
        assert_eq!(
            route_access(&Method::PATCH, &["users", "me"]),
            RouteAccess::Authenticated
        );
        assert_eq!(
            route_access(&Method::POST, &["users", "me", "avatar"]),
            RouteAccess::Authenticated
        );
        assert_eq!(
            route_access(&Method::GET, &["users"]),
            RouteAccess::Role(Role::Admin)
        );
        assert_eq!(
            route_access(&Method::DELETE, &["users", "u-1"]),
            RouteAccess::Role(Role::Admin)
        );
    }
}
