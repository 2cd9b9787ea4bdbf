use crate::identity::{OPERATOR_EMAIL, OPERATOR_NAME, OPERATOR_USER_ID};
use crate::session::{SessionOrigin, SessionSync};
use crate::types::{AdminUpdateUserRequest, CreateUserRequest, Role, UpdateProfileRequest};
use crate::{error_response, json_response};
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;
use std::collections::HashMap;

fn user_pk(id: &str) -> String {
    format!("USER#{}", id)
}

/// Profile row as the admin user list sees it.
#[derive(Debug, Serialize, Clone)]
pub struct ProfileRecord {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

fn item_to_record(item: &HashMap<String, AttributeValue>) -> Option<ProfileRecord> {
    let id = item.get("id").and_then(|v| v.as_s().ok())?.to_string();
    Some(ProfileRecord {
        id,
        email: item.get("email").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        full_name: item.get("full_name").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        role: Role::parse(
            item.get("role").and_then(|v| v.as_s().ok()).map(|s| s.as_str()).unwrap_or(""),
        ),
        phone: item.get("phone").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        avatar_url: item.get("avatar_url").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        created_at: item.get("created_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
    })
}

/// Write the denormalized profile row that backs the admin user list.
pub async fn put_profile_row(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    email: &str,
    full_name: &str,
    role: &str,
) -> Result<(), Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let pk = user_pk(user_id);

    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("entity_type", AttributeValue::S("user".to_string()))
        .item("id", AttributeValue::S(user_id.to_string()))
        .item("email", AttributeValue::S(email.to_string()))
        .item("full_name", AttributeValue::S(full_name.to_string()))
        .item("role", AttributeValue::S(role.to_string()))
        .item("created_at", AttributeValue::S(now))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to write profile row for {}: {:?}", user_id, e);
            format!("Failed to write profile row: {}", e)
        })?;
    Ok(())
}

/// Partial profile update for the signed-in user. Published and mirrored
/// locally first; for remote identities the change is then pushed to the
/// auth store and the users table best-effort. The operator profile is
/// local-only by design.
pub async fn update_my_profile(
    cognito_client: &CognitoClient,
    dynamo_client: &DynamoClient,
    table_name: &str,
    session: &SessionSync,
    access_token: Option<&str>,
    body: &Body,
) -> Result<Response<Body>, Error> {
    let raw = match body {
        Body::Text(text) => text.as_str(),
        Body::Binary(bytes) => std::str::from_utf8(bytes).unwrap_or(""),
        Body::Empty => "",
    };
    let req: UpdateProfileRequest = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid profile payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    let origin = match session.snapshot().current_user() {
        Some(current) => current.origin,
        None => {
            return error_response(StatusCode::UNAUTHORIZED, "NotAuthenticated", "No active session")
        }
    };

    // Optimistic local update: visible immediately, mirror persisted.
    let updated = match session.update_local(&req) {
        Some(user) => user,
        None => {
            return error_response(StatusCode::UNAUTHORIZED, "NotAuthenticated", "No active session")
        }
    };

    if origin == SessionOrigin::LocalOverride {
        tracing::info!("Profile updated locally for the operator account");
        return json_response(StatusCode::OK, &updated);
    }

    // Best-effort push to the auth store.
    if let Some(token) = access_token {
        let mut attributes = Vec::new();
        if let Some(full_name) = &req.full_name {
            attributes.push(AttributeType::builder().name("name").value(full_name).build()?);
        }
        if let Some(phone) = &req.phone {
            attributes.push(AttributeType::builder().name("phone_number").value(phone).build()?);
        }
        if let Some(avatar_url) = &req.avatar_url {
            attributes.push(
                AttributeType::builder().name("custom:avatar_url").value(avatar_url).build()?,
            );
        }
        if !attributes.is_empty() {
            let result = cognito_client
                .update_user_attributes()
                .access_token(token)
                .set_user_attributes(Some(attributes))
                .send()
                .await;
            if let Err(e) = result {
                tracing::error!("Failed to push profile update to auth store: {:?}", e);
            }
        }
    }

    // And to the users table, also best-effort.
    let mut update_expr = vec![];
    let mut expr_values = HashMap::new();

    if let Some(full_name) = &req.full_name {
        update_expr.push("full_name = :full_name");
        expr_values.insert(":full_name".to_string(), AttributeValue::S(full_name.clone()));
    }
    if let Some(phone) = &req.phone {
        update_expr.push("phone = :phone");
        expr_values.insert(":phone".to_string(), AttributeValue::S(phone.clone()));
    }
    if let Some(avatar_url) = &req.avatar_url {
        update_expr.push("avatar_url = :avatar_url");
        expr_values.insert(":avatar_url".to_string(), AttributeValue::S(avatar_url.clone()));
    }

    if !update_expr.is_empty() {
        let pk = user_pk(&updated.id);
        let mut builder = dynamo_client
            .update_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .update_expression(format!("SET {}", update_expr.join(", ")));
        for (k, v) in expr_values {
            builder = builder.expression_attribute_values(k, v);
        }
        if let Err(e) = builder.send().await {
            tracing::error!("Failed to update users table for {}: {:?}", updated.id, e);
        }
    }

    json_response(StatusCode::OK, &updated)
}

/// List profile rows for the admin dashboard, newest first. The operator
/// account has no row; it is injected so the list matches reality.
pub async fn list_users(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Response<Body>, Error> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type")
        .expression_attribute_values(":type", AttributeValue::S("user".to_string()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to scan users: {:?}", e);
            format!("Failed to scan users: {}", e)
        })?;

    let mut users: Vec<ProfileRecord> = result.items().iter().filter_map(item_to_record).collect();
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if !users.iter().any(|u| u.email == OPERATOR_EMAIL) {
        users.insert(0, operator_record());
    }

    json_response(StatusCode::OK, &users)
}

fn operator_record() -> ProfileRecord {
    ProfileRecord {
        id: OPERATOR_USER_ID.to_string(),
        email: OPERATOR_EMAIL.to_string(),
        full_name: OPERATOR_NAME.to_string(),
        role: Role::Admin,
        phone: None,
        avatar_url: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Admin creation of a profile record. This does not create an auth account;
/// sign-up does that.
pub async fn create_user(
    client: &DynamoClient,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: CreateUserRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid user payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    let user_id = uuid::Uuid::new_v4().to_string();
    let role = req.role.as_deref().unwrap_or("user");
    put_profile_row(client, table_name, &user_id, &req.email, &req.full_name, role).await?;

    let record = ProfileRecord {
        id: user_id,
        email: req.email,
        full_name: req.full_name,
        role: Role::parse(role),
        phone: None,
        avatar_url: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::CREATED, &record)
}

/// Admin edit of a profile row (name and role).
pub async fn admin_update_user(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    if user_id == OPERATOR_USER_ID {
        return error_response(
            StatusCode::FORBIDDEN,
            "Forbidden",
            "The system admin account is local-only and cannot be edited here",
        );
    }

    let req: AdminUpdateUserRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid user payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    let mut update_expr = vec![];
    let mut expr_names = HashMap::new();
    let mut expr_values = HashMap::new();

    if let Some(full_name) = req.full_name {
        update_expr.push("full_name = :full_name");
        expr_values.insert(":full_name".to_string(), AttributeValue::S(full_name));
    }
    if let Some(role) = req.role {
        update_expr.push("#role = :role");
        expr_names.insert("#role".to_string(), "role".to_string());
        expr_values.insert(
            ":role".to_string(),
            AttributeValue::S(Role::parse(&role).as_str().to_string()),
        );
    }

    if !update_expr.is_empty() {
        let pk = user_pk(user_id);
        let mut builder = client
            .update_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .update_expression(format!("SET {}", update_expr.join(", ")));
        for (k, v) in expr_names {
            builder = builder.expression_attribute_names(k, v);
        }
        for (k, v) in expr_values {
            builder = builder.expression_attribute_values(k, v);
        }
        builder.send().await.map_err(|e| {
            tracing::error!("Failed to update user {}: {:?}", user_id, e);
            format!("Failed to update user: {}", e)
        })?;
    }

    get_user(client, table_name, user_id).await
}

/// Get a single profile row.
pub async fn get_user(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    if user_id == OPERATOR_USER_ID {
        return json_response(StatusCode::OK, &operator_record());
    }

    let pk = user_pk(user_id);
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to get user {}: {:?}", user_id, e);
            format!("Failed to get user: {}", e)
        })?;

    match result.item().and_then(item_to_record) {
        Some(record) => json_response(StatusCode::OK, &record),
        None => error_response(StatusCode::NOT_FOUND, "NotFound", "User not found"),
    }
}

/// Delete a profile row (admin). The operator account cannot be deleted.
pub async fn delete_user(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    if user_id == OPERATOR_USER_ID {
        return error_response(
            StatusCode::FORBIDDEN,
            "Forbidden",
            "Cannot delete the system admin account",
        );
    }

    let pk = user_pk(user_id);
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user {}: {:?}", user_id, e);
            format!("Failed to delete user: {}", e)
        })?;

    json_response(StatusCode::OK, &serde_json::json!({ "message": "User profile deleted" }))
}
