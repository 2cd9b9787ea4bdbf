use crate::{error_response, json_response};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use lambda_http::{http::StatusCode, Body, Error, Response};

const DEFAULT_BUCKET: &str = "somtravel-avatars";

#[derive(serde::Deserialize)]
pub struct UploadAvatarRequest {
    pub file_name: String,
    pub content_type: String,
    pub file_data: String, // base64 encoded
}

#[derive(serde::Serialize)]
pub struct UploadAvatarResponse {
    pub avatar_url: String,
}

pub fn bucket_name() -> String {
    std::env::var("AVATARS_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string())
}

/// Object key for a user's avatar: one folder per user, unique file name so
/// stale CDN copies never shadow a new upload.
pub fn avatar_key(user_id: &str, file_name: &str) -> String {
    let extension = file_name.split('.').last().unwrap_or("jpg");
    format!("{}/{}.{}", user_id, uuid::Uuid::new_v4(), extension)
}

pub fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{}.s3.amazonaws.com/{}", bucket, key)
}

/// Upload an avatar image and return its public URL. The caller persists the
/// URL through the profile update path.
pub async fn upload_avatar(
    s3_client: &S3Client,
    user_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let request: UploadAvatarRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid avatar payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    use base64::Engine;
    let file_bytes = match base64::engine::general_purpose::STANDARD.decode(&request.file_data) {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Failed to decode base64: {}", e),
            )
        }
    };

    let bucket = bucket_name();
    let key = avatar_key(user_id, &request.file_name);

    s3_client
        .put_object()
        .bucket(&bucket)
        .key(&key)
        .body(ByteStream::from(file_bytes))
        .content_type(&request.content_type)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to upload avatar for {}: {:?}", user_id, e);
            format!("Failed to upload avatar: {}", e)
        })?;

    let response = UploadAvatarResponse {
        avatar_url: public_url(&bucket, &key),
    };
    json_response(StatusCode::CREATED, &response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_key_keeps_extension_and_user_folder() {
        let key = avatar_key("u-42", "me.png");
        assert!(key.starts_with("u-42/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_avatar_keys_are_unique_per_upload() {
        assert_ne!(avatar_key("u-42", "me.png"), avatar_key("u-42", "me.png"));
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("somtravel-avatars", "u-1/a.png"),
            "https://somtravel-avatars.s3.amazonaws.com/u-1/a.png"
        );
    }
}
