use crate::session::SessionOrigin;
use crate::store::ProfileStore;
use crate::types::{Role, User};
use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use std::sync::Arc;

/// Hardcoded operator account. Not backed by the hosted auth system; it lives
/// only in the local profile cache.
pub const OPERATOR_EMAIL: &str = "maymashire177@gmail.com";
pub const OPERATOR_PASSWORD: &str = "112233";
pub const OPERATOR_USER_ID: &str = "admin-id";
pub const OPERATOR_NAME: &str = "System Admin";
/// Synthetic bearer token handed out on bypass login so the frontend keeps a
/// uniform token flow.
pub const OPERATOR_ACCESS_TOKEN: &str = "local-operator-session";

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The provider could not be asked at all. Distinct from "this token does
    /// not belong to a session", which resolve reports as `None`.
    #[error("identity backend unreachable: {0}")]
    Unreachable(String),
}

/// A source of user identity. The session synchronizer composes several of
/// these (local override first, then the hosted auth backend) behind one
/// interface instead of special-casing the bypass account inline.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn origin(&self) -> SessionOrigin;

    /// Resolve an access token to a profile. `Ok(None)` means the token does
    /// not belong to one of this provider's sessions; `Err(Unreachable)`
    /// means we could not find out.
    async fn resolve(&self, access_token: &str) -> Result<Option<User>, IdentityError>;

    /// Invalidate the session behind the token, best-effort.
    async fn invalidate(&self, access_token: &str) -> Result<(), IdentityError>;
}

// ========== HOSTED AUTH ==========

/// Identity backed by the Cognito user pool.
pub struct CognitoIdentity {
    client: CognitoClient,
}

impl CognitoIdentity {
    pub fn new(client: CognitoClient) -> Self {
        Self { client }
    }
}

/// Map the auth session's attributes onto our profile shape. The role rides
/// in `custom:role`, the avatar in `custom:avatar_url`; a missing role means
/// regular user.
pub fn profile_from_attributes(sub_fallback: &str, attributes: &[AttributeType]) -> User {
    let get = |name: &str| -> Option<String> {
        attributes
            .iter()
            .find(|a| a.name() == name)
            .and_then(|a| a.value())
            .map(|v| v.to_string())
    };

    User {
        id: get("sub").unwrap_or_else(|| sub_fallback.to_string()),
        full_name: get("name").unwrap_or_default(),
        email: get("email").unwrap_or_default(),
        role: Role::parse(get("custom:role").unwrap_or_default().as_str()),
        phone: get("phone_number").filter(|v| !v.is_empty()),
        avatar_url: get("custom:avatar_url").filter(|v| !v.is_empty()),
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentity {
    fn origin(&self) -> SessionOrigin {
        SessionOrigin::Remote
    }

    async fn resolve(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
        match self.client.get_user().access_token(access_token).send().await {
            Ok(output) => {
                let user = profile_from_attributes(output.username(), output.user_attributes());
                Ok(Some(user))
            }
            Err(e) => {
                let rejected = e
                    .as_service_error()
                    .map(|se| se.is_not_authorized_exception() || se.is_user_not_found_exception())
                    .unwrap_or(false);
                if rejected {
                    Ok(None)
                } else {
                    Err(IdentityError::Unreachable(format!("{:?}", e)))
                }
            }
        }
    }

    async fn invalidate(&self, access_token: &str) -> Result<(), IdentityError> {
        if let Err(e) = self
            .client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
        {
            tracing::warn!("global_sign_out failed: {:?}", e);
        }
        Ok(())
    }
}

// ========== LOCAL OVERRIDE ==========

/// The injectable bypass identity: a fixed credential pair mapped to a fixed
/// admin profile, resolved entirely offline. Profile edits made while signed
/// in this way are recovered from the local mirror.
pub struct LocalOverrideIdentity {
    store: Arc<dyn ProfileStore>,
}

impl LocalOverrideIdentity {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    fn base_profile(&self) -> User {
        User {
            id: OPERATOR_USER_ID.to_string(),
            full_name: OPERATOR_NAME.to_string(),
            email: OPERATOR_EMAIL.to_string(),
            role: Role::Admin,
            phone: None,
            avatar_url: None,
        }
    }

    fn current_profile(&self) -> User {
        match self.store.load() {
            Some(stored) if stored.origin == SessionOrigin::LocalOverride => stored.user,
            _ => self.base_profile(),
        }
    }

    /// Credential check used by the login endpoint before the hosted backend
    /// is consulted.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<User> {
        if email == OPERATOR_EMAIL && password == OPERATOR_PASSWORD {
            Some(self.current_profile())
        } else {
            None
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalOverrideIdentity {
    fn origin(&self) -> SessionOrigin {
        SessionOrigin::LocalOverride
    }

    async fn resolve(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
        if access_token == OPERATOR_ACCESS_TOKEN {
            Ok(Some(self.current_profile()))
        } else {
            Ok(None)
        }
    }

    async fn invalidate(&self, _access_token: &str) -> Result<(), IdentityError> {
        // Nothing to revoke; the session exists only locally.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryProfileStore, StoredProfile};

    #[tokio::test]
    async fn test_override_accepts_only_its_token() {
        let store = Arc::new(MemoryProfileStore::new());
        let identity = LocalOverrideIdentity::new(store);

        let hit = identity.resolve(OPERATOR_ACCESS_TOKEN).await.unwrap();
        assert_eq!(hit.as_ref().map(|u| u.id.as_str()), Some(OPERATOR_USER_ID));
        assert_eq!(hit.map(|u| u.role), Some(Role::Admin));

        assert!(identity.resolve("some-cognito-token").await.unwrap().is_none());
    }

    #[test]
    fn test_override_credential_check() {
        let store = Arc::new(MemoryProfileStore::new());
        let identity = LocalOverrideIdentity::new(store);

        assert!(identity.authenticate(OPERATOR_EMAIL, OPERATOR_PASSWORD).is_some());
        assert!(identity.authenticate(OPERATOR_EMAIL, "wrong").is_none());
        assert!(identity.authenticate("someone@example.com", OPERATOR_PASSWORD).is_none());
    }

    #[test]
    fn test_override_recovers_persisted_edits() {
        let store = Arc::new(MemoryProfileStore::new());
        let identity = LocalOverrideIdentity::new(store.clone());

        let mut edited = identity.base_profile();
        edited.avatar_url = Some("https://cdn.example.com/a.png".to_string());
        store.save(&StoredProfile {
            user: edited.clone(),
            origin: SessionOrigin::LocalOverride,
        });

        let restored = identity.authenticate(OPERATOR_EMAIL, OPERATOR_PASSWORD).unwrap();
        assert_eq!(restored.avatar_url, edited.avatar_url);
    }

    #[test]
    fn test_attribute_mapping() {
        let attrs = vec![
            AttributeType::builder().name("sub").value("u-42").build().unwrap(),
            AttributeType::builder().name("email").value("asha@example.com").build().unwrap(),
            AttributeType::builder().name("name").value("Asha Omar").build().unwrap(),
            AttributeType::builder().name("custom:role").value("admin").build().unwrap(),
            AttributeType::builder().name("phone_number").value("+252600000000").build().unwrap(),
        ];
        let user = profile_from_attributes("fallback", &attrs);
        assert_eq!(user.id, "u-42");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.phone.as_deref(), Some("+252600000000"));
        assert!(user.avatar_url.is_none());
    }
}
