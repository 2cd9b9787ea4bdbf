use crate::identity::{IdentityError, IdentityProvider};
use crate::store::{ProfileStore, StoredProfile};
use crate::types::{UpdateProfileRequest, User};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Where the published identity came from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// Backed by the hosted auth backend.
    Remote,
    /// The local operator override; exists only in the profile cache.
    LocalOverride,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub profile: User,
    pub origin: SessionOrigin,
}

/// The single published session value. `Unreachable` is deliberately not the
/// same as `SignedOut`: the backend could not be asked, so we know nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    SignedOut,
    Unreachable,
    SignedIn(CurrentUser),
}

impl SessionState {
    pub fn current_user(&self) -> Option<&CurrentUser> {
        match self {
            SessionState::SignedIn(current) => Some(current),
            _ => None,
        }
    }
}

/// Auth-backend notifications the synchronizer subscribes to.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// The session (token) changed, or a duplicate notification for the one
    /// we already derived.
    SessionChanged { access_token: String },
    /// Explicit sign-out reported by the backend.
    SignedOut,
}

/// Keeps one current-user value in sync with the auth backend, the local
/// profile cache, and sign-out events, and publishes it over a watch channel.
pub struct SessionSync {
    providers: Vec<Arc<dyn IdentityProvider>>,
    store: Arc<dyn ProfileStore>,
    state: watch::Sender<SessionState>,
    /// Last session token a profile was derived from; duplicate
    /// notifications for this token are dropped without a network call.
    last_token: Mutex<Option<String>>,
}

impl SessionSync {
    /// `providers` are consulted in order; list the local override before the
    /// hosted backend.
    pub fn new(providers: Vec<Arc<dyn IdentityProvider>>, store: Arc<dyn ProfileStore>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            providers,
            store,
            state,
            last_token: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Startup reconciliation: derive from an existing backend session if one
    /// is on hand, otherwise fall back to the locally cached profile, else
    /// resolve to signed-out.
    pub async fn initialize(&self, access_token: Option<&str>) {
        if let Some(token) = access_token {
            self.derive_and_publish(token).await;
            if self.snapshot().current_user().is_some() {
                return;
            }
        }
        match self.store.load() {
            Some(stored) => {
                tracing::info!("Restored cached profile for {}", stored.user.email);
                if stored.origin == SessionOrigin::LocalOverride {
                    *self.last_token.lock().unwrap() =
                        Some(crate::identity::OPERATOR_ACCESS_TOKEN.to_string());
                }
                self.state.send_replace(SessionState::SignedIn(CurrentUser {
                    profile: stored.user,
                    origin: stored.origin,
                }));
            }
            None => {
                if self.snapshot() == SessionState::Loading {
                    self.state.send_replace(SessionState::SignedOut);
                }
            }
        }
    }

    pub async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SessionChanged { access_token } => {
                let duplicate = {
                    let last = self.last_token.lock().unwrap();
                    last.as_deref() == Some(access_token.as_str())
                };
                if duplicate {
                    // Same session as last time; the profile is already derived.
                    return;
                }
                self.derive_and_publish(&access_token).await;
            }
            AuthEvent::SignedOut => self.handle_sign_out(),
        }
    }

    /// Per-request entry point: duplicate tokens return the published state
    /// without touching the network.
    pub async fn observe(&self, access_token: &str) -> SessionState {
        let duplicate = {
            let last = self.last_token.lock().unwrap();
            last.as_deref() == Some(access_token)
        };
        if !duplicate {
            self.handle_event(AuthEvent::SessionChanged {
                access_token: access_token.to_string(),
            })
            .await;
        }
        self.snapshot()
    }

    /// Publish a user directly (login), mirror it locally and remember the
    /// session token for dedup.
    pub fn login(&self, user: User, origin: SessionOrigin, access_token: &str) {
        self.store.save(&StoredProfile {
            user: user.clone(),
            origin,
        });
        *self.last_token.lock().unwrap() = Some(access_token.to_string());
        self.state
            .send_replace(SessionState::SignedIn(CurrentUser { profile: user, origin }));
    }

    /// Explicit logout: invalidates the backend session best-effort and
    /// clears the published user (including a local-override one) plus the
    /// mirror. Returns the route to land on.
    pub async fn logout(&self) -> &'static str {
        let token = self.last_token.lock().unwrap().take();
        if let (Some(token), Some(current)) = (token, self.snapshot().current_user()) {
            for provider in &self.providers {
                if provider.origin() == current.origin {
                    let _ = provider.invalidate(&token).await;
                }
            }
        }
        self.store.clear();
        self.state.send_replace(SessionState::SignedOut);
        crate::guard::LOGIN_ROUTE
    }

    /// Re-derive the profile from the last observed token, bypassing the
    /// dedup guard (the profile itself may have changed behind the token).
    pub async fn refresh(&self) {
        let token = self.last_token.lock().unwrap().clone();
        if let Some(token) = token {
            self.derive_and_publish(&token).await;
        }
    }

    /// Optimistic partial update: published and mirrored immediately. The
    /// caller pushes the same change to the backend best-effort.
    pub fn update_local(&self, update: &UpdateProfileRequest) -> Option<User> {
        let mut current = self.snapshot().current_user().cloned()?;
        if let Some(full_name) = &update.full_name {
            current.profile.full_name = full_name.clone();
        }
        if let Some(phone) = &update.phone {
            current.profile.phone = Some(phone.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            current.profile.avatar_url = Some(avatar_url.clone());
        }
        self.store.save(&StoredProfile {
            user: current.profile.clone(),
            origin: current.origin,
        });
        let updated = current.profile.clone();
        self.state.send_replace(SessionState::SignedIn(current));
        Some(updated)
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<CurrentUser>, IdentityError> {
        for provider in &self.providers {
            if let Some(profile) = provider.resolve(token).await? {
                return Ok(Some(CurrentUser {
                    profile,
                    origin: provider.origin(),
                }));
            }
        }
        Ok(None)
    }

    async fn derive_and_publish(&self, token: &str) {
        match self.resolve_token(token).await {
            Ok(Some(current)) => {
                self.store.save(&StoredProfile {
                    user: current.profile.clone(),
                    origin: current.origin,
                });
                *self.last_token.lock().unwrap() = Some(token.to_string());
                self.state.send_replace(SessionState::SignedIn(current));
            }
            Ok(None) => {
                // No provider owns this token: the nearest thing to a
                // sign-out notification for whoever was published.
                tracing::info!("Session token not recognized by any identity provider");
                self.handle_sign_out();
            }
            Err(e) => {
                tracing::warn!("Session derivation failed: {}", e);
                // Keep a published user on transient failure; otherwise
                // surface that we could not ask, which is not "signed out".
                if self.snapshot().current_user().is_none() {
                    self.state.send_replace(SessionState::Unreachable);
                }
            }
        }
    }

    /// Backend sign-out semantics: a local-override session is not
    /// backend-tracked and survives; anything else is cleared everywhere.
    fn handle_sign_out(&self) {
        if let Some(current) = self.snapshot().current_user() {
            if current.origin == SessionOrigin::LocalOverride {
                tracing::debug!("Ignoring backend sign-out for local override session");
                return;
            }
        }
        *self.last_token.lock().unwrap() = None;
        self.store.clear();
        self.state.send_replace(SessionState::SignedOut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{LocalOverrideIdentity, OPERATOR_ACCESS_TOKEN, OPERATOR_EMAIL, OPERATOR_PASSWORD};
    use crate::store::MemoryProfileStore;
    use crate::types::Role;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn remote_user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            full_name: "Asha Omar".to_string(),
            email: "asha@example.com".to_string(),
            role,
            phone: None,
            avatar_url: None,
        }
    }

    /// Remote identity stub; counts how often a profile is actually derived.
    struct StubRemote {
        sessions: Mutex<HashMap<String, User>>,
        derivations: AtomicUsize,
        invalidations: AtomicUsize,
        unreachable: bool,
    }

    impl StubRemote {
        fn new(sessions: &[(&str, User)]) -> Arc<Self> {
            Arc::new(Self {
                sessions: Mutex::new(
                    sessions
                        .iter()
                        .map(|(t, u)| (t.to_string(), u.clone()))
                        .collect(),
                ),
                derivations: AtomicUsize::new(0),
                invalidations: AtomicUsize::new(0),
                unreachable: false,
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                sessions: Mutex::new(HashMap::new()),
                derivations: AtomicUsize::new(0),
                invalidations: AtomicUsize::new(0),
                unreachable: true,
            })
        }

        fn derivations(&self) -> usize {
            self.derivations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for StubRemote {
        fn origin(&self) -> SessionOrigin {
            SessionOrigin::Remote
        }

        async fn resolve(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
            self.derivations.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(IdentityError::Unreachable("connect timeout".to_string()));
            }
            Ok(self.sessions.lock().unwrap().get(access_token).cloned())
        }

        async fn invalidate(&self, _access_token: &str) -> Result<(), IdentityError> {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sync_with(
        remote: Arc<StubRemote>,
    ) -> (SessionSync, Arc<MemoryProfileStore>, Arc<LocalOverrideIdentity>) {
        let store = Arc::new(MemoryProfileStore::new());
        let override_identity = Arc::new(LocalOverrideIdentity::new(store.clone()));
        let providers: Vec<Arc<dyn IdentityProvider>> = vec![override_identity.clone(), remote];
        let sync = SessionSync::new(providers, store.clone());
        (sync, store, override_identity)
    }

    fn bypass_login(sync: &SessionSync, override_identity: &LocalOverrideIdentity) {
        let operator = override_identity
            .authenticate(OPERATOR_EMAIL, OPERATOR_PASSWORD)
            .unwrap();
        sync.login(operator, SessionOrigin::LocalOverride, OPERATOR_ACCESS_TOKEN);
    }

    #[tokio::test]
    async fn test_duplicate_notifications_derive_once() {
        let remote = StubRemote::new(&[("T1", remote_user("u-1", Role::User))]);
        let (sync, _store, _) = sync_with(remote.clone());

        sync.handle_event(AuthEvent::SessionChanged { access_token: "T1".to_string() }).await;
        sync.handle_event(AuthEvent::SessionChanged { access_token: "T1".to_string() }).await;

        assert_eq!(remote.derivations(), 1);
        let state = sync.snapshot();
        assert_eq!(state.current_user().map(|c| c.profile.id.as_str()), Some("u-1"));
    }

    #[tokio::test]
    async fn test_distinct_tokens_each_derive() {
        let remote = StubRemote::new(&[
            ("T1", remote_user("u-1", Role::User)),
            ("T2", remote_user("u-2", Role::User)),
        ]);
        let (sync, _store, _) = sync_with(remote.clone());

        sync.observe("T1").await;
        sync.observe("T1").await;
        sync.observe("T2").await;

        assert_eq!(remote.derivations(), 2);
        assert_eq!(
            sync.snapshot().current_user().map(|c| c.profile.id.clone()),
            Some("u-2".to_string())
        );
    }

    #[tokio::test]
    async fn test_backend_sign_out_preserves_bypass_identity() {
        let remote = StubRemote::new(&[]);
        let (sync, store, override_identity) = sync_with(remote);
        bypass_login(&sync, &override_identity);

        sync.handle_event(AuthEvent::SignedOut).await;

        let state = sync.snapshot();
        assert_eq!(
            state.current_user().map(|c| c.origin),
            Some(SessionOrigin::LocalOverride)
        );
        // The mirror survives too.
        assert!(store.load().is_some());
    }

    #[tokio::test]
    async fn test_backend_sign_out_clears_remote_identity() {
        let remote = StubRemote::new(&[("T1", remote_user("u-1", Role::User))]);
        let (sync, store, _) = sync_with(remote);

        sync.observe("T1").await;
        assert!(sync.snapshot().current_user().is_some());

        sync.handle_event(AuthEvent::SignedOut).await;

        assert_eq!(sync.snapshot(), SessionState::SignedOut);
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_initialize_without_session_or_cache_is_signed_out() {
        let remote = StubRemote::new(&[]);
        let (sync, _store, _) = sync_with(remote);

        assert_eq!(sync.snapshot(), SessionState::Loading);
        sync.initialize(None).await;
        assert_eq!(sync.snapshot(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn test_initialize_restores_cached_bypass_profile() {
        let remote = StubRemote::new(&[]);
        let (sync, _store, override_identity) = sync_with(remote.clone());
        bypass_login(&sync, &override_identity);

        // Fresh process over the same store.
        let store = sync.store.clone();
        let providers: Vec<Arc<dyn IdentityProvider>> = vec![
            Arc::new(LocalOverrideIdentity::new(store.clone())),
            remote,
        ];
        let sync2 = SessionSync::new(providers, store);
        sync2.initialize(None).await;

        assert_eq!(
            sync2.snapshot().current_user().map(|c| c.origin),
            Some(SessionOrigin::LocalOverride)
        );
    }

    #[tokio::test]
    async fn test_initialize_unreachable_backend_is_not_signed_out() {
        let remote = StubRemote::unreachable();
        let (sync, _store, _) = sync_with(remote);

        sync.initialize(Some("T1")).await;
        assert_eq!(sync.snapshot(), SessionState::Unreachable);
    }

    #[tokio::test]
    async fn test_unknown_token_clears_remote_but_not_bypass() {
        let remote = StubRemote::new(&[("T1", remote_user("u-1", Role::User))]);
        let (sync, _store, override_identity) = sync_with(remote.clone());

        sync.observe("T1").await;
        sync.observe("expired-token").await;
        assert_eq!(sync.snapshot(), SessionState::SignedOut);

        bypass_login(&sync, &override_identity);
        sync.observe("expired-token").await;
        assert_eq!(
            sync.snapshot().current_user().map(|c| c.origin),
            Some(SessionOrigin::LocalOverride)
        );
    }

    #[tokio::test]
    async fn test_explicit_logout_clears_even_bypass() {
        let remote = StubRemote::new(&[]);
        let (sync, store, override_identity) = sync_with(remote);
        bypass_login(&sync, &override_identity);

        let route = sync.logout().await;

        assert_eq!(route, crate::guard::LOGIN_ROUTE);
        assert_eq!(sync.snapshot(), SessionState::SignedOut);
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_logout_invalidates_remote_session() {
        let remote = StubRemote::new(&[("T1", remote_user("u-1", Role::User))]);
        let (sync, _store, _) = sync_with(remote.clone());

        sync.observe("T1").await;
        sync.logout().await;

        assert_eq!(remote.invalidations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_local_publishes_and_mirrors_immediately() {
        let remote = StubRemote::new(&[("T1", remote_user("u-1", Role::User))]);
        let (sync, store, _) = sync_with(remote);
        sync.observe("T1").await;

        let update = UpdateProfileRequest {
            avatar_url: Some("https://cdn.example.com/a.png".to_string()),
            ..Default::default()
        };
        let updated = sync.update_local(&update).unwrap();

        assert_eq!(updated.avatar_url.as_deref(), Some("https://cdn.example.com/a.png"));
        assert_eq!(
            store.load().unwrap().user.avatar_url.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }

    #[tokio::test]
    async fn test_refresh_rederives_behind_same_token() {
        let remote = StubRemote::new(&[("T1", remote_user("u-1", Role::User))]);
        let (sync, _store, _) = sync_with(remote.clone());
        sync.observe("T1").await;
        assert_eq!(remote.derivations(), 1);

        // Profile changed upstream behind the same session token.
        remote
            .sessions
            .lock()
            .unwrap()
            .insert("T1".to_string(), remote_user("u-1", Role::Admin));
        sync.refresh().await;

        assert_eq!(remote.derivations(), 2);
        assert_eq!(
            sync.snapshot().current_user().map(|c| c.profile.role),
            Some(Role::Admin)
        );
    }

    #[tokio::test]
    async fn test_watchers_see_each_publish() {
        let remote = StubRemote::new(&[("T1", remote_user("u-1", Role::User))]);
        let (sync, _store, _) = sync_with(remote);
        let mut rx = sync.subscribe();

        assert_eq!(*rx.borrow(), SessionState::Loading);
        sync.observe("T1").await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().current_user().is_some());
    }
}
