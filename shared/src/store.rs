use crate::session::SessionOrigin;
use crate::types::User;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Profile mirrored to local persistent storage, together with where it came
/// from, so a restored bypass session stays recognizable as one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredProfile {
    pub user: User,
    pub origin: SessionOrigin,
}

/// Read/write contract for the local profile mirror. The file-backed
/// implementation is the production one; tests substitute the in-memory one.
pub trait ProfileStore: Send + Sync {
    fn load(&self) -> Option<StoredProfile>;
    fn save(&self, profile: &StoredProfile);
    fn clear(&self);
}

/// JSON file in the writable scratch directory. Write failures are logged and
/// dropped; a file that no longer parses is deleted and treated as absent.
pub struct FileProfileStore {
    path: PathBuf,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location, overridable with PROFILE_CACHE_PATH.
    pub fn from_env() -> Self {
        let path = std::env::var("PROFILE_CACHE_PATH")
            .unwrap_or_else(|_| "/tmp/somtravel_user.json".to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self) -> Option<StoredProfile> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Discarding unreadable profile cache {}: {}", self.path.display(), e);
                self.clear();
                None
            }
        }
    }

    fn save(&self, profile: &StoredProfile) {
        let json = match serde_json::to_string(profile) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize profile cache: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::error!("Failed to write profile cache {}: {}", self.path.display(), e);
        }
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove profile cache {}: {}", self.path.display(), e);
            }
        }
    }
}

/// In-memory mirror for tests.
#[derive(Default)]
pub struct MemoryProfileStore {
    profile: Mutex<Option<StoredProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> Option<StoredProfile> {
        self.profile.lock().unwrap().clone()
    }

    fn save(&self, profile: &StoredProfile) {
        *self.profile.lock().unwrap() = Some(profile.clone());
    }

    fn clear(&self) {
        *self.profile.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn profile() -> StoredProfile {
        StoredProfile {
            user: User {
                id: "user-1".to_string(),
                full_name: "Asha Omar".to_string(),
                email: "asha@example.com".to_string(),
                role: Role::User,
                phone: Some("+252600000000".to_string()),
                avatar_url: None,
            },
            origin: SessionOrigin::Remote,
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("user.json"));

        assert!(store.load().is_none());
        store.save(&profile());
        assert_eq!(store.load(), Some(profile()));

        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_discards_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileProfileStore::new(&path);
        assert!(store.load().is_none());
        // The broken file is gone, not just ignored.
        assert!(!path.exists());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryProfileStore::new();
        assert!(store.load().is_none());
        store.save(&profile());
        assert_eq!(store.load(), Some(profile()));
        store.clear();
        assert!(store.load().is_none());
    }
}
