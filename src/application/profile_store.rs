use crate::domain::models::Profile;
use crate::domain::reconciliation::{ReconcileDecision, reconcile};
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::profile_repository::ProfileRepository;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

const COMPONENT: &str = "profile_store";

/// Owner of the locally held profile.
///
/// Readers get a cheap `Arc` snapshot or a watch subscription. Writes are
/// crate-private: [`ProfileSyncService`](crate::application::profile_sync::ProfileSyncService)
/// performs them together with the query cache reset and the sign-out
/// sequencing. Both write paths persist first and publish second, so a
/// subscriber never sees a profile that failed to reach disk.
pub struct ProfileStore {
    sender: watch::Sender<Option<Arc<Profile>>>,
    repository: Arc<dyn ProfileRepository>,
    write_guard: Mutex<()>,
    activity_log: Arc<ActivityLog>,
}

impl ProfileStore {
    /// Restores the last persisted profile, if any.
    pub fn load(repository: Arc<dyn ProfileRepository>) -> Result<Self, InfraError> {
        let initial = repository.load()?.map(Arc::new);
        let (sender, _) = watch::channel(initial);
        Ok(Self {
            sender,
            repository,
            write_guard: Mutex::new(()),
            activity_log: Arc::new(ActivityLog::disabled()),
        })
    }

    pub fn with_activity_log(mut self, activity_log: Arc<ActivityLog>) -> Self {
        self.activity_log = activity_log;
        self
    }

    pub fn current(&self) -> Option<Arc<Profile>> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Profile>>> {
        self.sender.subscribe()
    }

    /// Applies a server profile. On `Keep` nothing is written and the held
    /// `Arc` stays the same allocation, so subscribers are not woken.
    pub(crate) fn reconcile(&self, server: Profile) -> Result<ReconcileDecision, InfraError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("profile store lock poisoned: {error}")))?;

        let local = self.current();
        let decision = reconcile(&server, local.as_deref());
        let ReconcileDecision::Replace(reason) = decision else {
            return Ok(decision);
        };

        self.repository.save(&server)?;
        self.sender.send_replace(Some(Arc::new(server)));
        self.activity_log.info(
            COMPONENT,
            &format!("local profile replaced: {}", reason.as_str()),
        );
        Ok(decision)
    }

    /// Drops the local profile, e.g. on sign-out.
    pub(crate) fn clear(&self) -> Result<(), InfraError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("profile store lock poisoned: {error}")))?;
        self.repository.clear()?;
        self.sender.send_if_modified(|current| current.take().is_some());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reconciliation::ReplaceReason;
    use crate::infrastructure::profile_repository::InMemoryProfileRepository;
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn profile(status: &str, updated_at: &str, bio: &str) -> Profile {
        let mut fields = serde_json::Map::new();
        fields.insert("bio".to_string(), serde_json::Value::String(bio.to_string()));
        Profile {
            status: status.to_string(),
            updated_at: Some(fixed_time(updated_at)),
            fields,
        }
    }

    fn empty_store() -> (ProfileStore, Arc<InMemoryProfileRepository>) {
        let repository = Arc::new(InMemoryProfileRepository::default());
        let store = ProfileStore::load(repository.clone()).expect("load store");
        (store, repository)
    }

    #[test]
    fn first_server_profile_is_adopted_and_persisted() {
        let (store, repository) = empty_store();
        let server = profile("PENDING", "2026-02-01T10:00:00Z", "hello");

        let decision = store.reconcile(server.clone()).expect("reconcile");

        assert_eq!(decision, ReconcileDecision::Replace(ReplaceReason::NoLocalProfile));
        assert_eq!(store.current().as_deref(), Some(&server));
        assert_eq!(repository.load().expect("load"), Some(server));
    }

    #[test]
    fn keep_preserves_snapshot_identity() {
        let (store, _) = empty_store();
        store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z", "hello"))
            .expect("seed");
        let before = store.current().expect("profile present");
        let mut receiver = store.subscribe();
        receiver.mark_unchanged();

        let decision = store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z", "hello"))
            .expect("reconcile");

        assert_eq!(decision, ReconcileDecision::Keep);
        let after = store.current().expect("profile present");
        assert!(Arc::ptr_eq(&before, &after));
        assert!(!receiver.has_changed().expect("sender alive"));
    }

    #[test]
    fn status_change_replaces_even_with_older_timestamp() {
        let (store, _) = empty_store();
        store
            .reconcile(profile("PENDING", "2026-02-01T10:00:00Z", "hello"))
            .expect("seed");
        let mut receiver = store.subscribe();
        receiver.mark_unchanged();

        let decision = store
            .reconcile(profile("ACTIVE", "2026-01-01T10:00:00Z", "hello"))
            .expect("reconcile");

        assert_eq!(decision, ReconcileDecision::Replace(ReplaceReason::StatusChanged));
        assert!(receiver.has_changed().expect("sender alive"));
        assert_eq!(store.current().expect("profile").status, "ACTIVE");
    }

    #[test]
    fn persisted_profile_is_restored_on_load() {
        let repository = Arc::new(InMemoryProfileRepository::default());
        let saved = profile("ACTIVE", "2026-02-01T10:00:00Z", "restored");
        repository.save(&saved).expect("save");

        let store = ProfileStore::load(repository).expect("load");

        assert_eq!(store.current().as_deref(), Some(&saved));
    }

    #[test]
    fn clear_drops_local_and_persisted_profile() {
        let (store, repository) = empty_store();
        store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z", "hello"))
            .expect("seed");

        store.clear().expect("clear");

        assert!(store.current().is_none());
        assert!(repository.load().expect("load").is_none());
    }

    #[test]
    fn replacements_are_logged_with_their_reason() {
        let dir = std::env::temp_dir().join(format!("booking-core-profile-store-{}", std::process::id()));
        let log = Arc::new(ActivityLog::in_dir(&dir));
        let store = ProfileStore::load(Arc::new(InMemoryProfileRepository::default()))
            .expect("load")
            .with_activity_log(Arc::clone(&log));

        store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z", "hello"))
            .expect("reconcile");

        let contents = std::fs::read_to_string(log.path().expect("log path")).expect("read log");
        assert!(contents.contains("local profile replaced: no_local_profile"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
