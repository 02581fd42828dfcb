use crate::application::profile_store::ProfileStore;
use crate::domain::reconciliation::ReconcileDecision;
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::api_client::ProfileApiClient;
use crate::infrastructure::connectivity::ConnectivityGate;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::QueryCache;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const COMPONENT: &str = "profile_sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "decision", rename_all = "snake_case")]
pub enum SyncOutcome {
    Applied(ReconcileDecision),
    /// The server has no profile for this account; local state is untouched.
    NoServerProfile,
    /// A later fetch already landed; this response was dropped.
    Stale,
}

pub struct ProfileSyncService<P, Q>
where
    P: ProfileApiClient,
    Q: QueryCache,
{
    api_client: Arc<P>,
    store: Arc<ProfileStore>,
    cache: Arc<Q>,
    gate: ConnectivityGate,
    issued: AtomicU64,
    last_applied: Mutex<u64>,
    activity_log: Arc<ActivityLog>,
}

impl<P, Q> ProfileSyncService<P, Q>
where
    P: ProfileApiClient,
    Q: QueryCache,
{
    pub fn new(
        api_client: Arc<P>,
        store: Arc<ProfileStore>,
        cache: Arc<Q>,
        gate: ConnectivityGate,
    ) -> Self {
        Self {
            api_client,
            store,
            cache,
            gate,
            issued: AtomicU64::new(0),
            last_applied: Mutex::new(0),
            activity_log: Arc::new(ActivityLog::disabled()),
        }
    }

    pub fn with_activity_log(mut self, activity_log: Arc<ActivityLog>) -> Self {
        self.activity_log = activity_log;
        self
    }

    /// Fetches the server profile once and reconciles it into the store.
    ///
    /// Responses are applied in issue order: a response whose sequence
    /// number is below the last applied one is reported as `Stale`.
    pub async fn sync_once(&self) -> Result<SyncOutcome, InfraError> {
        if !self.gate.is_online() {
            return Err(InfraError::Offline);
        }

        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let response = self.api_client.fetch_provider_profile().await?;

        let mut last_applied = self.lock_last_applied()?;
        if sequence < *last_applied {
            self.activity_log.info(
                COMPONENT,
                &format!("discarded stale profile response seq={sequence} last_applied={}", *last_applied),
            );
            return Ok(SyncOutcome::Stale);
        }
        *last_applied = sequence;

        let Some(profile) = response.into_profile() else {
            return Ok(SyncOutcome::NoServerProfile);
        };

        let decision = self.store.reconcile(profile)?;
        match decision {
            ReconcileDecision::Replace(_) => self.cache.clear()?,
            ReconcileDecision::Keep => {
                self.activity_log
                    .info(COMPONENT, &format!("profile unchanged at seq={sequence}"));
            }
        }
        Ok(SyncOutcome::Applied(decision))
    }

    /// Drops the local profile and cached queries. Fetches issued before
    /// this call come back as `Stale`, so a response that was in flight at
    /// sign-out cannot restore the previous session's profile.
    pub fn sign_out(&self) -> Result<(), InfraError> {
        let mut last_applied = self.lock_last_applied()?;
        *last_applied = self.issued.load(Ordering::SeqCst) + 1;
        self.store.clear()?;
        self.cache.clear()?;
        self.activity_log
            .info(COMPONENT, &format!("session cleared; responses below seq={} dropped", *last_applied));
        Ok(())
    }

    fn lock_last_applied(&self) -> Result<MutexGuard<'_, u64>, InfraError> {
        self.last_applied
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("profile sync lock poisoned: {error}")))
    }
}

impl<P, Q> ProfileSyncService<P, Q>
where
    P: ProfileApiClient + 'static,
    Q: QueryCache + 'static,
{
    /// Starts periodic syncing. The first sync runs immediately; ticks are
    /// skipped while offline.
    pub fn spawn_background(self: Arc<Self>, interval: Duration) -> BackgroundSyncHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !self.gate.is_online() {
                    continue;
                }
                if let Err(error) = self.sync_once().await {
                    self.activity_log
                        .warn(COMPONENT, &format!("background profile sync failed: {error}"));
                }
            }
        });
        BackgroundSyncHandle { task: Some(task) }
    }
}

/// Owner of a background sync task. Dropping it cancels the task.
#[derive(Debug)]
pub struct BackgroundSyncHandle {
    task: Option<JoinHandle<()>>,
}

impl BackgroundSyncHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for BackgroundSyncHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Booking, BookingStatus, Counterparty, Profile, ProviderMeResponse};
    use crate::domain::reconciliation::ReplaceReason;
    use crate::infrastructure::connectivity::{ConnectivityMonitor, ConnectivityState, TransportType};
    use crate::infrastructure::profile_repository::{InMemoryProfileRepository, ProfileRepository};
    use crate::infrastructure::query_cache::{InMemoryQueryCache, QueryKey};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    type ScriptedResponse = Result<ProviderMeResponse, InfraError>;

    /// Each call waits on the next scripted channel so tests decide the
    /// order in which responses arrive.
    #[derive(Default)]
    struct ScriptedProfileClient {
        pending: Mutex<VecDeque<oneshot::Receiver<ScriptedResponse>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProfileClient {
        fn script(&self) -> oneshot::Sender<ScriptedResponse> {
            let (sender, receiver) = oneshot::channel();
            self.pending.lock().expect("pending lock").push_back(receiver);
            sender
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProfileApiClient for ScriptedProfileClient {
        async fn fetch_provider_profile(&self) -> Result<ProviderMeResponse, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let receiver = self
                .pending
                .lock()
                .expect("pending lock")
                .pop_front()
                .expect("a scripted response");
            receiver.await.expect("script sender alive")
        }
    }

    struct FixedProfileClient {
        response: ProviderMeResponse,
        calls: AtomicUsize,
    }

    impl FixedProfileClient {
        fn new(response: ProviderMeResponse) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileApiClient for FixedProfileClient {
        async fn fetch_provider_profile(&self) -> Result<ProviderMeResponse, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn profile(status: &str, updated_at: &str) -> Profile {
        Profile {
            status: status.to_string(),
            updated_at: Some(fixed_time(updated_at)),
            fields: serde_json::Map::new(),
        }
    }

    fn found(profile: Profile) -> ProviderMeResponse {
        ProviderMeResponse {
            has_profile: true,
            profile: Some(profile),
        }
    }

    fn sample_booking(id: &str) -> Booking {
        let created_at = fixed_time("2026-02-16T00:00:00Z");
        Booking {
            id: id.to_string(),
            status: BookingStatus::Pending,
            scheduled_at: created_at,
            deadline_at: None,
            created_at,
            updated_at: created_at,
            counterparty: Counterparty::default(),
            location: serde_json::Value::Null,
            price: serde_json::Value::Null,
        }
    }

    fn seed_list(cache: &InMemoryQueryCache) {
        let generation = cache.generation(&QueryKey::BookingList).expect("list generation");
        assert!(cache.put_list("", &[sample_booking("a")], generation).expect("seed list"));
    }

    fn empty_store() -> Arc<ProfileStore> {
        Arc::new(
            ProfileStore::load(Arc::new(InMemoryProfileRepository::default())).expect("load store"),
        )
    }

    fn offline() -> ConnectivityState {
        ConnectivityState {
            is_connected: false,
            is_internet_reachable: false,
            transport_type: TransportType::None,
        }
    }

    #[tokio::test]
    async fn replacement_resets_dependent_caches() {
        let cache = Arc::new(InMemoryQueryCache::default());
        seed_list(&cache);
        let store = empty_store();
        let service = ProfileSyncService::new(
            Arc::new(FixedProfileClient::new(found(profile("ACTIVE", "2026-02-01T10:00:00Z")))),
            Arc::clone(&store),
            Arc::clone(&cache),
            ConnectivityGate::always_online(),
        );

        let outcome = service.sync_once().await.expect("sync");

        assert_eq!(
            outcome,
            SyncOutcome::Applied(ReconcileDecision::Replace(ReplaceReason::NoLocalProfile))
        );
        assert_eq!(store.current().expect("profile").status, "ACTIVE");
        assert!(cache.get_list("").expect("get list").is_none());
    }

    #[tokio::test]
    async fn identical_profile_is_a_no_op() {
        let cache = Arc::new(InMemoryQueryCache::default());
        let store = empty_store();
        store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z"))
            .expect("seed");
        let before = store.current().expect("seeded");
        seed_list(&cache);
        let service = ProfileSyncService::new(
            Arc::new(FixedProfileClient::new(found(profile("ACTIVE", "2026-02-01T10:00:00Z")))),
            Arc::clone(&store),
            Arc::clone(&cache),
            ConnectivityGate::always_online(),
        );

        let outcome = service.sync_once().await.expect("sync");

        assert_eq!(outcome, SyncOutcome::Applied(ReconcileDecision::Keep));
        assert!(Arc::ptr_eq(&before, &store.current().expect("still present")));
        assert!(cache.get_list("").expect("get list").is_some());
    }

    #[tokio::test]
    async fn missing_server_profile_leaves_local_state() {
        let store = empty_store();
        store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z"))
            .expect("seed");
        let service = ProfileSyncService::new(
            Arc::new(FixedProfileClient::new(ProviderMeResponse {
                has_profile: false,
                profile: None,
            })),
            Arc::clone(&store),
            Arc::new(InMemoryQueryCache::default()),
            ConnectivityGate::always_online(),
        );

        assert_eq!(service.sync_once().await.expect("sync"), SyncOutcome::NoServerProfile);
        assert_eq!(store.current().expect("kept").status, "ACTIVE");
    }

    #[tokio::test]
    async fn older_response_arriving_late_is_discarded() {
        let client = Arc::new(ScriptedProfileClient::default());
        let first_reply = client.script();
        let second_reply = client.script();
        let store = empty_store();
        let service = Arc::new(ProfileSyncService::new(
            Arc::clone(&client),
            Arc::clone(&store),
            Arc::new(InMemoryQueryCache::default()),
            ConnectivityGate::always_online(),
        ));

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.sync_once().await }
        });
        while client.calls() < 1 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.sync_once().await }
        });
        while client.calls() < 2 {
            tokio::task::yield_now().await;
        }

        second_reply
            .send(Ok(found(profile("ACTIVE", "2026-02-02T10:00:00Z"))))
            .expect("second receiver alive");
        let second_outcome = second.await.expect("join").expect("sync");
        first_reply
            .send(Ok(found(profile("SUSPENDED", "2026-02-01T10:00:00Z"))))
            .expect("first receiver alive");
        let first_outcome = first.await.expect("join").expect("sync");

        assert!(matches!(second_outcome, SyncOutcome::Applied(decision) if decision.is_replace()));
        assert_eq!(first_outcome, SyncOutcome::Stale);
        assert_eq!(store.current().expect("profile").status, "ACTIVE");
    }

    #[tokio::test]
    async fn response_in_flight_at_sign_out_is_discarded() {
        let client = Arc::new(ScriptedProfileClient::default());
        let reply = client.script();
        let repository = Arc::new(InMemoryProfileRepository::default());
        let store = Arc::new(ProfileStore::load(repository.clone()).expect("load store"));
        store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z"))
            .expect("seed");
        let service = Arc::new(ProfileSyncService::new(
            Arc::clone(&client),
            Arc::clone(&store),
            Arc::new(InMemoryQueryCache::default()),
            ConnectivityGate::always_online(),
        ));

        let pending = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.sync_once().await }
        });
        while client.calls() < 1 {
            tokio::task::yield_now().await;
        }

        service.sign_out().expect("sign out");
        reply
            .send(Ok(found(profile("ACTIVE", "2026-02-03T10:00:00Z"))))
            .expect("receiver alive");

        assert_eq!(pending.await.expect("join").expect("sync"), SyncOutcome::Stale);
        assert!(store.current().is_none());
        assert!(repository.load().expect("repository load").is_none());

        // The next session syncs normally.
        let next_reply = client.script();
        next_reply
            .send(Ok(found(profile("ACTIVE", "2026-02-04T10:00:00Z"))))
            .expect("receiver alive");
        assert!(matches!(
            service.sync_once().await.expect("sync"),
            SyncOutcome::Applied(decision) if decision.is_replace()
        ));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_local_profile() {
        let client = Arc::new(ScriptedProfileClient::default());
        let reply = client.script();
        let store = empty_store();
        store
            .reconcile(profile("ACTIVE", "2026-02-01T10:00:00Z"))
            .expect("seed");
        let service = ProfileSyncService::new(
            Arc::clone(&client),
            Arc::clone(&store),
            Arc::new(InMemoryQueryCache::default()),
            ConnectivityGate::always_online(),
        );

        reply
            .send(Err(InfraError::Transport("connection reset".to_string())))
            .expect("receiver alive");
        let result = service.sync_once().await;

        assert!(matches!(result, Err(InfraError::Transport(_))));
        assert_eq!(store.current().expect("kept").status, "ACTIVE");
    }

    #[tokio::test]
    async fn offline_sync_is_suppressed() {
        let client = Arc::new(FixedProfileClient::new(found(profile("ACTIVE", "2026-02-01T10:00:00Z"))));
        let monitor = ConnectivityMonitor::default();
        monitor.update(offline());
        let service = ProfileSyncService::new(
            Arc::clone(&client),
            empty_store(),
            Arc::new(InMemoryQueryCache::default()),
            monitor.gate(),
        );

        assert!(matches!(service.sync_once().await, Err(InfraError::Offline)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sync_ticks_skips_offline_and_stops_on_drop() {
        let client = Arc::new(FixedProfileClient::new(found(profile("ACTIVE", "2026-02-01T10:00:00Z"))));
        let monitor = ConnectivityMonitor::default();
        let service = Arc::new(ProfileSyncService::new(
            Arc::clone(&client),
            empty_store(),
            Arc::new(InMemoryQueryCache::default()),
            monitor.gate(),
        ));
        let calls = || client.calls.load(Ordering::SeqCst);

        let handle = Arc::clone(&service).spawn_background(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls(), 1);
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls(), 2);

        monitor.update(offline());
        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(calls(), 2);

        monitor.update(ConnectivityState::default());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls(), 3);

        drop(handle);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(calls(), 3);
    }
}
