use crate::application::booking_actions::{BookingActionGateway, expected_status};
use crate::application::booking_queries::{BookingQueryService, RetryPolicy};
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::countdown_clock::{CountdownSubscription, SharedClock};
use crate::application::profile_store::ProfileStore;
use crate::application::profile_sync::{BackgroundSyncHandle, ProfileSyncService, SyncOutcome};
use crate::domain::countdown::{Countdown, countdown_at};
use crate::domain::grouping::{BookingSection, group_bookings_in};
use crate::domain::lifecycle::{BookingAction, legal_actions};
use crate::domain::models::{Booking, BookingStatus, Profile};
use crate::domain::status_display::{StatusDescriptor, classify, classify_booking};
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::api_client::{BookingListFilter, ReqwestApiClient};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::connectivity::{ConnectivityMonitor, ConnectivityState, TransportType};
use crate::infrastructure::credential_store::{AccessTokenStore, KeyringAccessTokenStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::profile_repository::SqliteProfileRepository;
use crate::infrastructure::query_cache::InMemoryQueryCache;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

type Queries = BookingQueryService<ReqwestApiClient, InMemoryQueryCache>;
type Actions = BookingActionGateway<ReqwestApiClient, InMemoryQueryCache>;
type ProfileSync = ProfileSyncService<ReqwestApiClient, InMemoryQueryCache>;

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    config: ClientConfig,
    activity_log: Arc<ActivityLog>,
    connectivity: ConnectivityMonitor,
    token_store: Arc<dyn AccessTokenStore>,
    profile_store: Arc<ProfileStore>,
    queries: Queries,
    actions: Actions,
    profile_sync: Arc<ProfileSync>,
    clock: OnceLock<SharedClock>,
    polling: Mutex<Option<BackgroundSyncHandle>>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_token_store(workspace_root, Arc::new(KeyringAccessTokenStore::default()))
    }

    pub fn with_token_store(
        workspace_root: PathBuf,
        token_store: Arc<dyn AccessTokenStore>,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = bootstrap.config;
        let activity_log = Arc::new(ActivityLog::in_dir(&bootstrap.logs_dir));

        let connectivity = ConnectivityMonitor::default();
        let cache = Arc::new(InMemoryQueryCache::default());
        let repository = Arc::new(SqliteProfileRepository::new(&bootstrap.database_path));
        let profile_store = Arc::new(
            ProfileStore::load(repository)?.with_activity_log(Arc::clone(&activity_log)),
        );
        let api_client = Arc::new(
            ReqwestApiClient::new(&config.api_base_url, Arc::clone(&token_store))?
                .with_activity_log(Arc::clone(&activity_log)),
        );

        let queries = BookingQueryService::new(Arc::clone(&api_client), Arc::clone(&cache), connectivity.gate())
            .with_retry_policy(RetryPolicy::from(&config.read_retry))
            .with_timezone(config.timezone)
            .with_activity_log(Arc::clone(&activity_log));
        let actions = BookingActionGateway::new(Arc::clone(&api_client), Arc::clone(&cache), connectivity.gate())
            .with_activity_log(Arc::clone(&activity_log));
        let profile_sync = Arc::new(
            ProfileSyncService::new(
                api_client,
                Arc::clone(&profile_store),
                Arc::clone(&cache),
                connectivity.gate(),
            )
            .with_activity_log(Arc::clone(&activity_log)),
        );

        Ok(Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            config,
            activity_log,
            connectivity,
            token_store,
            profile_store,
            queries,
            actions,
            profile_sync,
            clock: OnceLock::new(),
            polling: Mutex::new(None),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.activity_log.info(command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.activity_log.error(command, message);
    }

    fn shared_clock(&self) -> Result<&SharedClock, InfraError> {
        if let Some(clock) = self.clock.get() {
            return Ok(clock);
        }
        ensure_runtime("countdown clock")?;
        let tick = Duration::from_millis(self.config.countdown_tick_millis);
        Ok(self.clock.get_or_init(|| SharedClock::start(tick)))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetailResponse {
    pub booking: Booking,
    pub display: StatusDescriptor,
    pub legal_actions: Vec<BookingAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<Countdown>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityReportResponse {
    pub state: ConnectivityState,
    pub is_online: bool,
    pub changed: bool,
}

pub fn classify_status_impl(state: &AppState, status: String) -> StatusDescriptor {
    classify(&status, &state.config.theme)
}

/// Month sections in the configured timezone.
pub fn group_bookings_impl(state: &AppState, bookings: Vec<Booking>) -> Vec<BookingSection> {
    group_bookings_in(bookings, &state.config.timezone)
}

pub fn legal_actions_impl(status: String) -> Vec<BookingAction> {
    legal_actions(&BookingStatus::parse(&status))
}

pub fn preview_booking_action_impl(status: String, action: String) -> Result<BookingStatus, InfraError> {
    expected_status(&BookingStatus::parse(&status), parse_action(&action)?)
}

pub async fn list_booking_sections_impl(
    state: &AppState,
    filter: BookingListFilter,
) -> Result<Vec<BookingSection>, InfraError> {
    match state.queries.list_sections(&filter).await {
        Ok(sections) => Ok(sections),
        Err(InfraError::Offline) => {
            state.log_info("list_booking_sections", "offline; no cached bookings for filter");
            Err(InfraError::Offline)
        }
        Err(error) => Err(error),
    }
}

pub async fn refresh_booking_sections_impl(
    state: &AppState,
    filter: BookingListFilter,
) -> Result<Vec<BookingSection>, InfraError> {
    state.queries.refresh_bookings(&filter).await?;
    state.queries.list_sections(&filter).await
}

pub async fn get_booking_impl(state: &AppState, booking_id: String) -> Result<BookingDetailResponse, InfraError> {
    let booking = state.queries.get_booking(&booking_id).await?;
    Ok(describe_booking(state, booking, Utc::now()))
}

pub fn booking_countdown_impl(deadline: String) -> Result<Countdown, InfraError> {
    let deadline = parse_rfc3339_input(&deadline, "deadline")?;
    Ok(countdown_at(deadline, Utc::now()))
}

/// Attaches one row to the shared clock. Must be called from inside the
/// async runtime.
pub fn subscribe_countdown_impl(state: &AppState, deadline: String) -> Result<CountdownSubscription, InfraError> {
    let deadline = parse_rfc3339_input(&deadline, "deadline")?;
    Ok(state.shared_clock()?.subscribe(deadline))
}

pub async fn dispatch_booking_action_impl(
    state: &AppState,
    booking_id: String,
    action: String,
    reason: Option<String>,
) -> Result<BookingDetailResponse, InfraError> {
    let booking = state.actions.dispatch_named(&booking_id, &action, reason).await?;
    Ok(describe_booking(state, booking, Utc::now()))
}

pub async fn sync_profile_impl(state: &AppState) -> Result<SyncOutcome, InfraError> {
    state.profile_sync.sync_once().await
}

pub fn current_profile_impl(state: &AppState) -> Option<Profile> {
    state.profile_store.current().map(|profile| profile.as_ref().clone())
}

/// Stores the bearer token used for every API request.
pub fn sign_in_impl(state: &AppState, access_token: String) -> Result<(), InfraError> {
    let access_token = access_token.trim();
    if access_token.is_empty() {
        return Err(InfraError::InvalidInput("access token must not be empty".to_string()));
    }
    state.token_store.save_token(access_token)?;
    state.log_info("sign_in", "access token stored");
    Ok(())
}

/// Sign-out: forget the access token, the local profile and every cached
/// query. Profile responses still in flight are discarded.
pub fn clear_session_impl(state: &AppState) -> Result<(), InfraError> {
    stop_profile_polling_impl(state)?;
    state.token_store.delete_token()?;
    state.profile_sync.sign_out()?;
    state.log_info("clear_session", "access token, local profile and query cache cleared");
    Ok(())
}

pub fn report_connectivity_impl(
    state: &AppState,
    is_connected: bool,
    is_internet_reachable: bool,
    transport_type: Option<String>,
) -> ConnectivityReportResponse {
    let reported = ConnectivityState {
        is_connected,
        is_internet_reachable,
        transport_type: transport_type
            .as_deref()
            .map(TransportType::parse)
            .unwrap_or(TransportType::Unknown),
    };
    let changed = state.connectivity.update(reported);
    if changed {
        let message = if reported.is_online() {
            "back online; network work resumed"
        } else {
            "offline; network work suspended"
        };
        state.log_info("report_connectivity", message);
    }
    ConnectivityReportResponse {
        state: reported,
        is_online: reported.is_online(),
        changed,
    }
}

/// Returns false when polling was already running.
pub fn start_profile_polling_impl(state: &AppState) -> Result<bool, InfraError> {
    let mut polling = lock_polling(state)?;
    if polling.as_ref().is_some_and(BackgroundSyncHandle::is_running) {
        return Ok(false);
    }
    ensure_runtime("profile polling")?;
    let interval = Duration::from_secs(state.config.profile_sync_interval_seconds);
    *polling = Some(Arc::clone(&state.profile_sync).spawn_background(interval));
    state.log_info(
        "start_profile_polling",
        &format!("polling every {}s", state.config.profile_sync_interval_seconds),
    );
    Ok(true)
}

/// Returns false when nothing was running.
pub fn stop_profile_polling_impl(state: &AppState) -> Result<bool, InfraError> {
    let Some(handle) = lock_polling(state)?.take() else {
        return Ok(false);
    };
    handle.stop();
    state.log_info("stop_profile_polling", "polling stopped");
    Ok(true)
}

fn describe_booking(state: &AppState, booking: Booking, now: DateTime<Utc>) -> BookingDetailResponse {
    let display = classify_booking(&booking, now, &state.config.theme);
    let displayed_status = booking.display_status(now);
    let countdown = match (&displayed_status, booking.deadline_at) {
        (BookingStatus::Pending, Some(deadline)) => Some(countdown_at(deadline, now)),
        _ => None,
    };
    BookingDetailResponse {
        legal_actions: legal_actions(&displayed_status),
        display,
        countdown,
        booking,
    }
}

fn lock_polling(state: &AppState) -> Result<MutexGuard<'_, Option<BackgroundSyncHandle>>, InfraError> {
    state
        .polling
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("polling lock poisoned: {error}")))
}

fn ensure_runtime(purpose: &str) -> Result<(), InfraError> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|_| InfraError::InvalidConfig(format!("{purpose} requires a running async runtime")))
}

fn parse_action(value: &str) -> Result<BookingAction, InfraError> {
    BookingAction::parse(value)
        .ok_or_else(|| InfraError::InvalidInput(format!("unknown booking action '{}'", value.trim())))
}

fn parse_rfc3339_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidInput(format!("{field_name} must be RFC3339: {error}")))
}
