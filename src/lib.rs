pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    AppState, BookingDetailResponse, ConnectivityReportResponse, booking_countdown_impl,
    classify_status_impl, clear_session_impl, current_profile_impl, dispatch_booking_action_impl,
    get_booking_impl, group_bookings_impl, legal_actions_impl, list_booking_sections_impl,
    preview_booking_action_impl, refresh_booking_sections_impl, report_connectivity_impl,
    sign_in_impl, start_profile_polling_impl, stop_profile_polling_impl, subscribe_countdown_impl,
    sync_profile_impl,
};
use application::countdown_clock::CountdownSubscription;
use application::profile_sync::SyncOutcome;
use domain::countdown::Countdown;
use domain::grouping::BookingSection;
use domain::lifecycle::BookingAction;
use domain::models::{Booking, BookingStatus, Profile};
use domain::status_display::StatusDescriptor;
use infrastructure::api_client::BookingListFilter;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct BootstrapResponse {
    pub workspace_root: String,
    pub database_path: String,
}

pub fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

/// Opens the client state for a workspace, defaulting to the current directory.
pub fn open(root: Option<String>) -> Result<AppState, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };
    AppState::new(workspace_root).map_err(|error| error.to_string())
}

pub fn classify(state: &AppState, status: String) -> StatusDescriptor {
    classify_status_impl(state, status)
}

pub fn group(state: &AppState, bookings: Vec<Booking>) -> Vec<BookingSection> {
    group_bookings_impl(state, bookings)
}

pub fn countdown(state: &AppState, deadline: String) -> Result<Countdown, String> {
    booking_countdown_impl(deadline).map_err(|error| state.command_error("countdown", &error))
}

pub fn watch_countdown(state: &AppState, deadline: String) -> Result<CountdownSubscription, String> {
    subscribe_countdown_impl(state, deadline)
        .map_err(|error| state.command_error("watch_countdown", &error))
}

pub fn legal_actions(status: String) -> Vec<BookingAction> {
    legal_actions_impl(status)
}

pub fn preview_action(state: &AppState, status: String, action: String) -> Result<BookingStatus, String> {
    preview_booking_action_impl(status, action)
        .map_err(|error| state.command_error("preview_action", &error))
}

pub async fn list_booking_sections(
    state: &AppState,
    filter: BookingListFilter,
) -> Result<Vec<BookingSection>, String> {
    list_booking_sections_impl(state, filter)
        .await
        .map_err(|error| state.command_error("list_booking_sections", &error))
}

pub async fn refresh_booking_sections(
    state: &AppState,
    filter: BookingListFilter,
) -> Result<Vec<BookingSection>, String> {
    refresh_booking_sections_impl(state, filter)
        .await
        .map_err(|error| state.command_error("refresh_booking_sections", &error))
}

pub async fn get_booking(state: &AppState, booking_id: String) -> Result<BookingDetailResponse, String> {
    get_booking_impl(state, booking_id)
        .await
        .map_err(|error| state.command_error("get_booking", &error))
}

pub async fn dispatch_action(
    state: &AppState,
    booking_id: String,
    action: String,
    reason: Option<String>,
) -> Result<BookingDetailResponse, String> {
    dispatch_booking_action_impl(state, booking_id, action, reason)
        .await
        .map_err(|error| state.command_error("dispatch_action", &error))
}

pub async fn sync_profile(state: &AppState) -> Result<SyncOutcome, String> {
    sync_profile_impl(state)
        .await
        .map_err(|error| state.command_error("sync_profile", &error))
}

pub fn current_profile(state: &AppState) -> Option<Profile> {
    current_profile_impl(state)
}

pub fn sign_in(state: &AppState, access_token: String) -> Result<(), String> {
    sign_in_impl(state, access_token).map_err(|error| state.command_error("sign_in", &error))
}

pub fn sign_out(state: &AppState) -> Result<(), String> {
    clear_session_impl(state).map_err(|error| state.command_error("sign_out", &error))
}

pub fn report_connectivity(
    state: &AppState,
    is_connected: bool,
    is_internet_reachable: bool,
    transport_type: Option<String>,
) -> ConnectivityReportResponse {
    report_connectivity_impl(state, is_connected, is_internet_reachable, transport_type)
}

pub fn start_profile_polling(state: &AppState) -> Result<bool, String> {
    start_profile_polling_impl(state)
        .map_err(|error| state.command_error("start_profile_polling", &error))
}

pub fn stop_profile_polling(state: &AppState) -> Result<bool, String> {
    stop_profile_polling_impl(state)
        .map_err(|error| state.command_error("stop_profile_polling", &error))
}
