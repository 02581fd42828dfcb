use crate::domain::lifecycle::BookingAction;
use crate::domain::models::{Booking, ProviderMeResponse};
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::credential_store::AccessTokenStore;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingListFilter {
    pub status: Option<String>,
    pub tab: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl BookingListFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            pairs.push(("status", status.to_ascii_lowercase()));
        }
        if let Some(tab) = self.tab.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
            pairs.push(("tab", tab.to_string()));
        }
        if let Some(lat) = self.lat {
            pairs.push(("lat", lat.to_string()));
        }
        if let Some(lng) = self.lng {
            pairs.push(("lng", lng.to_string()));
        }
        pairs
    }

    /// Stable identity of this filter for the list cache.
    pub fn cache_key(&self) -> String {
        self.query_pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ActionRequest {
    pub action: BookingAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[async_trait]
pub trait BookingApiClient: Send + Sync {
    async fn list_bookings(&self, filter: &BookingListFilter) -> Result<Vec<Booking>, InfraError>;

    async fn get_booking(&self, booking_id: &str) -> Result<Booking, InfraError>;

    async fn perform_action(
        &self,
        booking_id: &str,
        request: &ActionRequest,
    ) -> Result<Booking, InfraError>;
}

#[async_trait]
pub trait ProfileApiClient: Send + Sync {
    async fn fetch_provider_profile(&self) -> Result<ProviderMeResponse, InfraError>;
}

const COMPONENT: &str = "api_client";

#[derive(Clone)]
pub struct ReqwestApiClient {
    client: Client,
    base_url: Url,
    token_store: Arc<dyn AccessTokenStore>,
    activity_log: Arc<ActivityLog>,
}

impl ReqwestApiClient {
    pub fn new(base_url: &str, token_store: Arc<dyn AccessTokenStore>) -> Result<Self, InfraError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid api base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(
                "api base url cannot be a base".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            base_url,
            token_store,
            activity_log: Arc::new(ActivityLog::disabled()),
        })
    }

    pub fn with_activity_log(mut self, activity_log: Arc<ActivityLog>) -> Self {
        self.activity_log = activity_log;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                InfraError::InvalidConfig("api base url cannot be a base".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, InfraError> {
        Ok(match self.token_store.load_token()? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<String, InfraError> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|error| InfraError::Transport(format!("{context}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Transport(format!("failed reading {context} response: {error}")))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(body)
    }
}

fn ensure_booking_id(booking_id: &str) -> Result<&str, InfraError> {
    let trimmed = booking_id.trim();
    if trimmed.is_empty() {
        return Err(InfraError::InvalidInput("booking id must not be empty".to_string()));
    }
    Ok(trimmed)
}

/// Non-2xx responses keep the server's own wording so validation failures
/// reach the user unchanged.
pub(crate) fn api_error(status: u16, body: &str) -> InfraError {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(serde_json::Value::as_str)
                    .map(str::trim)
                    .filter(|message| !message.is_empty())
                    .map(ToOwned::to_owned)
            })
        });

    let message = match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("request failed: http {status}"),
    };
    InfraError::Api { status, message }
}

// Records stay raw so one malformed entry cannot fail the whole list.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum BookingListPayload {
    Bare(Vec<serde_json::Value>),
    Wrapped { bookings: Vec<serde_json::Value> },
}

#[derive(Debug, Default, PartialEq)]
struct DecodedBookingList {
    bookings: Vec<Booking>,
    rejected: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum BookingPayload {
    Wrapped { booking: Booking },
    Bare(Booking),
}

fn decode_booking_list(body: &str) -> Result<DecodedBookingList, InfraError> {
    let records = match serde_json::from_str::<BookingListPayload>(body)? {
        BookingListPayload::Bare(records) | BookingListPayload::Wrapped { bookings: records } => records,
    };

    let mut decoded = DecodedBookingList::default();
    for (index, record) in records.into_iter().enumerate() {
        let booking = serde_json::from_value::<Booking>(record)
            .map_err(InfraError::from)
            .and_then(|booking| ensure_valid(&booking).map(|_| booking));
        match booking {
            Ok(booking) => decoded.bookings.push(booking),
            Err(error) => decoded.rejected.push(format!("record {index}: {error}")),
        }
    }
    Ok(decoded)
}

fn decode_booking(body: &str) -> Result<Booking, InfraError> {
    let booking = match serde_json::from_str::<BookingPayload>(body)? {
        BookingPayload::Wrapped { booking } | BookingPayload::Bare(booking) => booking,
    };
    ensure_valid(&booking)?;
    Ok(booking)
}

fn ensure_valid(booking: &Booking) -> Result<(), InfraError> {
    booking
        .validate()
        .map_err(|error| InfraError::InvalidInput(format!("invalid booking payload: {error}")))
}

#[async_trait]
impl BookingApiClient for ReqwestApiClient {
    async fn list_bookings(&self, filter: &BookingListFilter) -> Result<Vec<Booking>, InfraError> {
        let url = self.endpoint(&["bookings"])?;
        let request = self.client.get(url).query(&filter.query_pairs());
        let body = self.send(request, "network error while listing bookings").await?;
        let decoded = decode_booking_list(&body)?;
        for rejected in &decoded.rejected {
            self.activity_log
                .warn(COMPONENT, &format!("skipped booking in list response: {rejected}"));
        }
        Ok(decoded.bookings)
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Booking, InfraError> {
        let booking_id = ensure_booking_id(booking_id)?;
        let url = self.endpoint(&["bookings", booking_id])?;
        let body = self
            .send(self.client.get(url), "network error while loading booking")
            .await?;
        decode_booking(&body)
    }

    async fn perform_action(
        &self,
        booking_id: &str,
        request: &ActionRequest,
    ) -> Result<Booking, InfraError> {
        let booking_id = ensure_booking_id(booking_id)?;
        let url = self.endpoint(&["bookings", booking_id, "action"])?;
        let body = self
            .send(
                self.client.patch(url).json(request),
                "network error while updating booking",
            )
            .await?;
        decode_booking(&body)
    }
}

#[async_trait]
impl ProfileApiClient for ReqwestApiClient {
    async fn fetch_provider_profile(&self) -> Result<ProviderMeResponse, InfraError> {
        let url = self.endpoint(&["provider", "me"])?;
        let body = self
            .send(self.client.get(url), "network error while loading profile")
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}
