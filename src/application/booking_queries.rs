use crate::domain::grouping::{BookingSection, group_bookings_in};
use crate::domain::models::Booking;
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::api_client::{BookingApiClient, BookingListFilter};
use crate::infrastructure::config::ReadRetryConfig;
use crate::infrastructure::connectivity::ConnectivityGate;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::{QueryCache, QueryKey};
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{Duration as TokioDuration, sleep};

const COMPONENT: &str = "booking_queries";

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

impl From<&ReadRetryConfig> for RetryPolicy {
    fn from(config: &ReadRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
        }
    }
}

/// Read side of the booking API with a read-through cache.
pub struct BookingQueryService<C, Q>
where
    C: BookingApiClient,
    Q: QueryCache,
{
    api_client: Arc<C>,
    cache: Arc<Q>,
    gate: ConnectivityGate,
    retry_policy: RetryPolicy,
    timezone: Tz,
    activity_log: Arc<ActivityLog>,
}

impl<C, Q> BookingQueryService<C, Q>
where
    C: BookingApiClient,
    Q: QueryCache,
{
    pub fn new(api_client: Arc<C>, cache: Arc<Q>, gate: ConnectivityGate) -> Self {
        Self {
            api_client,
            cache,
            gate,
            retry_policy: RetryPolicy::default(),
            timezone: chrono_tz::UTC,
            activity_log: Arc::new(ActivityLog::disabled()),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_activity_log(mut self, activity_log: Arc<ActivityLog>) -> Self {
        self.activity_log = activity_log;
        self
    }

    pub async fn list_bookings(&self, filter: &BookingListFilter) -> Result<Vec<Booking>, InfraError> {
        let cache_key = filter.cache_key();
        if let Some(cached) = self.cache.get_list(&cache_key)? {
            return Ok(cached);
        }
        self.refresh_bookings(filter).await
    }

    /// Bypasses the cache, e.g. after a push notification. The cached list
    /// is only replaced when the fetch succeeds and no invalidation landed
    /// while it was in flight.
    pub async fn refresh_bookings(&self, filter: &BookingListFilter) -> Result<Vec<Booking>, InfraError> {
        if !self.gate.is_online() {
            return Err(InfraError::Offline);
        }

        let generation = self.cache.generation(&QueryKey::BookingList)?;
        let bookings = self
            .with_retry(|| self.api_client.list_bookings(filter))
            .await?;
        if !self.cache.put_list(&filter.cache_key(), &bookings, generation)? {
            self.activity_log.info(
                COMPONENT,
                "booking list invalidated during fetch; response not cached",
            );
        }
        Ok(bookings)
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, InfraError> {
        let booking_id = booking_id.trim();
        if booking_id.is_empty() {
            return Err(InfraError::InvalidInput("booking id must not be empty".to_string()));
        }
        if let Some(cached) = self.cache.get_detail(booking_id)? {
            return Ok(cached);
        }
        if !self.gate.is_online() {
            return Err(InfraError::Offline);
        }

        let generation = self
            .cache
            .generation(&QueryKey::BookingDetail(booking_id.to_string()))?;
        let booking = self
            .with_retry(|| self.api_client.get_booking(booking_id))
            .await?;
        if !self.cache.put_detail(&booking, generation)? {
            self.activity_log.info(
                COMPONENT,
                &format!("booking {booking_id} invalidated during fetch; response not cached"),
            );
        }
        Ok(booking)
    }

    pub async fn list_sections(&self, filter: &BookingListFilter) -> Result<Vec<BookingSection>, InfraError> {
        let bookings = self.list_bookings(filter).await?;
        Ok(group_bookings_in(bookings, &self.timezone))
    }

    /// Last-known-good list, without touching the network.
    pub fn cached_bookings(&self, filter: &BookingListFilter) -> Result<Option<Vec<Booking>>, InfraError> {
        self.cache.get_list(&filter.cache_key())
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, InfraError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InfraError>>,
    {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt: u8 = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self
                        .retry_policy
                        .base_delay_ms
                        .saturating_mul(2u64.saturating_pow(attempt as u32));
                    self.activity_log.warn(
                        COMPONENT,
                        &format!("read failed, retrying in {delay}ms: {error}"),
                    );
                    sleep(TokioDuration::from_millis(delay)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(error) => return Err(error),
            }
        }
    }
}
