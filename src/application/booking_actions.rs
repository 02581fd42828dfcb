use crate::domain::lifecycle::BookingAction;
use crate::domain::models::{Booking, BookingStatus};
use crate::infrastructure::activity_log::ActivityLog;
use crate::infrastructure::api_client::{ActionRequest, BookingApiClient};
use crate::infrastructure::connectivity::ConnectivityGate;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::query_cache::{QueryCache, QueryKey};
use std::sync::Arc;

const COMPONENT: &str = "booking_actions";

/// Issues state-changing booking requests.
///
/// The gateway never edits a booking locally: on success it drops the
/// cached booking lists and the cached detail for that id so the next
/// read shows the server's status, and on failure it leaves every cache
/// alone. Two actions on the same booking must be serialized by the
/// caller.
pub struct BookingActionGateway<C, Q>
where
    C: BookingApiClient,
    Q: QueryCache,
{
    api_client: Arc<C>,
    cache: Arc<Q>,
    gate: ConnectivityGate,
    activity_log: Arc<ActivityLog>,
}

impl<C, Q> BookingActionGateway<C, Q>
where
    C: BookingApiClient,
    Q: QueryCache,
{
    pub fn new(api_client: Arc<C>, cache: Arc<Q>, gate: ConnectivityGate) -> Self {
        Self {
            api_client,
            cache,
            gate,
            activity_log: Arc::new(ActivityLog::disabled()),
        }
    }

    pub fn with_activity_log(mut self, activity_log: Arc<ActivityLog>) -> Self {
        self.activity_log = activity_log;
        self
    }

    pub async fn dispatch(
        &self,
        booking_id: &str,
        action: BookingAction,
        reason: Option<String>,
    ) -> Result<Booking, InfraError> {
        let booking_id = booking_id.trim();
        if booking_id.is_empty() {
            return Err(InfraError::InvalidInput("booking id must not be empty".to_string()));
        }
        if !self.gate.is_online() {
            return Err(InfraError::Offline);
        }

        let request = ActionRequest {
            action,
            reason: reason
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        };

        let booking = match self.api_client.perform_action(booking_id, &request).await {
            Ok(booking) => booking,
            Err(error) => {
                self.activity_log.error(
                    COMPONENT,
                    &format!("{action} failed for booking_id={booking_id}: {error}"),
                );
                return Err(error);
            }
        };

        self.cache.invalidate(&QueryKey::BookingList)?;
        self.cache
            .invalidate(&QueryKey::BookingDetail(booking_id.to_string()))?;
        self.activity_log.info(
            COMPONENT,
            &format!(
                "{action} applied to booking_id={booking_id}; server status={}",
                booking.status
            ),
        );
        Ok(booking)
    }

    /// Same as [`dispatch`](Self::dispatch) for an action name coming from
    /// the UI layer.
    pub async fn dispatch_named(
        &self,
        booking_id: &str,
        action: &str,
        reason: Option<String>,
    ) -> Result<Booking, InfraError> {
        let parsed = BookingAction::parse(action)
            .ok_or_else(|| InfraError::InvalidInput(format!("unknown booking action '{action}'")))?;
        self.dispatch(booking_id, parsed, reason).await
    }
}

/// Status the server should report after `action`, used to enable UI
/// controls. The request itself is never gated on this.
pub fn expected_status(
    current: &BookingStatus,
    action: BookingAction,
) -> Result<BookingStatus, InfraError> {
    current
        .transition(action)
        .ok_or_else(|| InfraError::IllegalTransition {
            from: current.as_str().to_string(),
            action: action.as_str().to_string(),
        })
}
