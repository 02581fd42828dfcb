use crate::domain::models::Profile;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceReason {
    NoLocalProfile,
    NewerTimestamp,
    StatusChanged,
    SameTimestampContentChanged,
}

impl ReplaceReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplaceReason::NoLocalProfile => "no_local_profile",
            ReplaceReason::NewerTimestamp => "newer_timestamp",
            ReplaceReason::StatusChanged => "status_changed",
            ReplaceReason::SameTimestampContentChanged => "same_timestamp_content_changed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum ReconcileDecision {
    Replace(ReplaceReason),
    Keep,
}

impl ReconcileDecision {
    pub fn is_replace(self) -> bool {
        matches!(self, ReconcileDecision::Replace(_))
    }
}

/// Decides whether a freshly fetched server profile replaces the local copy.
///
/// Rules are checked in order and the first match wins:
/// 1. the server `updated_at` is strictly newer,
/// 2. the status differs, whatever the timestamps say,
/// 3. the timestamps are equal but the records differ structurally.
///
/// Anything else keeps the local profile.
pub fn reconcile(server: &Profile, local: Option<&Profile>) -> ReconcileDecision {
    let Some(local) = local else {
        return ReconcileDecision::Replace(ReplaceReason::NoLocalProfile);
    };

    let timestamps = compare_updated_at(server.updated_at, local.updated_at);
    if timestamps == Some(Ordering::Greater) {
        return ReconcileDecision::Replace(ReplaceReason::NewerTimestamp);
    }

    if server.status != local.status {
        return ReconcileDecision::Replace(ReplaceReason::StatusChanged);
    }

    if timestamps == Some(Ordering::Equal) && server != local {
        return ReconcileDecision::Replace(ReplaceReason::SameTimestampContentChanged);
    }

    ReconcileDecision::Keep
}

// A missing local timestamp is older than any server timestamp; a missing
// server timestamp is never newer.
fn compare_updated_at(
    server: Option<DateTime<Utc>>,
    local: Option<DateTime<Utc>>,
) -> Option<Ordering> {
    match (server, local) {
        (Some(server), Some(local)) => Some(server.cmp(&local)),
        (Some(_), None) => Some(Ordering::Greater),
        (None, None) => Some(Ordering::Equal),
        (None, Some(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T00:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn profile(status: &str, updated_at: Option<DateTime<Utc>>, fields: serde_json::Value) -> Profile {
        Profile {
            status: status.to_string(),
            updated_at,
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn missing_local_profile_is_replaced() {
        let server = profile("active", Some(fixed_time()), serde_json::json!({}));
        assert_eq!(
            reconcile(&server, None),
            ReconcileDecision::Replace(ReplaceReason::NoLocalProfile)
        );
    }

    #[test]
    fn newer_server_timestamp_replaces() {
        let local = profile("active", Some(fixed_time()), serde_json::json!({"name": "Ada"}));
        let server = profile(
            "active",
            Some(fixed_time() + Duration::seconds(1)),
            serde_json::json!({"name": "Ada"}),
        );
        assert_eq!(
            reconcile(&server, Some(&local)),
            ReconcileDecision::Replace(ReplaceReason::NewerTimestamp)
        );
    }

    #[test]
    fn status_change_replaces_even_with_equal_timestamps() {
        let local = profile("active", Some(fixed_time()), serde_json::json!({}));
        let server = profile("suspended", Some(fixed_time()), serde_json::json!({}));
        assert_eq!(
            reconcile(&server, Some(&local)),
            ReconcileDecision::Replace(ReplaceReason::StatusChanged)
        );
    }

    #[test]
    fn status_change_replaces_even_with_older_server_timestamp() {
        let local = profile("pending_review", Some(fixed_time()), serde_json::json!({}));
        let server = profile(
            "approved",
            Some(fixed_time() - Duration::minutes(5)),
            serde_json::json!({}),
        );
        assert!(reconcile(&server, Some(&local)).is_replace());
    }

    #[test]
    fn identical_records_are_kept() {
        let fields = serde_json::json!({"name": "Ada", "services": {"radiusKm": 5, "tags": ["plumbing"]}});
        let local = profile("active", Some(fixed_time()), fields.clone());
        let server = profile("active", Some(fixed_time()), fields);
        assert_eq!(reconcile(&server, Some(&local)), ReconcileDecision::Keep);
    }

    #[test]
    fn nested_difference_with_equal_timestamps_replaces() {
        let local = profile(
            "active",
            Some(fixed_time()),
            serde_json::json!({"services": {"radiusKm": 5}}),
        );
        let server = profile(
            "active",
            Some(fixed_time()),
            serde_json::json!({"services": {"radiusKm": 10}}),
        );
        assert_eq!(
            reconcile(&server, Some(&local)),
            ReconcileDecision::Replace(ReplaceReason::SameTimestampContentChanged)
        );
    }

    #[test]
    fn older_server_record_with_same_status_is_ignored() {
        let local = profile("active", Some(fixed_time()), serde_json::json!({"name": "Ada L."}));
        let server = profile(
            "active",
            Some(fixed_time() - Duration::seconds(30)),
            serde_json::json!({"name": "Ada"}),
        );
        assert_eq!(reconcile(&server, Some(&local)), ReconcileDecision::Keep);
    }

    #[test]
    fn missing_timestamps_fall_back_to_status_and_content() {
        let local = profile("active", None, serde_json::json!({"name": "Ada"}));
        let same = profile("active", None, serde_json::json!({"name": "Ada"}));
        let edited = profile("active", None, serde_json::json!({"name": "Ada L."}));
        let stamped = profile("active", Some(fixed_time()), serde_json::json!({"name": "Ada"}));

        assert_eq!(reconcile(&same, Some(&local)), ReconcileDecision::Keep);
        assert!(reconcile(&edited, Some(&local)).is_replace());
        assert_eq!(
            reconcile(&stamped, Some(&local)),
            ReconcileDecision::Replace(ReplaceReason::NewerTimestamp)
        );
        assert_eq!(reconcile(&local, Some(&stamped)), ReconcileDecision::Keep);
    }
}
