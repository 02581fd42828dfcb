use chrono::{DateTime, Utc};
use serde::Serialize;

pub const EXPIRED_LABEL: &str = "Expired";

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub text: String,
    pub is_expired: bool,
}

impl Countdown {
    fn expired() -> Self {
        Self {
            text: EXPIRED_LABEL.to_string(),
            is_expired: true,
        }
    }
}

pub fn countdown_at(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Countdown {
    let remaining_ms = (deadline - now).num_milliseconds();
    if remaining_ms <= 0 {
        return Countdown::expired();
    }

    let total_seconds = remaining_ms / 1000;
    let days = total_seconds / SECONDS_PER_DAY;
    let hours = (total_seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    let minutes = (total_seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let seconds = total_seconds % SECONDS_PER_MINUTE;

    let text = if days >= 1 {
        format!("{days}d {hours}h")
    } else if hours >= 1 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    };

    Countdown {
        text,
        is_expired: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T12:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn ninety_minutes_renders_hours_minutes_seconds() {
        let deadline = now() + Duration::minutes(90);
        let countdown = countdown_at(deadline, now());
        assert_eq!(countdown.text, "01:30:00");
        assert!(!countdown.is_expired);
    }

    #[test]
    fn countdown_decrements_each_second() {
        let deadline = now() + Duration::minutes(90);
        let texts = (0..3)
            .map(|tick| countdown_at(deadline, now() + Duration::seconds(tick)).text)
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["01:30:00", "01:29:59", "01:29:58"]);
    }

    #[test]
    fn two_days_renders_days_and_hours() {
        let countdown = countdown_at(now() + Duration::days(2), now());
        assert_eq!(countdown.text, "2d 0h");

        let countdown = countdown_at(now() + Duration::days(1) + Duration::hours(5), now());
        assert_eq!(countdown.text, "1d 5h");
    }

    #[test]
    fn under_an_hour_renders_minutes_seconds() {
        let countdown = countdown_at(now() + Duration::seconds(9 * 60 + 7), now());
        assert_eq!(countdown.text, "09:07");
    }

    #[test]
    fn past_or_exact_deadline_is_expired() {
        let past = countdown_at(now() - Duration::minutes(1), now());
        assert_eq!(past.text, "Expired");
        assert!(past.is_expired);

        let exact = countdown_at(now(), now());
        assert!(exact.is_expired);
    }

    #[test]
    fn sub_second_remainder_is_not_yet_expired() {
        let countdown = countdown_at(now() + Duration::milliseconds(400), now());
        assert_eq!(countdown.text, "00:00");
        assert!(!countdown.is_expired);
    }

    #[test]
    fn recomputation_is_idempotent() {
        let deadline = now() + Duration::hours(3);
        assert_eq!(countdown_at(deadline, now()), countdown_at(deadline, now()));
    }
}
