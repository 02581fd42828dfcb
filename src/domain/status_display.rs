use crate::domain::models::{Booking, BookingStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeTokens {
    pub warning: String,
    pub info: String,
    pub primary: String,
    pub success: String,
    pub error: String,
    pub neutral: String,
}

impl Default for ThemeTokens {
    fn default() -> Self {
        Self {
            warning: "#F59E0B".to_string(),
            info: "#3B82F6".to_string(),
            primary: "#6366F1".to_string(),
            success: "#10B981".to_string(),
            error: "#EF4444".to_string(),
            neutral: "#6B7280".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusDescriptor {
    pub color: String,
    pub label: String,
    pub slug: String,
}

pub fn classify(status: &str, theme: &ThemeTokens) -> StatusDescriptor {
    classify_status(&BookingStatus::parse(status), theme)
}

pub fn classify_status(status: &BookingStatus, theme: &ThemeTokens) -> StatusDescriptor {
    let (color, label) = match status {
        BookingStatus::Pending => (&theme.warning, "Pending".to_string()),
        BookingStatus::Accepted => (&theme.info, "Accepted".to_string()),
        BookingStatus::InProgress => (&theme.primary, "In Progress".to_string()),
        BookingStatus::Completed => (&theme.success, "Completed".to_string()),
        BookingStatus::Declined => (&theme.error, "Declined".to_string()),
        BookingStatus::Cancelled => (&theme.error, "Cancelled".to_string()),
        BookingStatus::Expired => (&theme.neutral, "Expired".to_string()),
        BookingStatus::Unknown(raw) => (&theme.neutral, title_case(raw)),
    };

    StatusDescriptor {
        color: color.clone(),
        label,
        slug: status.as_str().to_lowercase(),
    }
}

/// Renders the status the user should see right now, including the
/// client-side expired overlay for stale pending requests.
pub fn classify_booking(booking: &Booking, now: DateTime<Utc>, theme: &ThemeTokens) -> StatusDescriptor {
    classify_status(&booking.display_status(now), theme)
}

fn title_case(raw: &str) -> String {
    let words = raw
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let rest = chars.as_str().to_lowercase();
                    format!("{}{rest}", first.to_uppercase())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>();

    if words.is_empty() {
        "Unknown".to_string()
    } else {
        words.join(" ")
    }
}
