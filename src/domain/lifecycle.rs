use crate::domain::models::BookingStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Accept,
    Decline,
    Start,
    Complete,
    Cancel,
}

impl BookingAction {
    pub const ALL: [BookingAction; 5] = [
        BookingAction::Accept,
        BookingAction::Decline,
        BookingAction::Start,
        BookingAction::Complete,
        BookingAction::Cancel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
    }
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BookingStatus {
    /// Next status for a provider-initiated action, or `None` when the
    /// transition graph has no such edge. `pending -> expired` is not an
    /// action; it only arrives from the server.
    pub fn transition(&self, action: BookingAction) -> Option<BookingStatus> {
        match (self, action) {
            (BookingStatus::Pending, BookingAction::Accept) => Some(BookingStatus::Accepted),
            (BookingStatus::Pending, BookingAction::Decline) => Some(BookingStatus::Declined),
            (BookingStatus::Accepted, BookingAction::Start) => Some(BookingStatus::InProgress),
            (BookingStatus::Accepted, BookingAction::Cancel) => Some(BookingStatus::Cancelled),
            (BookingStatus::InProgress, BookingAction::Complete) => Some(BookingStatus::Completed),
            (BookingStatus::InProgress, BookingAction::Cancel) => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition(&self, action: BookingAction) -> bool {
        self.transition(action).is_some()
    }
}

pub fn legal_actions(status: &BookingStatus) -> Vec<BookingAction> {
    BookingAction::ALL
        .into_iter()
        .filter(|action| status.can_transition(*action))
        .collect()
}
