use crate::domain::models::Booking;
use chrono::Datelike;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingSection {
    pub title: String,
    pub items: Vec<Booking>,
}

pub fn group_bookings(bookings: Vec<Booking>) -> Vec<BookingSection> {
    group_bookings_in(bookings, &chrono_tz::UTC)
}

/// Newest month first, newest booking first inside each month. Bookings
/// sharing a `created_at` keep their input order.
pub fn group_bookings_in(mut bookings: Vec<Booking>, timezone: &Tz) -> Vec<BookingSection> {
    bookings.sort_by(|left, right| right.created_at.cmp(&left.created_at));

    let mut buckets: BTreeMap<(i32, u32), Vec<Booking>> = BTreeMap::new();
    for booking in bookings {
        let local = booking.created_at.with_timezone(timezone);
        buckets
            .entry((local.year(), local.month()))
            .or_default()
            .push(booking);
    }

    // Section order comes from the bucket key, not from insertion order.
    buckets
        .into_iter()
        .rev()
        .filter_map(|(_, items)| {
            let title = items
                .first()
                .map(|first| first.created_at.with_timezone(timezone).format("%B %Y").to_string())?;
            Some(BookingSection { title, items })
        })
        .collect()
}
