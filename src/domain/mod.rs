pub mod countdown;
pub mod grouping;
pub mod lifecycle;
pub mod models;
pub mod reconciliation;
pub mod status_display;
