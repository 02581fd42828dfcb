pub mod booking_actions;
pub mod booking_queries;
pub mod bootstrap;
pub mod commands;
pub mod countdown_clock;
pub mod profile_store;
pub mod profile_sync;
