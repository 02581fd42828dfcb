pub mod activity_log;
pub mod api_client;
pub mod config;
pub mod connectivity;
pub mod credential_store;
pub mod error;
pub mod profile_repository;
pub mod query_cache;
pub mod storage;
