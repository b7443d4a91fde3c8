pub mod auth_gate;
pub mod identity_client;
pub mod metrics;
pub mod redis_store;
pub mod session_sweeper;
