pub mod guard;
pub mod metrics;
pub mod rate_limit;
pub mod tracing;
