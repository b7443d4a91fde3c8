//! Session and access-control core for the admin area.
//!
//! Everything in this crate is transport-free: time comes from an injected
//! [`Clock`], persistence goes through the [`store::KvStore`] trait, and the
//! route-guard decision is a pure function. The `admin-frontend` service
//! wires these pieces to HTTP, Redis and the remote identity provider.

pub mod attempts;
pub mod clock;
pub mod error;
pub mod guard;
pub mod sessions;
pub mod store;
pub mod throttle;

pub use attempts::{AttemptStore, LoginAttemptRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::GateError;
pub use guard::{decide, GuardDecision};
pub use sessions::{SessionMonitor, SessionVerdict};
pub use store::{KvStore, MemoryStore};
pub use throttle::{AttemptDecision, AuthThrottleService, LockoutPolicy};
