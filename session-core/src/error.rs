use thiserror::Error;

/// Closed error set produced by the credential gate.
///
/// Provider-specific error shapes are normalized into this at the gate
/// boundary; nothing downstream branches on raw provider codes, and raw
/// provider text is never shown to the user.
#[derive(Debug, Error)]
pub enum GateError {
    /// Local policy violation; never reaches the throttle or the provider.
    #[error("{0}")]
    Validation(String),

    /// The throttle rejected the attempt locally, no provider call was made.
    #[error("too many attempts, try again in {0} seconds")]
    Lockout(u64),

    /// The provider rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredential,

    /// Any other provider failure (network, outage). Counts against the
    /// lockout exactly like a credential failure, so the two conditions are
    /// indistinguishable from the outside.
    #[error("authentication failed: {0}")]
    Unknown(String),

    /// Attempt or session storage failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
