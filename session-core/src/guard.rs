/// Outcome for one render of the protected subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Identity backend state is still unresolved; show a loading indicator
    /// and make no redirect decision yet.
    Loading,
    /// No identity, or the local idle session lapsed; clear residual session
    /// state and bounce to the login entry point.
    Redirect,
    /// Identity present and the local session is live.
    Render,
}

/// Pure route-guard decision.
///
/// Loading wins while the identity state is unresolved. After that, an
/// expired local session overrides a still-valid provider token; the
/// provider's own expiry alone is never trusted.
pub fn decide(identity_present: bool, identity_loading: bool, session_valid: bool) -> GuardDecision {
    if identity_loading {
        GuardDecision::Loading
    } else if identity_present && session_valid {
        GuardDecision::Render
    } else {
        GuardDecision::Redirect
    }
}
