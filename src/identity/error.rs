use thiserror::Error;

/// Failure reported by an [`IdentityClient`](super::IdentityClient).
///
/// The display string is what ends up in the response body, so `Rejected`
/// renders the provider's own message untouched.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider could not be reached or the connection broke mid-request.
    #[error("identity provider unreachable: {0}")]
    Transport(String),

    /// The provider answered and refused the request (bad credentials,
    /// expired token, duplicate account, ...).
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The provider answered with a body we could not make sense of.
    #[error("unexpected identity provider response: {0}")]
    InvalidResponse(String),
}

impl IdentityError {
    /// `true` for failures that never reached a provider decision.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// HTTP status the provider answered with, if it answered at all.
    #[must_use]
    pub const fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(_) | Self::InvalidResponse(_) => None,
        }
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
