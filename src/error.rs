//! # Session Errors
//!
//! Every step of the handshake fails with its own error kind so a caller can
//! tell which exchange with the backend or wallet went wrong. No step retries:
//! a challenge is single-use, so recovering from any failure means starting a
//! new negotiation.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while negotiating a session or exchanging a credential.
#[derive(Error, Debug)]
pub enum Error {
    /// No wallet provider was supplied. This is a caller precondition and is
    /// not retryable until a provider is available.
    #[error("no wallet provider")]
    NoProvider,

    /// The backend did not issue a challenge.
    #[error("no valid challenge received: {status}: {body}")]
    ChallengeUnavailable {
        /// Status returned by the backend.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },

    /// The backend did not accept the session proof.
    #[error("session rejected: {status}: {body}")]
    SessionRejected {
        /// Status returned by the backend.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },

    /// The backend did not issue terms for the attestation.
    #[error("terms unavailable: {status}: {body}")]
    TermsUnavailable {
        /// Status returned by the backend.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },

    /// The backend did not accept the wallet's credential request.
    #[error("credential rejected: {status}: {body}")]
    CredentialRejected {
        /// Status returned by the backend.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },

    /// The wallet extension failed. The provider's error is passed through
    /// unchanged.
    #[error("provider failure: {0}")]
    ProviderFailure(#[source] anyhow::Error),

    /// The session channel released its listener without delivering a reply.
    #[error("session channel closed before a reply was received")]
    ChannelClosed,

    /// A session reference was presented with a session it was not issued for.
    #[error("session reference {reference} was not issued for this session")]
    SessionMismatch {
        /// The offending reference.
        reference: String,
    },

    /// The operation is not valid in the negotiator's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Backend endpoints could not be discovered.
    #[error("endpoints unavailable: {0}")]
    EndpointsUnavailable(String),

    /// The backend answered with a success status but an unreadable body.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be sent or its response could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error came from the backend refusing one of the handshake
    /// steps (as opposed to the wallet, the transport or the caller).
    #[must_use]
    pub const fn is_backend_rejection(&self) -> bool {
        matches!(
            self,
            Self::ChallengeUnavailable { .. }
                | Self::SessionRejected { .. }
                | Self::TermsUnavailable { .. }
                | Self::CredentialRejected { .. }
        )
    }

    /// The HTTP status that caused a backend rejection, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ChallengeUnavailable { status, .. }
            | Self::SessionRejected { status, .. }
            | Self::TermsUnavailable { status, .. }
            | Self::CredentialRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_rejections() {
        let err = Error::TermsUnavailable {
            status: StatusCode::NOT_FOUND,
            body: "unknown attestation".into(),
        };
        assert!(err.is_backend_rejection());
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.to_string(), "terms unavailable: 404 Not Found: unknown attestation");

        let err = Error::ProviderFailure(anyhow::anyhow!("user declined"));
        assert!(!err.is_backend_rejection());
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "provider failure: user declined");
    }
}
