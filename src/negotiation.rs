//! # Session Negotiation
//!
//! Drives one wallet provider through the challenge/response handshake:
//!
//! 1. request a fresh challenge from the backend,
//! 2. hand the challenge to the wallet to start an encrypted session,
//! 3. submit the session's proof to the backend,
//! 4. keep the session together with the reference the backend issued.
//!
//! A negotiator is good for a single attempt. Any failure leaves it in
//! [`Status::Failed`]; starting over means creating a new negotiator, which
//! requests a new challenge.
//!
//! The backend ties the challenge to a cookie session. Build the
//! negotiator's client with
//! [`BackendClient::for_attempt`](crate::http::BackendClient::for_attempt)
//! and hand a clone of it to the credential exchange that follows.
//!
//! No timeout is applied: the wallet may wait on its user indefinitely.
//! Dropping the future returned by [`SessionNegotiator::negotiate`] abandons
//! the attempt; requests already sent are not recalled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::challenge::{ChallengeClient, SessionReference};
use crate::error::{Error, Result};
use crate::provider::{Session, WalletProvider};

/// Negotiation status values.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename = "NegotiationStatus")]
pub enum Status {
    /// Negotiation has not started.
    #[default]
    Idle,

    /// A challenge has been requested from the backend.
    ChallengeRequested,

    /// The wallet has been asked to start a session.
    ProviderStarting,

    /// The session proof has been submitted to the backend.
    ProofSubmitted,

    /// The backend accepted the session.
    Established,

    /// Negotiation failed, with an error message.
    Failed(String),
}

/// An authenticated session and the backend's reference to it.
#[derive(Debug)]
pub struct Established<C> {
    /// The live session.
    pub session: Session<C>,

    /// Reference issued by the backend for `session`.
    pub reference: SessionReference,

    /// When the backend accepted the session.
    pub established_at: DateTime<Utc>,
}

/// Negotiates a single session.
#[derive(Clone, Debug)]
pub struct SessionNegotiator {
    client: ChallengeClient,
    status: Status,
}

impl SessionNegotiator {
    /// Create an idle negotiator.
    #[must_use]
    pub const fn new(client: ChallengeClient) -> Self {
        Self { client, status: Status::Idle }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    /// Run the handshake with `provider`.
    ///
    /// # Errors
    /// - [`Error::NoProvider`] if `provider` is `None`. No request is made.
    /// - [`Error::InvalidState`] if the negotiator has already been used.
    /// - [`Error::ChallengeUnavailable`] or [`Error::SessionRejected`] if the
    ///   backend refuses a step.
    /// - [`Error::ProviderFailure`] if the wallet fails to start the session.
    #[instrument(level = "debug", skip_all)]
    pub async fn negotiate<P: WalletProvider>(
        &mut self, provider: Option<&P>,
    ) -> Result<Established<P::Channel>> {
        tracing::debug!("SessionNegotiator::negotiate");

        if self.status != Status::Idle {
            let e = Error::InvalidState(format!("negotiation already {:?}", self.status));
            tracing::error!(target: "SessionNegotiator::negotiate", ?e);
            return Err(e);
        }
        let Some(provider) = provider else {
            return Err(self.fail(Error::NoProvider));
        };

        match self.run(provider).await {
            Ok(established) => Ok(established),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run<P: WalletProvider>(&mut self, provider: &P) -> Result<Established<P::Channel>> {
        self.transition(Status::ChallengeRequested);
        let challenge = self.client.request_challenge().await?;

        self.transition(Status::ProviderStarting);
        tracing::debug!(
            provider = provider.name(),
            version = provider.version(),
            "starting session"
        );
        let session = provider
            .start_session(
                &challenge.dapp_name,
                &challenge.dapp_encryption_key_uri,
                &challenge.challenge,
            )
            .await
            .map_err(Error::ProviderFailure)?;

        self.transition(Status::ProofSubmitted);
        let reference = self.client.submit_challenge_proof(&session).await?;

        self.transition(Status::Established);
        Ok(Established { session, reference, established_at: Utc::now() })
    }

    fn transition(&mut self, status: Status) {
        tracing::debug!(from = ?self.status, to = ?status, "negotiation transition");
        self.status = status;
    }

    fn fail(&mut self, e: Error) -> Error {
        tracing::error!(target: "SessionNegotiator::negotiate", ?e);
        self.status = Status::Failed(e.to_string());
        e
    }
}
