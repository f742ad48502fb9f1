//! # Attestation Request
//!
//! The end-to-end flow behind a holder's "request attestation" action:
//! negotiate a fresh session with the chosen wallet, then exchange the
//! credential for the attestation over it.
//!
//! Each call owns its own negotiator and therefore its own challenge, session
//! and session reference. It also talks to the backend through its own
//! cookie session (see [`BackendClient::for_attempt`]), so concurrent calls
//! for different attestations never see each other's challenge.

use tracing::instrument;

use crate::challenge::ChallengeClient;
use crate::error::Result;
use crate::exchange::CredentialExchange;
use crate::http::BackendClient;
use crate::negotiation::SessionNegotiator;
use crate::provider::WalletProvider;

/// Request the credential for `attestation_id` using `provider`.
///
/// # Errors
/// Returns the first error raised by negotiation or by the credential
/// exchange. The attempt is all-or-nothing: nothing is retried.
#[instrument(level = "debug", skip(backend, provider))]
pub async fn request_attestation<P: WalletProvider>(
    backend: &BackendClient, provider: Option<&P>, attestation_id: &str,
) -> Result<()> {
    tracing::debug!("request_attestation");

    let backend = backend.for_attempt()?;
    let mut negotiator = SessionNegotiator::new(ChallengeClient::new(backend.clone()));
    let established = negotiator.negotiate(provider).await?;

    CredentialExchange::new(backend)
        .request_credential(&established.session, &established.reference, attestation_id)
        .await
}
