//! # Credential Exchange
//!
//! Uses an established session to request a credential for one attestation:
//!
//! 1. fetch the attestation terms from the backend,
//! 2. listen on the session, then send the terms to the wallet,
//! 3. wait for the wallet's single reply,
//! 4. post the reply to the backend.
//!
//! The listener is always attached before the terms are sent so a fast reply
//! cannot be missed. Exactly one reply is expected; anything the wallet sends
//! afterwards is ignored.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::instrument;

use crate::challenge::SessionReference;
use crate::error::{Error, Result};
use crate::http::{status_and_body, BackendClient};
use crate::provider::{MessageHandler, Session, SessionChannel};

/// Body of the terms request.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TermsRequest {
    /// The session reference.
    pub challenge: String,

    /// The attestation the terms are for.
    pub attestation_id: String,
}

/// A reply slot that can be filled at most once.
///
/// Clones share the slot. The first call to [`OnceReply::settle`] delivers its
/// value to the paired receiver; later calls do nothing. If every clone is
/// dropped without a delivery, the receiver resolves with an error.
#[derive(Clone, Debug)]
pub struct OnceReply {
    slot: Arc<Mutex<Option<oneshot::Sender<Value>>>>,
}

impl OnceReply {
    /// Create a reply slot and the receiver it settles.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        (Self { slot: Arc::new(Mutex::new(Some(tx))) }, rx)
    }

    /// Deliver `value` if no value has been delivered yet. Returns whether
    /// this call delivered it.
    pub fn settle(&self, value: Value) -> bool {
        let sender = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        sender.is_some_and(|tx| tx.send(value).is_ok())
    }

    /// Whether the slot has been used.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    /// A channel handler that settles this slot with the first message it
    /// receives.
    #[must_use]
    pub fn handler(&self) -> MessageHandler {
        let reply = self.clone();
        Box::new(move |message| {
            if !reply.settle(message) {
                tracing::debug!(target: "OnceReply", "reply already received, ignoring message");
            }
        })
    }
}

/// Requests credentials over established sessions.
#[derive(Clone, Debug)]
pub struct CredentialExchange {
    backend: BackendClient,
}

impl CredentialExchange {
    /// Create an exchange using `backend`.
    #[must_use]
    pub const fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Request the credential for `attestation_id` over `session`.
    ///
    /// Completes once the backend accepts the wallet's reply. The session is
    /// closed before returning, whatever the outcome, unless `reference` does
    /// not belong to `session`.
    ///
    /// # Errors
    /// - [`Error::SessionMismatch`] if `reference` was not issued for
    ///   `session`. No request is made.
    /// - [`Error::TermsUnavailable`] or [`Error::CredentialRejected`] if the
    ///   backend refuses a step.
    /// - [`Error::ProviderFailure`] if listening on or sending through the
    ///   session fails.
    /// - [`Error::ChannelClosed`] if the session drops the listener without
    ///   replying.
    #[instrument(level = "debug", skip(self, session, reference), fields(reference = %reference))]
    pub async fn request_credential<C: SessionChannel>(
        &self, session: &Session<C>, reference: &SessionReference, attestation_id: &str,
    ) -> Result<()> {
        tracing::debug!("CredentialExchange::request_credential");

        if !reference.is_bound_to(session) {
            let e = Error::SessionMismatch { reference: reference.to_string() };
            tracing::error!(target: "CredentialExchange::request_credential", ?e);
            return Err(e);
        }

        let result = self.exchange(session, reference, attestation_id).await;
        if let Err(e) = session.close().await {
            tracing::warn!(
                target: "CredentialExchange::request_credential", ?e, "failed to close session"
            );
        }

        result.map_err(|e| {
            tracing::error!(target: "CredentialExchange::request_credential", ?e);
            e
        })
    }

    async fn exchange<C: SessionChannel>(
        &self, session: &Session<C>, reference: &SessionReference, attestation_id: &str,
    ) -> Result<()> {
        let terms = self.terms(reference, attestation_id).await?;
        let reply = relay(session, &terms).await?;
        self.submit(reference, attestation_id, &reply).await
    }

    async fn terms(&self, reference: &SessionReference, attestation_id: &str) -> Result<Value> {
        let request = TermsRequest {
            challenge: reference.to_string(),
            attestation_id: attestation_id.to_string(),
        };
        let path = format!("credential/terms/{reference}/{attestation_id}");

        let response = self.backend.post(&path, &request).await?;
        if !response.status().is_success() {
            let (status, body) = status_and_body(response).await;
            return Err(Error::TermsUnavailable { status, body });
        }
        response.json::<Value>().await.map_err(|e| Error::InvalidResponse(format!("terms: {e}")))
    }

    async fn submit(
        &self, reference: &SessionReference, attestation_id: &str, reply: &Value,
    ) -> Result<()> {
        let path = format!("credential/{reference}/{attestation_id}");

        let response = self.backend.post(&path, reply).await?;
        if !response.status().is_success() {
            let (status, body) = status_and_body(response).await;
            return Err(Error::CredentialRejected { status, body });
        }
        Ok(())
    }
}

// Listen, then send, then wait for the one reply. Failures from either channel
// call surface through the same error path as a missing reply.
async fn relay<C: SessionChannel>(session: &Session<C>, terms: &Value) -> Result<Value> {
    let (reply, received) = OnceReply::new();

    session.listen(reply.handler()).await.map_err(Error::ProviderFailure)?;
    tracing::debug!("listener attached, sending terms");
    session.send(terms).await.map_err(Error::ProviderFailure)?;

    // only the channel's handler may settle the reply from here on
    drop(reply);
    received.await.map_err(|_| Error::ChannelClosed)
}
