//! # Challenge Client
//!
//! Requests a fresh challenge from the backend and submits the wallet's
//! answer to it. A challenge is single-use: the client never caches one and
//! each negotiation requests its own.

use std::fmt::{self, Display};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::http::{status_and_body, BackendClient};
use crate::provider::{Session, SessionChannel};

const CHALLENGE_PATH: &str = "challenge";

/// A challenge issued by the backend for one negotiation attempt.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Challenge {
    /// Name the dApp presents to the wallet.
    #[serde(rename = "dAppName")]
    pub dapp_name: String,

    /// The dApp's encryption key.
    #[serde(rename = "dAppEncryptionKeyUri")]
    pub dapp_encryption_key_uri: String,

    /// The challenge itself. Byte-array challenges are normalised to a
    /// `0x`-prefixed hex string.
    #[serde(deserialize_with = "string_or_bytes")]
    pub challenge: String,
}

/// Backend-issued identifier for an accepted session.
///
/// A reference is bound to the session whose proof it was issued for and is
/// only valid alongside that session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReference {
    value: String,
    session_id: Uuid,
}

impl SessionReference {
    /// Bind a backend-issued reference to the session it was issued for.
    #[must_use]
    pub fn new(value: impl Into<String>, session_id: Uuid) -> Self {
        Self { value: value.into(), session_id }
    }

    /// The reference as issued by the backend.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Identifier of the session this reference belongs to.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether the reference was issued for `session`.
    #[must_use]
    pub fn is_bound_to<C: SessionChannel>(&self, session: &Session<C>) -> bool {
        self.session_id == session.id()
    }
}

impl Display for SessionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Client for the backend's challenge endpoint.
#[derive(Clone, Debug)]
pub struct ChallengeClient {
    backend: BackendClient,
}

impl ChallengeClient {
    /// Create a challenge client using `backend`.
    #[must_use]
    pub const fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Request a fresh challenge.
    ///
    /// # Errors
    /// Returns [`Error::ChallengeUnavailable`] if the backend answers with a
    /// non-success status, or a transport error if it cannot be reached.
    #[instrument(level = "debug", skip(self))]
    pub async fn request_challenge(&self) -> Result<Challenge> {
        tracing::debug!("ChallengeClient::request_challenge");

        let response = self.backend.get(CHALLENGE_PATH).await.map_err(|e| {
            tracing::error!(target: "ChallengeClient::request_challenge", ?e);
            e
        })?;
        if !response.status().is_success() {
            let (status, body) = status_and_body(response).await;
            let e = Error::ChallengeUnavailable { status, body };
            tracing::error!(target: "ChallengeClient::request_challenge", ?e);
            return Err(e);
        }

        response.json::<Challenge>().await.map_err(|e| {
            let e = Error::InvalidResponse(format!("challenge: {e}"));
            tracing::error!(target: "ChallengeClient::request_challenge", ?e);
            e
        })
    }

    /// Submit the session's proof of the challenge and obtain the backend's
    /// reference for the session.
    ///
    /// # Errors
    /// Returns [`Error::SessionRejected`] if the backend answers with a
    /// non-success status or without a usable reference, or a transport error
    /// if it cannot be reached.
    #[instrument(level = "debug", skip(self, session), fields(session = %session.id()))]
    pub async fn submit_challenge_proof<C: SessionChannel>(
        &self, session: &Session<C>,
    ) -> Result<SessionReference> {
        tracing::debug!("ChallengeClient::submit_challenge_proof");

        let response = self.backend.post(CHALLENGE_PATH, session.proof()).await.map_err(|e| {
            tracing::error!(target: "ChallengeClient::submit_challenge_proof", ?e);
            e
        })?;
        let (status, body) = status_and_body(response).await;
        if !status.is_success() {
            let e = Error::SessionRejected { status, body };
            tracing::error!(target: "ChallengeClient::submit_challenge_proof", ?e);
            return Err(e);
        }

        let Some(reference) = parse_reference(&body) else {
            let e = Error::SessionRejected { status, body: "no session reference".into() };
            tracing::error!(target: "ChallengeClient::submit_challenge_proof", ?e);
            return Err(e);
        };
        Ok(SessionReference::new(reference, session.id()))
    }
}

// The reference is usually a JSON string but older backends answer with an
// object carrying the id, or with bare text. JSON that is neither a scalar id
// nor such an object carries no reference.
fn parse_reference(body: &str) -> Option<String> {
    let reference = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map.get("sessionId").or_else(|| map.get("id")).and_then(id)?,
        Ok(value) => id(&value)?,
        Err(_) => body.to_string(),
    };
    let reference = reference.trim().to_string();
    (!reference.is_empty()).then_some(reference)
}

fn id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_bytes<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s,
        Repr::Bytes(b) => format!("0x{}", hex::encode(b)),
    })
}
