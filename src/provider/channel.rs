//! # Session Channel
//!
//! Once a wallet has started a session it exposes a bidirectional, encrypted
//! message pipe. The handshake only relays messages through it; it never
//! decrypts or inspects them.

use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Result;

/// Callback invoked by a channel for each inbound message.
pub type MessageHandler = Box<dyn Fn(Value) + Send + Sync>;

/// Transport supplied by the wallet for an established session.
pub trait SessionChannel: Send + Sync {
    /// Send a message to the wallet.
    fn send(&self, message: &Value) -> impl Future<Output = Result<()>> + Send;

    /// Register `handler` to receive inbound messages.
    ///
    /// Behaviour on repeated registration is up to the channel and must not
    /// be relied upon.
    fn listen(&self, handler: MessageHandler) -> impl Future<Output = Result<()>> + Send;

    /// Release the channel.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Proof material returned by the wallet when starting a session. This is
/// what the backend checks against the challenge it issued.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionProof {
    /// The wallet's encryption key for this session.
    pub encryption_key_uri: String,

    /// The challenge, encrypted for the dApp.
    pub encrypted_challenge: String,

    /// Nonce used to encrypt the challenge.
    pub nonce: String,
}

/// A live session started by a wallet provider.
///
/// A session belongs to exactly one negotiation and is never shared between
/// attestation requests.
#[derive(Debug)]
pub struct Session<C> {
    id: Uuid,
    proof: SessionProof,
    channel: C,
}

impl<C: SessionChannel> Session<C> {
    /// Wrap the proof and channel returned by a wallet.
    pub fn new(proof: SessionProof, channel: C) -> Self {
        Self { id: Uuid::new_v4(), proof, channel }
    }

    /// Local identifier distinguishing this session from any other.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The session's proof material.
    #[must_use]
    pub const fn proof(&self) -> &SessionProof {
        &self.proof
    }

    /// The underlying channel.
    #[must_use]
    pub const fn channel(&self) -> &C {
        &self.channel
    }

    /// Send a message through the channel.
    ///
    /// # Errors
    /// Returns the channel's error unchanged.
    pub async fn send(&self, message: &Value) -> Result<()> {
        self.channel.send(message).await
    }

    /// Register a handler for inbound messages.
    ///
    /// # Errors
    /// Returns the channel's error unchanged.
    pub async fn listen(&self, handler: MessageHandler) -> Result<()> {
        self.channel.listen(handler).await
    }

    /// Close the channel.
    ///
    /// # Errors
    /// Returns the channel's error unchanged.
    pub async fn close(&self) -> Result<()> {
        self.channel.close().await
    }
}

/// Typed view of the opaque messages carried by a session channel.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessage {
    /// Key the message is encrypted for.
    pub receiver_key_uri: String,

    /// Key of the sender.
    pub sender_key_uri: String,

    /// Encrypted payload.
    pub ciphertext: String,

    /// Encryption nonce.
    pub nonce: String,

    /// Milliseconds since the Unix epoch at which the message was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<i64>,
}

impl EncryptedMessage {
    /// Mark the message as received now.
    #[must_use]
    pub fn received(mut self) -> Self {
        self.received_at = Some(Utc::now().timestamp_millis());
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn proof_wire_format() {
        let proof: SessionProof = serde_json::from_value(json!({
            "encryptionKeyUri": "did:kilt:light:00abc#encryption",
            "encryptedChallenge": "0x1234",
            "nonce": "0x5678"
        }))
        .expect("should deserialize");

        assert_eq!(proof.encryption_key_uri, "did:kilt:light:00abc#encryption");
        assert_eq!(proof.encrypted_challenge, "0x1234");
        assert_eq!(proof.nonce, "0x5678");
    }

    #[test]
    fn received_at_optional() {
        let msg = EncryptedMessage {
            receiver_key_uri: "did:kilt:dapp#encryption".into(),
            sender_key_uri: "did:kilt:wallet#encryption".into(),
            ciphertext: "0xdeadbeef".into(),
            nonce: "0x01".into(),
            received_at: None,
        };
        let value = serde_json::to_value(&msg).expect("should serialize");
        assert!(value.get("receivedAt").is_none());
        assert_eq!(value["receiverKeyUri"], "did:kilt:dapp#encryption");

        let stamped = msg.received();
        assert!(stamped.received_at.is_some_and(|at| at > 0));
    }
}
