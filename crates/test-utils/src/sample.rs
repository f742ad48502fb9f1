//! Sample payloads returned by a mocked attestation backend.

use attester_session::EncryptedMessage;
use serde_json::{json, Value};

/// Name the sample backend presents to wallets.
pub const DAPP_NAME: &str = "Attester";

/// Encryption key of the sample backend.
pub const DAPP_KEY_URI: &str =
    "did:kilt:4pnfkRn5UurBJTW92d9TaVLR2CqJdY4z5HPjrEbpGyBykare#0x5ed5bf5c1f1cbc8b0a6ae9cbd5cd7f2ef4f4e2f2";

/// Challenge JSON as returned by `GET /challenge`.
#[must_use]
pub fn challenge(challenge: &str) -> Value {
    json!({
        "dAppName": DAPP_NAME,
        "dAppEncryptionKeyUri": DAPP_KEY_URI,
        "challenge": challenge,
    })
}

/// Encrypted terms message as returned by `POST /credential/terms/..`.
#[must_use]
pub fn terms(receiver_key_uri: &str) -> Value {
    let message = EncryptedMessage {
        receiver_key_uri: receiver_key_uri.into(),
        sender_key_uri: DAPP_KEY_URI.into(),
        ciphertext: "0x9a1c7b5e2f".into(),
        nonce: "0x4f3e2d1c0b0a".into(),
        received_at: None,
    };
    serde_json::to_value(message).expect("should serialize")
}

/// Encrypted credential request a wallet sends in reply to terms.
#[must_use]
pub fn credential_request(sender_key_uri: &str) -> Value {
    let message = EncryptedMessage {
        receiver_key_uri: DAPP_KEY_URI.into(),
        sender_key_uri: sender_key_uri.into(),
        ciphertext: "0x77c0ffee".into(),
        nonce: "0x0102030405".into(),
        received_at: None,
    }
    .received();
    serde_json::to_value(message).expect("should serialize")
}
