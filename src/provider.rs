//! # Provider
//!
//! The provider traits exported by this module are implemented by the host
//! environment to expose injected wallet extensions to the handshake: starting
//! an encrypted session, signing with a DID, and the session channel itself.
//!
//! See individual trait documentation for specific details.

mod channel;
mod wallet;

pub use channel::{EncryptedMessage, MessageHandler, Session, SessionChannel, SessionProof};
pub use wallet::{DidEntry, DidSignature, WalletProvider};

/// Re-export `anyhow::Result` as provider methods report failures with it.
pub type Result<T> = anyhow::Result<T>;
