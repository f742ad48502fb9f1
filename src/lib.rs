//! # Attester Session
//!
//! Client side of the credential-session handshake between an attestation
//! service, a browser-injected wallet extension and the wallet's user.
//!
//! The crate does not provide a user interface or the wallet transport - those
//! are supplied by the host application through the [`provider`] traits.
//!
//! # Design
//!
//! ** Flow **
//!
//! A holder's request for an attestation runs in two phases, each owning its
//! own state for exactly one attempt:
//!
//! - [`negotiation::SessionNegotiator`] obtains a fresh challenge from the
//!   backend ([`challenge::ChallengeClient`]), has the wallet start an
//!   encrypted session answering it, and submits the session's proof to obtain
//!   a backend-issued [`challenge::SessionReference`].
//! - [`exchange::CredentialExchange`] uses the session and its reference to
//!   fetch the attestation terms, relay them to the wallet, and post the
//!   wallet's reply back to the backend.
//!
//! [`attestation::request_attestation`] runs both phases.
//!
//! ** Provider **
//!
//! Wallet extensions are modelled by [`provider::WalletProvider`], their
//! encrypted message pipe by [`provider::SessionChannel`]. The host registers
//! the extensions it discovers with a [`registry::ExtensionRegistry`], which
//! selects the ones implementing a supported version of the extension API.
//!
//! ** Errors **
//!
//! Every step fails with its own [`Error`] kind. Nothing is retried: a
//! challenge is single-use, so a failed attempt has to start over.

pub mod attestation;
pub mod challenge;
pub mod config;
pub mod endpoints;
mod error;
pub mod exchange;
pub mod http;
pub mod negotiation;
pub mod provider;
pub mod registry;

pub use attestation::request_attestation;
pub use challenge::{Challenge, ChallengeClient, SessionReference};
pub use config::Config;
pub use endpoints::Endpoints;
pub use error::{Error, Result};
pub use exchange::{CredentialExchange, OnceReply, TermsRequest};
pub use http::BackendClient;
pub use negotiation::{Established, SessionNegotiator, Status};
pub use provider::{
    DidEntry, DidSignature, EncryptedMessage, MessageHandler, Session, SessionChannel,
    SessionProof, WalletProvider,
};
pub use registry::{ExtensionRegistry, HostEvents, SUPPORTED_SPEC_VERSION};
