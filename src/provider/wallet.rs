//! # Wallet Provider
//!
//! Capabilities of a single injected wallet extension.

use std::future::Future;

use serde::{Deserialize, Serialize};

use super::{Result, Session, SessionChannel};

/// A wallet extension made available by the host environment.
///
/// Errors returned by the provider are surfaced to callers unchanged as
/// [`crate::Error::ProviderFailure`].
pub trait WalletProvider: Send + Sync {
    /// The channel type backing sessions started by this provider.
    type Channel: SessionChannel;

    /// Name the extension registered itself under.
    fn name(&self) -> &str;

    /// Extension release version.
    fn version(&self) -> &str;

    /// Version of the extension API the provider implements (e.g. `3.0`).
    fn spec_version(&self) -> &str;

    /// Start an encrypted session with the dApp identified by `dapp_name` and
    /// `dapp_encryption_key_uri`, answering `challenge`.
    ///
    /// The wallet may wait on the user for an unbounded amount of time before
    /// resolving.
    fn start_session(
        &self, dapp_name: &str, dapp_encryption_key_uri: &str, challenge: &str,
    ) -> impl Future<Output = Result<Session<Self::Channel>>> + Send;

    /// Sign `data` with the key referenced by `did_key_uri`.
    fn sign_with_did(
        &self, data: &str, did_key_uri: &str,
    ) -> impl Future<Output = Result<DidSignature>> + Send;

    /// List the DIDs the wallet controls.
    fn get_did_list(&self) -> impl Future<Output = Result<Vec<DidEntry>>> + Send;
}

/// Signature produced by [`WalletProvider::sign_with_did`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidSignature {
    /// Key used to sign.
    pub did_key_uri: String,

    /// Encoded signature.
    pub signature: String,
}

/// An entry returned by [`WalletProvider::get_did_list`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DidEntry {
    /// The DID.
    pub did: String,
}
