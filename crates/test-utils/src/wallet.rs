//! A wallet provider for tests.
//!
//! The wallet records every `start_session` call and hands out channels that
//! log their `listen`, `send` and `close` calls in order. How the wallet and
//! its channels behave (reply, stay silent, fail) is set when it is built.

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use attester_session::provider::Result;
use attester_session::{
    DidEntry, DidSignature, MessageHandler, Session, SessionChannel, SessionProof, WalletProvider,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{SecretKey, Signer, SigningKey};
use serde_json::Value;
use uuid::Uuid;

const WALLET_DID: &str = "did:kilt:4rrVTLAXgeoE8jo8si571HnqHWd5WUr5qaM7KYVWjv6V4cDW";
const WALLET_SECRET: &str = "Y1KNbzOcX112pXI3v6sFvcr8uBLw4Pc2ciZTWdZx-As";

/// A call made on a [`Channel`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// `listen` was called.
    Listen,

    /// `send` was called with the message.
    Send(Value),

    /// `close` was called.
    Close,
}

/// Arguments passed to [`Wallet::start_session`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct StartArgs {
    pub dapp_name: String,
    pub dapp_encryption_key_uri: String,
    pub challenge: String,
}

/// How a channel responds to `send`.
#[derive(Clone, Debug, Default)]
pub enum Reply {
    /// Deliver a credential request addressed from the wallet's key.
    #[default]
    CredentialRequest,

    /// Deliver this message.
    Message(Value),

    /// Deliver this message twice.
    Twice(Value),

    /// Drop the registered handler without replying.
    HangUp,
}

#[derive(Clone, Debug, Default)]
struct Behaviour {
    reply: Reply,
    fail_start: Option<String>,
    fail_listen: Option<String>,
    fail_send: Option<String>,
    fail_close: Option<String>,
}

/// Recording wallet provider.
#[derive(Clone, Debug)]
pub struct Wallet {
    name: String,
    version: String,
    spec_version: String,
    behaviour: Behaviour,
    started: Arc<Mutex<Vec<StartArgs>>>,
    channels: Arc<Mutex<Vec<Channel>>>,
}

impl Wallet {
    /// A wallet named `name` implementing `spec_version` of the extension API.
    #[must_use]
    pub fn new(name: &str, spec_version: &str) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".into(),
            spec_version: spec_version.into(),
            behaviour: Behaviour::default(),
            started: Arc::new(Mutex::new(Vec::new())),
            channels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Channels reply to `send` as given.
    #[must_use]
    pub fn replying(mut self, reply: Reply) -> Self {
        self.behaviour.reply = reply;
        self
    }

    /// `start_session` fails with `msg`.
    #[must_use]
    pub fn failing_start(mut self, msg: &str) -> Self {
        self.behaviour.fail_start = Some(msg.into());
        self
    }

    /// Channel `listen` fails with `msg`.
    #[must_use]
    pub fn failing_listen(mut self, msg: &str) -> Self {
        self.behaviour.fail_listen = Some(msg.into());
        self
    }

    /// Channel `send` fails with `msg`.
    #[must_use]
    pub fn failing_send(mut self, msg: &str) -> Self {
        self.behaviour.fail_send = Some(msg.into());
        self
    }

    /// Channel `close` fails with `msg`.
    #[must_use]
    pub fn failing_close(mut self, msg: &str) -> Self {
        self.behaviour.fail_close = Some(msg.into());
        self
    }

    /// Arguments of every `start_session` call so far.
    #[must_use]
    pub fn started(&self) -> Vec<StartArgs> {
        self.started.lock().expect("should lock").clone()
    }

    /// Channels handed out so far.
    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.lock().expect("should lock").clone()
    }

    /// The wallet's encryption key.
    #[must_use]
    pub fn key_uri(&self) -> String {
        format!("{WALLET_DID}#{}", self.name.to_lowercase())
    }

    fn sign(msg: &[u8]) -> Result<Vec<u8>> {
        let decoded = Base64UrlUnpadded::decode_vec(WALLET_SECRET)?;
        let secret_key: SecretKey =
            decoded.try_into().map_err(|_| anyhow!("invalid secret key"))?;
        let signing_key = SigningKey::from_bytes(&secret_key);
        Ok(signing_key.sign(msg).to_bytes().to_vec())
    }
}

impl WalletProvider for Wallet {
    type Channel = Channel;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn spec_version(&self) -> &str {
        &self.spec_version
    }

    async fn start_session(
        &self, dapp_name: &str, dapp_encryption_key_uri: &str, challenge: &str,
    ) -> Result<Session<Channel>> {
        self.started.lock().expect("should lock").push(StartArgs {
            dapp_name: dapp_name.into(),
            dapp_encryption_key_uri: dapp_encryption_key_uri.into(),
            challenge: challenge.into(),
        });
        if let Some(msg) = &self.behaviour.fail_start {
            bail!("{msg}");
        }

        // stand-in for encrypting the challenge for the dApp
        let encrypted = Self::sign(challenge.as_bytes())?;
        let proof = SessionProof {
            encryption_key_uri: self.key_uri(),
            encrypted_challenge: format!("0x{}", Base64UrlUnpadded::encode_string(&encrypted)),
            nonce: Uuid::new_v4().simple().to_string(),
        };

        let channel = Channel::new(self.key_uri(), self.behaviour.clone());
        self.channels.lock().expect("should lock").push(channel.clone());
        Ok(Session::new(proof, channel))
    }

    async fn sign_with_did(&self, data: &str, did_key_uri: &str) -> Result<DidSignature> {
        if !did_key_uri.starts_with(WALLET_DID) {
            bail!("unknown key: {did_key_uri}");
        }
        let signature = Self::sign(data.as_bytes())?;
        Ok(DidSignature {
            did_key_uri: did_key_uri.into(),
            signature: Base64UrlUnpadded::encode_string(&signature),
        })
    }

    async fn get_did_list(&self) -> Result<Vec<DidEntry>> {
        Ok(vec![DidEntry { did: WALLET_DID.into() }])
    }
}

/// Recording session channel.
#[derive(Clone)]
pub struct Channel {
    key_uri: String,
    behaviour: Behaviour,
    calls: Arc<Mutex<Vec<Call>>>,
    handler: Arc<Mutex<Option<MessageHandler>>>,
}

impl Channel {
    fn new(key_uri: String, behaviour: Behaviour) -> Self {
        Self {
            key_uri,
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
            handler: Arc::new(Mutex::new(None)),
        }
    }

    /// Calls made on the channel, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("should lock").clone()
    }

    /// Whether a handler is currently registered.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.handler.lock().expect("should lock").is_some()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("should lock").push(call);
    }

    fn deliver(&self, message: &Value) {
        if let Some(handler) = self.handler.lock().expect("should lock").as_ref() {
            handler(message.clone());
        }
    }
}

impl Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("key_uri", &self.key_uri)
            .field("calls", &self.calls())
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

impl SessionChannel for Channel {
    async fn send(&self, message: &Value) -> Result<()> {
        self.record(Call::Send(message.clone()));
        if let Some(msg) = &self.behaviour.fail_send {
            bail!("{msg}");
        }

        match &self.behaviour.reply {
            Reply::CredentialRequest => {
                self.deliver(&crate::sample::credential_request(&self.key_uri));
            }
            Reply::Message(reply) => self.deliver(reply),
            Reply::Twice(reply) => {
                self.deliver(reply);
                self.deliver(reply);
            }
            Reply::HangUp => {
                self.handler.lock().expect("should lock").take();
            }
        }
        Ok(())
    }

    async fn listen(&self, handler: MessageHandler) -> Result<()> {
        self.record(Call::Listen);
        if let Some(msg) = &self.behaviour.fail_listen {
            bail!("{msg}");
        }
        *self.handler.lock().expect("should lock") = Some(handler);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(Call::Close);
        self.handler.lock().expect("should lock").take();
        if let Some(msg) = &self.behaviour.fail_close {
            bail!("{msg}");
        }
        Ok(())
    }
}
