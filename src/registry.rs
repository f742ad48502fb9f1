//! # Extension Registry
//!
//! Tracks the wallet extensions the host environment has injected and selects
//! the ones implementing a supported version of the extension API.
//!
//! The registry holds an immutable snapshot of installed providers. Every
//! change replaces the snapshot wholesale, so readers never observe a
//! partially updated list. Late-arriving extensions announce themselves
//! through [`ExtensionRegistry::extension_initialized`]; subscribers see each
//! change through a `watch` channel.

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::provider::WalletProvider;

/// Major version prefix of the extension API this crate speaks.
pub const SUPPORTED_SPEC_VERSION: &str = "3.";

/// Snapshot of installed providers, keyed by the name each registered under.
pub type Providers<P> = Arc<BTreeMap<String, Arc<P>>>;

/// Signals the registry emits to the host environment.
pub trait HostEvents: Send + Sync {
    /// Tell extensions the dApp is ready so that any that have not yet
    /// registered announce themselves.
    fn dapp_initialized(&self);
}

/// Whether a provider declaring `spec_version` is usable with the supported
/// version `prefix`.
#[must_use]
pub fn is_compatible(spec_version: &str, prefix: &str) -> bool {
    spec_version.starts_with(prefix)
}

/// Registry of injected wallet providers.
pub struct ExtensionRegistry<P> {
    providers: watch::Sender<Providers<P>>,
    spec_prefix: String,
    announced: AtomicBool,
}

impl<P: WalletProvider> Default for ExtensionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: WalletProvider> ExtensionRegistry<P> {
    /// Create an empty registry accepting [`SUPPORTED_SPEC_VERSION`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_spec_prefix(SUPPORTED_SPEC_VERSION)
    }

    /// Create an empty registry accepting providers whose spec version starts
    /// with `prefix`.
    #[must_use]
    pub fn with_spec_prefix(prefix: impl Into<String>) -> Self {
        let (providers, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self { providers, spec_prefix: prefix.into(), announced: AtomicBool::new(false) }
    }

    /// Add (or replace) the provider registered under `name`.
    pub fn register(&self, name: impl Into<String>, provider: P) -> Arc<P> {
        let name = name.into();
        let provider = Arc::new(provider);
        let added = Arc::clone(&provider);

        self.providers.send_modify(|current| {
            let mut next = (**current).clone();
            next.insert(name, added);
            *current = Arc::new(next);
        });
        provider
    }

    /// Remove the provider registered under `name`, returning it if present.
    pub fn unregister(&self, name: &str) -> Option<Arc<P>> {
        let mut removed = None;
        self.providers.send_if_modified(|current| {
            if !current.contains_key(name) {
                return false;
            }
            let mut next = (**current).clone();
            removed = next.remove(name);
            *current = Arc::new(next);
            true
        });
        removed
    }

    /// Handle the host's "extension initialized" notification: record the
    /// newly available provider and re-scan.
    pub fn extension_initialized(&self, name: impl Into<String>, provider: P) -> Arc<P> {
        let name = name.into();
        tracing::debug!(target: "ExtensionRegistry", %name, "extension initialized");
        self.register(name, provider)
    }

    /// Emit the "dapp initialized" signal to the host. The signal is sent at
    /// most once per registry; returns whether this call sent it.
    pub fn announce_ready(&self, host: &impl HostEvents) -> bool {
        if self.announced.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!(target: "ExtensionRegistry", "dapp initialized");
        host.dapp_initialized();
        true
    }

    /// Providers whose spec version matches the supported major version, in
    /// name order. Empty if none are installed.
    #[must_use]
    pub fn list_compatible_providers(&self) -> Vec<Arc<P>> {
        self.providers
            .borrow()
            .values()
            .filter(|p| is_compatible(p.spec_version(), &self.spec_prefix))
            .cloned()
            .collect()
    }

    /// Names of the compatible providers, in name order.
    #[must_use]
    pub fn compatible_names(&self) -> Vec<String> {
        self.providers
            .borrow()
            .iter()
            .filter(|(_, p)| is_compatible(p.spec_version(), &self.spec_prefix))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The compatible provider registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<P>> {
        self.providers
            .borrow()
            .get(name)
            .filter(|p| is_compatible(p.spec_version(), &self.spec_prefix))
            .cloned()
    }

    /// The current snapshot of every installed provider, compatible or not.
    #[must_use]
    pub fn snapshot(&self) -> Providers<P> {
        Arc::clone(&self.providers.borrow())
    }

    /// Receive a notification each time the set of providers changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Providers<P>> {
        self.providers.subscribe()
    }
}

impl<P> Debug for ExtensionRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("providers", &self.providers.borrow().keys().collect::<Vec<_>>())
            .field("spec_prefix", &self.spec_prefix)
            .field("announced", &self.announced.load(Ordering::Acquire))
            .finish()
    }
}
