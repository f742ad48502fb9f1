//! # Configuration
//!
//! Client configuration, read from command-line flags or the environment.
//! The backend base URL is resolved once: either given directly or
//! discovered from the service origin.

use std::ffi::OsString;

use clap::Parser;

use crate::endpoints;
use crate::error::{Error, Result};
use crate::http::BackendClient;
use crate::provider::WalletProvider;
use crate::registry::{ExtensionRegistry, SUPPORTED_SPEC_VERSION};

/// Settings for talking to the attestation backend.
#[derive(Clone, Debug, Parser)]
#[command(name = "attester-session", about = "Attestation session client settings")]
pub struct Config {
    /// Base URL of the REST backend, e.g. `https://attester.example/api/v1`.
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Service origin used to discover endpoints when no backend URL is set.
    #[arg(long, env = "ORIGIN")]
    pub origin: Option<String>,

    /// Bearer token obtained from the login exchange.
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Supported extension API version prefix.
    #[arg(long, env = "SPEC_VERSION", default_value = SUPPORTED_SPEC_VERSION)]
    pub spec_version: String,
}

impl Config {
    /// Load configuration from the environment only.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_args(["attester-session"])
    }

    /// Load configuration from `args` (the first item is the program name),
    /// falling back to the environment.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the arguments cannot be parsed.
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| Error::Config(e.to_string()))
    }

    /// Build the backend client, discovering the backend URL from `origin`
    /// when it is not set directly.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if neither a backend URL nor an origin is
    /// configured, or [`Error::EndpointsUnavailable`] if discovery fails.
    pub async fn backend_client(&self) -> Result<BackendClient> {
        let http = reqwest::Client::new();

        let base_url = match (&self.backend_url, &self.origin) {
            (Some(url), _) => url.clone(),
            (None, Some(origin)) => endpoints::discover(&http, origin).await?.backend_url,
            (None, None) => {
                let e = Error::Config("one of backend_url or origin is required".into());
                tracing::error!(target: "Config::backend_client", ?e);
                return Err(e);
            }
        };

        let client = BackendClient::with_client(http, base_url);
        Ok(match &self.access_token {
            Some(token) => client.with_access_token(token),
            None => client,
        })
    }

    /// Create an empty registry accepting the configured spec version.
    #[must_use]
    pub fn registry<P: WalletProvider>(&self) -> ExtensionRegistry<P> {
        ExtensionRegistry::with_spec_prefix(self.spec_version.clone())
    }
}
