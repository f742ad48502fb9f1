//! # Backend Transport
//!
//! A thin wrapper around `reqwest` that knows the backend's base URL and the
//! bearer token obtained from the (external) login exchange. Responses are
//! returned as-is: status codes are checked by each caller because the
//! backend can return a well-formed body with a non-success status.
//!
//! The backend keeps the issued challenge in a cookie session, so every
//! request of one negotiation and its credential exchange must carry the same
//! cookies. [`BackendClient::for_attempt`] gives each attempt its own cookie
//! store; clones of the returned client share it.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::Serialize;

use crate::error::Result;

/// HTTP client for the attestation backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl BackendClient {
    /// Create a client for the backend at `base_url` (for example
    /// `https://attester.example/api/v1`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client that reuses an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url, access_token: None }
    }

    /// Attach the bearer token sent with every request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// A client for a single negotiation and credential exchange, with a
    /// cookie store of its own. Base URL and access token are kept.
    ///
    /// # Errors
    /// Returns a transport error if the HTTP client cannot be built.
    pub fn for_attempt(&self) -> Result<Self> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: self.base_url.clone(),
            access_token: self.access_token.clone(),
        })
    }

    /// The backend base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a GET request to `path`.
    ///
    /// # Errors
    /// Returns an error only if the request could not be sent. A non-success
    /// status is returned to the caller to interpret.
    pub async fn get(&self, path: &str) -> Result<Response> {
        let mut request = self.http.get(self.url(path)).header(ACCEPT, "application/json");
        if let Some(token) = &self.access_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }

    /// Send a POST request with a JSON body to `path`.
    ///
    /// # Errors
    /// Returns an error only if the request could not be sent. A non-success
    /// status is returned to the caller to interpret.
    pub async fn post<B: Serialize + ?Sized + Sync>(
        &self, path: &str, body: &B,
    ) -> Result<Response> {
        let mut request = self
            .http
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body);
        if let Some(token) = &self.access_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }
}

/// Split a response into its status and body text, for callers that need to
/// report a rejected step.
pub(crate) async fn status_and_body(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}
