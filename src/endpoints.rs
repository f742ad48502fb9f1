//! # Endpoint Discovery
//!
//! The backend publishes the endpoints a client needs at
//! `{origin}/api/v1/endpoints`: the login (authorization) URL and the chain
//! endpoint. The backend's own API base is implied by the origin.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::http::status_and_body;

/// Path of the backend API relative to the origin.
pub const API_PATH: &str = "api/v1";

/// Endpoints a client needs to talk to the attestation service.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    /// Where the external login exchange starts.
    pub authorize_url: String,

    /// Chain node endpoint.
    pub kilt_endpoint: String,

    /// Base URL of the REST backend.
    pub backend_url: String,
}

/// Discover the service endpoints published at `origin`.
///
/// # Errors
/// Returns [`Error::EndpointsUnavailable`] if the endpoint list cannot be
/// fetched or is incomplete.
#[instrument(level = "debug", skip(http))]
pub async fn discover(http: &reqwest::Client, origin: &str) -> Result<Endpoints> {
    tracing::debug!("endpoints::discover");

    let backend_url = format!("{}/{API_PATH}", origin.trim_end_matches('/'));
    let url = format!("{backend_url}/endpoints");

    let response = http.get(&url).send().await.map_err(|e| {
        tracing::error!(target: "endpoints::discover", ?e);
        Error::EndpointsUnavailable(format!("{url}: {e}"))
    })?;
    if !response.status().is_success() {
        let (status, body) = status_and_body(response).await;
        let e = Error::EndpointsUnavailable(format!("{url}: {status}: {body}"));
        tracing::error!(target: "endpoints::discover", ?e);
        return Err(e);
    }

    let listed = response.json::<Vec<String>>().await.map_err(|e| {
        tracing::error!(target: "endpoints::discover", ?e);
        Error::EndpointsUnavailable(format!("{url}: {e}"))
    })?;
    let mut listed = listed.into_iter();
    let (Some(authorize_url), Some(kilt_endpoint)) = (listed.next(), listed.next()) else {
        let e = Error::EndpointsUnavailable(format!("{url}: incomplete endpoint list"));
        tracing::error!(target: "endpoints::discover", ?e);
        return Err(e);
    };

    Ok(Endpoints { authorize_url, kilt_endpoint, backend_url })
}
