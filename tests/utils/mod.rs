#![allow(missing_docs, dead_code)]

use attester_session::{BackendClient, ChallengeClient, Established, SessionNegotiator};
use mockito::{Mock, ServerGuard};
use serde_json::json;
use test_utils::sample;
use test_utils::wallet::{Channel, Wallet};

pub async fn server() -> ServerGuard {
    test_utils::init_tracer();
    mockito::Server::new_async().await
}

/// `GET /challenge` answering with `challenge`.
pub async fn mock_challenge(server: &mut ServerGuard, challenge: &str) -> Mock {
    server
        .mock("GET", "/challenge")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(sample::challenge(challenge).to_string())
        .create_async()
        .await
}

/// `POST /challenge` accepting any proof and answering with `reference`.
pub async fn mock_accept_proof(server: &mut ServerGuard, reference: &str) -> Mock {
    server
        .mock("POST", "/challenge")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!(reference).to_string())
        .create_async()
        .await
}

pub fn negotiator(server: &ServerGuard) -> SessionNegotiator {
    SessionNegotiator::new(ChallengeClient::new(BackendClient::new(server.url())))
}

/// Negotiate a session with `wallet` against a server already mocking the
/// challenge endpoints.
pub async fn establish(server: &ServerGuard, wallet: &Wallet) -> Established<Channel> {
    negotiator(server).negotiate(Some(wallet)).await.expect("should establish session")
}
