//! Tests for the credential exchange.

mod utils;

use attester_session::{BackendClient, CredentialExchange, Error};
use mockito::{Matcher, ServerGuard};
use reqwest::StatusCode;
use serde_json::{json, Value};
use test_utils::sample;
use test_utils::wallet::{Call, Reply, Wallet};

fn exchange(server: &ServerGuard) -> CredentialExchange {
    CredentialExchange::new(BackendClient::new(server.url()))
}

async fn mock_terms(server: &mut ServerGuard, path: &str, terms: &Value) -> mockito::Mock {
    server
        .mock("POST", path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(terms.to_string())
        .create_async()
        .await
}

// The round trip from challenge to credential acceptance.
#[tokio::test]
async fn round_trip() {
    let mut server = utils::server().await;
    let _challenge = server
        .mock("GET", "/challenge")
        .with_status(200)
        .with_body(
            json!({"dAppName": "A", "dAppEncryptionKeyUri": "U", "challenge": "C"}).to_string(),
        )
        .create_async()
        .await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-123").await;

    let wallet = Wallet::new("Sporran", "3.0").replying(Reply::Message(json!({"foo": "bar"})));
    let terms_msg = sample::terms(&wallet.key_uri());

    let terms = server
        .mock("POST", "/credential/terms/ref-123/att-1")
        .match_body(Matcher::Json(json!({"challenge": "ref-123", "attestationId": "att-1"})))
        .with_status(200)
        .with_body(terms_msg.to_string())
        .create_async()
        .await;
    let credential = server
        .mock("POST", "/credential/ref-123/att-1")
        .match_body(Matcher::Json(json!({"foo": "bar"})))
        .with_status(200)
        .with_body(r#""ok""#)
        .create_async()
        .await;

    let established = utils::establish(&server, &wallet).await;
    assert_eq!(established.reference.as_str(), "ref-123");

    exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await
        .expect("should exchange credential");

    let channel = &wallet.channels()[0];
    assert_eq!(channel.calls(), vec![Call::Listen, Call::Send(terms_msg), Call::Close]);
    assert!(!channel.is_listening());
    terms.assert_async().await;
    credential.assert_async().await;
}

#[tokio::test]
async fn relays_wallet_reply() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;

    let wallet = Wallet::new("Sporran", "3.0");
    let _terms = mock_terms(&mut server, "/credential/terms/ref-1/att-1", &json!({})).await;
    let credential = server
        .mock("POST", "/credential/ref-1/att-1")
        .match_body(Matcher::PartialJson(json!({
            "senderKeyUri": wallet.key_uri(),
            "receiverKeyUri": sample::DAPP_KEY_URI,
        })))
        .with_status(200)
        .create_async()
        .await;

    let established = utils::establish(&server, &wallet).await;
    exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await
        .expect("should exchange credential");

    credential.assert_async().await;
}

#[tokio::test]
async fn terms_unavailable() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;
    let _terms = server
        .mock("POST", "/credential/terms/ref-1/att-1")
        .with_status(404)
        .with_body("attestation not found")
        .create_async()
        .await;
    let credential = server.mock("POST", "/credential/ref-1/att-1").expect(0).create_async().await;

    let wallet = Wallet::new("Sporran", "3.0");
    let established = utils::establish(&server, &wallet).await;
    let result = exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await;

    assert!(matches!(result, Err(Error::TermsUnavailable { status, .. })
        if status == StatusCode::NOT_FOUND));
    // nothing relayed, but the session is still released
    assert_eq!(wallet.channels()[0].calls(), vec![Call::Close]);
    credential.assert_async().await;
}

#[tokio::test]
async fn credential_rejected() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;
    let _terms = mock_terms(&mut server, "/credential/terms/ref-1/att-1", &json!({})).await;
    let _credential = server
        .mock("POST", "/credential/ref-1/att-1")
        .with_status(400)
        .with_body("Attestation is not approved")
        .create_async()
        .await;

    let wallet = Wallet::new("Sporran", "3.0");
    let established = utils::establish(&server, &wallet).await;
    let Err(e) = exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await
    else {
        panic!("exchange should fail");
    };

    assert!(e.is_backend_rejection());
    assert!(matches!(&e, Error::CredentialRejected { body, .. }
        if body == "Attestation is not approved"));
    assert_eq!(wallet.channels()[0].calls().last(), Some(&Call::Close));
}

#[tokio::test]
async fn send_failure() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;
    let _terms = mock_terms(&mut server, "/credential/terms/ref-1/att-1", &json!({"t": 1})).await;
    let credential = server.mock("POST", "/credential/ref-1/att-1").expect(0).create_async().await;

    let wallet = Wallet::new("Sporran", "3.0").failing_send("extension disconnected");
    let established = utils::establish(&server, &wallet).await;
    let result = exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await;

    let Err(Error::ProviderFailure(e)) = result else {
        panic!("should be a provider failure");
    };
    assert_eq!(e.to_string(), "extension disconnected");
    assert_eq!(
        wallet.channels()[0].calls(),
        vec![Call::Listen, Call::Send(json!({"t": 1})), Call::Close]
    );
    credential.assert_async().await;
}

#[tokio::test]
async fn listen_failure() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;
    let _terms = mock_terms(&mut server, "/credential/terms/ref-1/att-1", &json!({})).await;

    let wallet = Wallet::new("Sporran", "3.0").failing_listen("listener rejected");
    let established = utils::establish(&server, &wallet).await;
    let result = exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await;

    assert!(matches!(result, Err(Error::ProviderFailure(_))));
    // terms are never sent without a listener
    assert_eq!(wallet.channels()[0].calls(), vec![Call::Listen, Call::Close]);
}

#[tokio::test]
async fn channel_closed_without_reply() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;
    let _terms = mock_terms(&mut server, "/credential/terms/ref-1/att-1", &json!({})).await;
    let credential = server.mock("POST", "/credential/ref-1/att-1").expect(0).create_async().await;

    let wallet = Wallet::new("Sporran", "3.0").replying(Reply::HangUp);
    let established = utils::establish(&server, &wallet).await;
    let result = exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await;

    assert!(matches!(result, Err(Error::ChannelClosed)));
    credential.assert_async().await;
}

#[tokio::test]
async fn first_reply_wins() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;
    let _terms = mock_terms(&mut server, "/credential/terms/ref-1/att-1", &json!({})).await;
    let credential = server
        .mock("POST", "/credential/ref-1/att-1")
        .match_body(Matcher::Json(json!({"n": 1})))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let wallet = Wallet::new("Sporran", "3.0").replying(Reply::Twice(json!({"n": 1})));
    let established = utils::establish(&server, &wallet).await;
    exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await
        .expect("should exchange credential");

    credential.assert_async().await;
}

#[tokio::test]
async fn close_failure_ignored() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;
    let _terms = mock_terms(&mut server, "/credential/terms/ref-1/att-1", &json!({})).await;
    let _credential =
        server.mock("POST", "/credential/ref-1/att-1").with_status(200).create_async().await;

    let wallet = Wallet::new("Sporran", "3.0").failing_close("already closed");
    let established = utils::establish(&server, &wallet).await;
    let result = exchange(&server)
        .request_credential(&established.session, &established.reference, "att-1")
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn mixed_sessions_rejected() {
    let mut server = utils::server().await;
    let _challenge = utils::mock_challenge(&mut server, "0x1234").await;
    let _proof = utils::mock_accept_proof(&mut server, "ref-1").await;

    let wallet = Wallet::new("Sporran", "3.0");
    let first = utils::establish(&server, &wallet).await;
    let second = utils::establish(&server, &wallet).await;
    let terms = server
        .mock("POST", Matcher::Regex(r"^/credential/".into()))
        .expect(0)
        .create_async()
        .await;

    // same backend reference value, different sessions
    assert_eq!(first.reference.as_str(), second.reference.as_str());
    let result =
        exchange(&server).request_credential(&second.session, &first.reference, "att-1").await;

    assert!(matches!(result, Err(Error::SessionMismatch { reference }) if reference == "ref-1"));
    assert!(wallet.channels()[1].calls().is_empty());
    terms.assert_async().await;
}
