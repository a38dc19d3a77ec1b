//! End-to-end payment flow tests.
//!
//! Drives a `PaymentClient` against a mock resource server and facilitator:
//! the happy path (sign, settle, replay once), the approval hard stop, and
//! the rejection paths that must never replay the original request.

use std::sync::Arc;
use std::time::Duration;

use agentpass::{
    Error, ManualClock, PaymentClient, PaymentClientConfig, PaymentRequirement,
    PAYMENT_PROOF_HEADER, PAYMENT_REQUIRED_HEADER,
};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const RESOURCE_PATH: &str = "/v1/annotate";

fn receiver() -> Address {
    "0x00000000000000000000000000000000000000a1".parse().unwrap()
}

fn challenge_header(amount: &str) -> String {
    PaymentRequirement {
        route: RESOURCE_PATH.to_string(),
        amount: amount.parse().unwrap(),
        receiver: receiver(),
        description: Some("per-request annotation".to_string()),
    }
    .to_header_value()
    .unwrap()
}

fn has_payment_proof(request: &Request) -> bool {
    request.headers.contains_key(PAYMENT_PROOF_HEADER)
}

fn client_against(server: &MockServer, ceiling: &str) -> PaymentClient {
    let config = PaymentClientConfig {
        facilitator_url: server.uri(),
        max_auto_approve: ceiling.parse().unwrap(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    PaymentClient::new(
        config,
        PrivateKeySigner::random(),
        Arc::new(ManualClock::new(Utc::now())),
    )
    .unwrap()
}

/// Mount the paid resource: 402 without proof, 200 with it.
async fn mount_resource(server: &MockServer, price: &str) {
    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .and(has_payment_proof)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "annotated"})))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, challenge_header(price).as_str()),
        )
        .with_priority(5)
        .mount(server)
        .await;
}

async fn mount_facilitator_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactionHash": "0x6f4e9c4f3bb8",
            "blockNumber": 4_221_907,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_cheap_resource_is_paid_and_replayed_once() {
    let server = MockServer::start().await;
    mount_resource(&server, "$0.25").await;
    mount_facilitator_ok(&server).await;

    let client = client_against(&server, "$10.00");
    let response = client
        .get(&format!("{}{}", server.uri(), RESOURCE_PATH))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let body: Value = response.json().unwrap();
    assert_eq!(body["result"], "annotated");

    let settlement = response.settlement.unwrap();
    assert!(settlement.success);
    assert_eq!(settlement.transaction_hash.as_deref(), Some("0x6f4e9c4f3bb8"));
    assert_eq!(settlement.block_number, Some(4_221_907));

    // Exactly one unpaid request, one settlement round, one paid replay.
    let requests = server.received_requests().await.unwrap();
    let resource_hits: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == RESOURCE_PATH)
        .collect();
    assert_eq!(resource_hits.len(), 2);
    assert!(!has_payment_proof(resource_hits[0]));
    assert!(has_payment_proof(resource_hits[1]));
}

#[tokio::test]
async fn test_expensive_resource_stops_before_signing() {
    let server = MockServer::start().await;
    mount_resource(&server, "$50.00").await;

    // The facilitator must never hear about this payment.
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let result = client
        .get(&format!("{}{}", server.uri(), RESOURCE_PATH))
        .await;

    match result {
        Err(Error::ApprovalRequired { amount, ceiling }) => {
            assert_eq!(amount, "$50.00".parse().unwrap());
            assert_eq!(ceiling, "$10.00".parse().unwrap());
        }
        other => panic!("expected ApprovalRequired, got {other:?}"),
    }
}

#[tokio::test]
async fn test_verify_rejection_never_replays() {
    let server = MockServer::start().await;
    mount_resource(&server, "$0.25").await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": false,
            "error": "insufficient funds on sender",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transactionHash": "0x1"})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let result = client
        .get(&format!("{}{}", server.uri(), RESOURCE_PATH))
        .await;

    match result {
        Err(Error::PaymentRejected(reason)) => {
            assert_eq!(reason, "insufficient funds on sender");
        }
        other => panic!("expected PaymentRejected, got {other:?}"),
    }

    // The original request went out once and was never replayed.
    let requests = server.received_requests().await.unwrap();
    let resource_hits = requests
        .iter()
        .filter(|r| r.url.path() == RESOURCE_PATH)
        .count();
    assert_eq!(resource_hits, 1);
}

#[tokio::test]
async fn test_settlement_error_is_not_treated_as_paid() {
    let server = MockServer::start().await;
    mount_resource(&server, "$0.25").await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "nonce already used"})),
        )
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let result = client
        .get(&format!("{}{}", server.uri(), RESOURCE_PATH))
        .await;

    match result {
        Err(Error::PaymentRejected(reason)) => assert_eq!(reason, "nonce already used"),
        other => panic!("expected PaymentRejected, got {other:?}"),
    }

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !has_payment_proof(r)));
}

#[tokio::test]
async fn test_second_challenge_after_settlement_errors() {
    let server = MockServer::start().await;
    mount_facilitator_ok(&server).await;

    // A misbehaving server that keeps demanding payment.
    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, challenge_header("$0.25").as_str()),
        )
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let result = client
        .get(&format!("{}{}", server.uri(), RESOURCE_PATH))
        .await;

    assert!(matches!(result, Err(Error::UnexpectedSecondChallenge)));
}

#[tokio::test]
async fn test_missing_challenge_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .respond_with(ResponseTemplate::new(402))
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let result = client
        .get(&format!("{}{}", server.uri(), RESOURCE_PATH))
        .await;

    assert!(matches!(result, Err(Error::MalformedChallenge(_))));
}

#[tokio::test]
async fn test_challenge_in_body_is_accepted() {
    let server = MockServer::start().await;
    mount_facilitator_ok(&server).await;

    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .and(has_payment_proof)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(RESOURCE_PATH))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "route": RESOURCE_PATH,
            "amount": "$0.25",
            "receiver": receiver(),
        })))
        .with_priority(5)
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let response = client
        .get(&format!("{}{}", server.uri(), RESOURCE_PATH))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_ordinary_responses_pass_through_untouched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"free": true})))
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let response = client
        .get(&format!("{}/v1/public", server.uri()))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.settlement.is_none());
}

#[tokio::test]
async fn test_post_body_is_preserved_across_replay() {
    let server = MockServer::start().await;
    mount_facilitator_ok(&server).await;

    Mock::given(method("POST"))
        .and(path(RESOURCE_PATH))
        .and(has_payment_proof)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(RESOURCE_PATH))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header(PAYMENT_REQUIRED_HEADER, challenge_header("$0.25").as_str()),
        )
        .with_priority(5)
        .mount(&server)
        .await;

    let client = client_against(&server, "$10.00");
    let body = json!({"sequence": "ACTG"});
    let response = client
        .post(&format!("{}{}", server.uri(), RESOURCE_PATH), &body)
        .await
        .unwrap();

    assert_eq!(response.status, 200);

    let requests = server.received_requests().await.unwrap();
    let paid: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == RESOURCE_PATH && has_payment_proof(r))
        .collect();
    assert_eq!(paid.len(), 1);
    let replayed_body: Value = serde_json::from_slice(&paid[0].body).unwrap();
    assert_eq!(replayed_body, body);
}
