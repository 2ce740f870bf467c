//! Built-in event handlers driven through the dispatcher against a mock
//! Front API.

use frontbridge::client::ClientConfig;
use frontbridge::webhooks::{DispatchOutcome, EventType, WebhookDispatcher, WebhookEnvelope};
use frontbridge::{BridgeError, FrontClient, RetryPolicy};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher(server: &MockServer) -> WebhookDispatcher {
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .api_token("tok_test")
        .timeout_seconds(1)
        .build();
    let retry = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50));
    let client = FrontClient::builder(config)
        .retry_policy(retry.clone())
        .build()
        .unwrap();

    WebhookDispatcher::new(client, retry)
}

fn envelope(event_type: &str, payload: Value) -> WebhookEnvelope {
    let Value::Object(payload) = payload else {
        panic!("payload must be an object");
    };
    WebhookEnvelope {
        event_type: EventType::from(event_type),
        id: payload["id"].as_str().unwrap().to_string(),
        payload,
        received_at: 0.0,
    }
}

#[tokio::test]
async fn test_conversation_event_fetches_conversation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations/cnv_7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cnv_7",
            "status": "assigned",
            "assignee": {"id": "tea_1", "email": "ada@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = dispatcher(&server)
        .handle(envelope("conversation.assigned", json!({"id": "cnv_7"})))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Processed);
}

#[tokio::test]
async fn test_message_event_follows_related_conversation_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations/cnv_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cnv_42"})))
        .expect(1)
        .mount(&server)
        .await;

    let payload = json!({
        "id": "msg_1",
        "_links": {"related": {"conversation": format!("{}/conversations/cnv_42", server.uri())}}
    });
    let outcome = dispatcher(&server)
        .handle(envelope("message.received", payload))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Processed);
}

#[tokio::test]
async fn test_contact_event_fetches_contact() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/contacts/crd_3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "crd_3",
            "name": "Grace",
            "handles": [{"handle": "grace@example.com", "source": "email"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = dispatcher(&server)
        .handle(envelope("contact.updated", json!({"id": "crd_3"})))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::Processed);
}

#[tokio::test]
async fn test_tag_lookups_are_served_from_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tags/tag_5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "tag_5", "name": "vip"})))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server);
    for conversation in ["cnv_1", "cnv_2"] {
        let payload = json!({"id": conversation, "tag": {"id": "tag_5"}});
        let outcome = dispatcher.handle(envelope("tag.added", payload)).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Processed);
    }
}

#[tokio::test]
async fn test_missing_resource_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/conversations/cnv_gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "_error": {"status": 404, "title": "Not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = dispatcher(&server)
        .handle(envelope("conversation.archived", json!({"id": "cnv_gone"})))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Api { status: 404, .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_exhausted_client_retries_are_not_multiplied() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/contacts/crd_down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let err = dispatcher(&server)
        .handle(envelope("contact.created", json!({"id": "crd_down"})))
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::RetriesExhausted { attempts: 4, .. }), "got {:?}", err);
}
