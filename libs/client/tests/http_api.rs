mod support;

use axum::http::{Method, StatusCode};
use maxbot_client::error::MAX_ERROR_TEXT;
use maxbot_client::{ClientError, MaxbotClient};
use maxbot_core::{Button, CarouselItem, TransferOptions};
use serde_json::{Map, json};
use support::{MockApi, Reply};

fn ok_message() -> Reply {
    Reply::json(StatusCode::OK, json!({"id": "m-1", "status": "sent"}))
}

#[tokio::test]
async fn send_text_posts_authenticated_json() {
    let Some(api) = MockApi::start(|_, _| ok_message()).await else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let response = client.send_text("c-1", "hello").await.unwrap();
    assert_eq!(response.id, "m-1");
    assert_eq!(response.status, "sent");

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.uri, "/api/v1/chats/c-1/messages");
    assert_eq!(req.authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(req.content_type.as_deref(), Some("application/json"));
    assert_eq!(req.json(), json!({"text": "hello"}));
}

#[tokio::test]
async fn keyboard_and_carousel_bodies() {
    let Some(api) = MockApi::start(|_, _| ok_message()).await else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();
    let yes = Button {
        id: "b-1".into(),
        title: "Yes".into(),
        kind: "text".into(),
        value: "yes".into(),
    };

    client
        .send_keyboard("c-1", "pick", vec![vec![yes.clone()], vec![]])
        .await
        .unwrap();
    client
        .send_carousel(
            "c-1",
            vec![CarouselItem {
                title: "card".into(),
                buttons: vec![yes],
                ..Default::default()
            }],
        )
        .await
        .unwrap();

    let requests = api.requests();
    let keyboard = requests[0].json();
    assert_eq!(keyboard["text"], "pick");
    assert_eq!(keyboard["buttons"][0][0]["type"], "text");
    assert_eq!(keyboard["buttons"][1], json!([]));
    let carousel = requests[1].json();
    assert_eq!(carousel["carousel"][0]["title"], "card");
}

#[tokio::test]
async fn error_document_becomes_api_error_without_retry() {
    let Some(api) = MockApi::start(|_, _| {
        Reply::json(
            StatusCode::BAD_REQUEST,
            json!({"code": 42, "message": "bad chat", "details": "unknown id"}),
        )
    })
    .await
    else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let err = client.get_chat("c-9").await.unwrap_err();
    match err {
        ClientError::Api {
            status,
            code,
            ref message,
        } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(code, 42);
            assert_eq!(message, "bad chat");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn server_errors_use_every_attempt() {
    let Some(api) = MockApi::start(|_, n| {
        Reply::text(StatusCode::SERVICE_UNAVAILABLE, format!("down {n}"))
    })
    .await
    else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let err = client.get_messages("c-1", 5).await.unwrap_err();
    match err {
        ClientError::Http { status, body } => {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body, "down 2");
        }
        other => panic!("unexpected {other:?}"),
    }
    let requests = api.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.uri == "/api/v1/chats/c-1/messages?limit=5"));
}

#[tokio::test]
async fn rate_limited_call_recovers() {
    let Some(api) = MockApi::start(|_, n| {
        if n == 0 {
            Reply::json(
                StatusCode::TOO_MANY_REQUESTS,
                json!({"code": 429, "message": "slow down"}),
            )
        } else {
            Reply::json(StatusCode::OK, json!([{"id": "msg-1", "text": "hi"}]))
        }
    })
    .await
    else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let messages = client.get_messages("c-1", 1).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "msg-1");
    assert_eq!(api.requests().len(), 2);
}

#[tokio::test]
async fn unauthorized_is_returned_after_one_call() {
    let Some(api) = MockApi::start(|_, _| Reply::text(StatusCode::UNAUTHORIZED, "")).await else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let err = client.get_updates(0).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(!err.is_retryable());
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn oversized_error_body_is_bounded() {
    let Some(api) = MockApi::start(|_, _| {
        Reply::text(StatusCode::BAD_GATEWAY, "x".repeat(3 * 1024 * 1024))
    })
    .await
    else {
        return;
    };
    let config = api.config().with_retry(maxbot_client::RetrySettings {
        max_attempts: 1,
        ..Default::default()
    });
    let client = MaxbotClient::new(config).unwrap();

    match client.get_chat("c-1").await.unwrap_err() {
        ClientError::Http { status, body } => {
            assert_eq!(status, StatusCode::BAD_GATEWAY);
            assert_eq!(body.len(), MAX_ERROR_TEXT);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unexpected_success_body_is_a_decode_error() {
    let Some(api) = MockApi::start(|_, _| Reply::text(StatusCode::OK, "not json")).await else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let err = client.get_chat("c-1").await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn chat_management_paths_and_bodies() {
    let Some(api) = MockApi::start(|req, _| {
        if req.uri.ends_with("/start") {
            Reply::json(
                StatusCode::OK,
                json!({"session_id": "s-1", "status": "running"}),
            )
        } else {
            Reply::text(StatusCode::NO_CONTENT, "")
        }
    })
    .await
    else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let mut vars = Map::new();
    vars.insert("lang".into(), json!("en"));
    client.set_chat_variables("c-1", &vars).await.unwrap();

    let transfer = TransferOptions {
        group_id: Some("support".into()),
        ..Default::default()
    };
    client.transfer_to_agent("c-1", &transfer).await.unwrap();

    let session = client
        .start_scenario("c-1", "welcome", &Map::new())
        .await
        .unwrap();
    assert_eq!(session.session_id, "s-1");
    client.stop_scenario("c-1", "welcome").await.unwrap();

    let requests = api.requests();
    let seen: Vec<(Method, &str)> = requests
        .iter()
        .map(|r| (r.method.clone(), r.uri.as_str()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (Method::PUT, "/api/v1/chats/c-1/variables"),
            (Method::POST, "/api/v1/chats/c-1/transfer"),
            (Method::POST, "/api/v1/chats/c-1/scenarios/welcome/start"),
            (Method::POST, "/api/v1/chats/c-1/scenarios/welcome/stop"),
        ]
    );
    assert_eq!(requests[0].json(), json!({"lang": "en"}));
    assert_eq!(requests[1].json(), json!({"group_id": "support"}));
    assert!(requests[3].body.is_empty());
}

#[tokio::test]
async fn get_updates_passes_offset() {
    let Some(api) = MockApi::start(|_, _| {
        Reply::json(
            StatusCode::OK,
            json!([{"update_id": 7, "event_id": "e-7", "type": "message", "chat": {"id": "c-1"}}]),
        )
    })
    .await
    else {
        return;
    };
    let client = MaxbotClient::new(api.config()).unwrap();

    let events = client.get_updates(7).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, "message");
    assert_eq!(api.requests()[0].uri, "/api/v1/updates?offset=7");
}
