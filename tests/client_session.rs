mod common;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

use chatter_console::client::API_KEY_HEADER;
use chatter_console::console::{self, Startup};
use chatter_console::domains::entity::EntityType;
use chatter_console::error::ConsoleError;
use chatter_console::vault::TokenStore;

use common::{harness, TOKEN};

#[tokio::test]
async fn unauthorized_clears_token_and_redirects() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/get_creators");
            then.status(401).json_body(json!({"error": "Invalid API key"}));
        })
        .await;
    let h = harness(&server, Some(TOKEN));

    let err = h.client.list(EntityType::Creator).await.unwrap_err();

    assert!(matches!(err, ConsoleError::AuthExpired));
    assert_eq!(h.tokens.load().unwrap(), None);
    assert_eq!(h.redirects.take(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn api_key_header_is_sent() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/health").header(API_KEY_HEADER, TOKEN);
            then.status(200).json_body(json!({"status": "ok"}));
        })
        .await;
    let h = harness(&server, Some(TOKEN));

    assert_eq!(h.client.health().await.unwrap(), "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_text_is_surfaced() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/get_fans");
            then.status(404).json_body(json!({"error": "Fan not found"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/get_creators");
            then.status(500).body("<html>boom</html>");
        })
        .await;
    let h = harness(&server, Some(TOKEN));

    let err = h.client.list(EntityType::Fan).await.unwrap_err();
    assert_eq!(err.user_message(), "Fan not found");

    let err = h.client.list(EntityType::Creator).await.unwrap_err();
    assert_eq!(err.user_message(), "HTTP error! status: 500");
    assert!(h.redirects.take().is_empty());
}

#[tokio::test]
async fn login_stores_api_key_and_loads_collections() {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/login")
                .json_body(json!({"username": "ops", "password": "pw"}));
            then.status(200).json_body(json!({"api_key": "fresh-key"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/get_creators").header(API_KEY_HEADER, "fresh-key");
            then.status(200)
                .json_body(json!({"creators": [{"id": "C1", "creator_name": "Ana"}]}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/get_fans");
            then.status(200).json_body(json!({"fans": []}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/get_system_prompts");
            then.status(200).json_body(json!({}));
        })
        .await;
    let h = harness(&server, None);

    let collections = console::login(h.client.clone(), " ops ".to_string(), "pw".to_string())
        .await
        .unwrap();

    login.assert_async().await;
    assert_eq!(h.tokens.load().unwrap().as_deref(), Some("fresh-key"));
    assert_eq!(collections.creators.len(), 1);
    assert!(collections.fans.is_empty());
    assert!(collections.system_prompts.is_empty());
}

#[tokio::test]
async fn rejected_login_stays_on_login_screen() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/login");
            then.status(401).body("");
        })
        .await;
    let h = harness(&server, None);

    let err = h.client.login("ops", "wrong").await.unwrap_err();

    assert_eq!(err.user_message(), "Invalid username or password");
    assert!(h.redirects.take().is_empty());
    assert_eq!(h.tokens.load().unwrap(), None);
}

#[tokio::test]
async fn expired_token_at_startup_needs_login() {
    let server = MockServer::start_async().await;
    for path in ["/get_creators", "/get_fans", "/get_system_prompts"] {
        server
            .mock_async(|when, then| {
                when.method(GET).path(path);
                then.status(401).body("");
            })
            .await;
    }
    let h = harness(&server, Some("stale"));

    let startup = console::start(h.client.clone()).await.unwrap();

    assert!(matches!(startup, Startup::NeedsLogin));
    assert_eq!(h.tokens.load().unwrap(), None);
    assert!(!h.redirects.take().is_empty());
}

#[tokio::test]
async fn logout_discards_token_even_when_server_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/logout");
            then.status(500).body("");
        })
        .await;
    let h = harness(&server, Some(TOKEN));

    console::logout(h.client.clone()).await;

    assert_eq!(h.tokens.load().unwrap(), None);
    assert_eq!(h.redirects.take(), vec!["/login".to_string()]);
}
