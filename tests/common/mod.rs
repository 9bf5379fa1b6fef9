#![allow(dead_code)]

use std::sync::Arc;

use httpmock::MockServer;

use chatter_console::client::{ApiClient, RedirectLatch};
use chatter_console::config::ConsoleConfig;
use chatter_console::console;
use chatter_console::domains::entity::{EntityType, Record, RecordId};
use chatter_console::store::{Collections, EntityStore};
use chatter_console::vault::MemoryTokenStore;

pub const TOKEN: &str = "test-key";

pub struct Harness {
    pub client: ApiClient,
    pub tokens: Arc<MemoryTokenStore>,
    pub redirects: Arc<RedirectLatch>,
}

pub fn harness(server: &MockServer, token: Option<&str>) -> Harness {
    let config = ConsoleConfig {
        base_url: server.base_url(),
        ..ConsoleConfig::default()
    };
    let tokens = Arc::new(match token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::new(),
    });
    let redirects = Arc::new(RedirectLatch::new());
    let client = console::connect(&config, tokens.clone(), redirects.clone()).unwrap();
    Harness {
        client,
        tokens,
        redirects,
    }
}

pub fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).unwrap()
}

/// Ana/Sam/"Be kind" with all three selected.
pub fn selected_store() -> EntityStore {
    let mut store = EntityStore::from_collections(Collections {
        creators: vec![record(serde_json::json!({"id": "C1", "creator_name": "Ana"}))],
        fans: vec![record(serde_json::json!({"id": "F1", "fan_name": "Sam"}))],
        system_prompts: vec![record(
            serde_json::json!({"id": "P1", "system_prompt": "Be kind"}),
        )],
    });
    store.select(EntityType::Creator, &RecordId::from("C1"));
    store.select(EntityType::Fan, &RecordId::from("F1"));
    store.select(EntityType::SystemPrompt, &RecordId::from("P1"));
    store
}
