use std::sync::{Arc, Mutex};

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::ConsoleConfig;
use crate::domains::chat::{
    ChatMessage, FanMessageRequest, Recommendation, RecommendationRequest, ReplySelection,
    TEXT_CHAT,
};
use crate::domains::entity::{EntityType, Record, RecordId};
use crate::error::{ConsoleError, Result};
use crate::vault::TokenStore;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Invoked when the backend rejects the credential. The stored token has
/// already been cleared when this runs.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, login_path: &str);
}

/// Redirect hook for headless use: logs and nothing else.
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self, login_path: &str) {
        warn!(login_path, "credential rejected, login required");
    }
}

/// Remembers redirects until someone takes them.
#[derive(Default)]
pub struct RedirectLatch {
    pending: Mutex<Vec<String>>,
}

impl RedirectLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<String> {
        match self.pending.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl LoginRedirect for RedirectLatch {
    fn redirect_to_login(&self, login_path: &str) {
        match self.pending.lock() {
            Ok(mut guard) => guard.push(login_path.to_string()),
            Err(poisoned) => poisoned.into_inner().push(login_path.to_string()),
        }
    }
}

struct ClientInner {
    base_url: String,
    login_path: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenStore>,
    redirect: Arc<dyn LoginRedirect>,
}

/// Backend handle. Clones share the HTTP pool, token store and redirect hook.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

fn error_field(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|message| !message.trim().is_empty())
}

impl ApiClient {
    pub fn new(
        config: &ConsoleConfig,
        tokens: Arc<dyn TokenStore>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConsoleError::Runtime(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                login_path: config.login_path.clone(),
                http,
                tokens,
                redirect,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    pub fn has_token(&self) -> bool {
        matches!(self.inner.tokens.load(), Ok(Some(_)))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.inner.base_url, endpoint.trim_start_matches('/'))
    }

    /// Clears the stored token and sends the operator to the login entry point.
    pub fn force_logout(&self) {
        if let Err(err) = self.inner.tokens.clear() {
            warn!(error = %err, "failed to clear stored token");
        }
        self.inner.redirect.redirect_to_login(&self.inner.login_path);
    }

    pub async fn call(&self, endpoint: &str, method: Method, body: Option<&Value>) -> Result<Value> {
        self.request(endpoint, method, &[], body).await
    }

    async fn request(
        &self,
        endpoint: &str,
        method: Method,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let token = self.inner.tokens.load()?.unwrap_or_default();
        let mut request = self
            .inner
            .http
            .request(method.clone(), self.url(endpoint))
            .header(API_KEY_HEADER, token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        debug!(%method, endpoint, "calling backend");
        self.execute(endpoint, request).await
    }

    async fn execute(&self, endpoint: &str, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|err| {
            warn!(endpoint, error = %err, "request failed before a response arrived");
            ConsoleError::Network(err.to_string())
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ConsoleError::Network(err.to_string()))?;

        if status == StatusCode::UNAUTHORIZED {
            warn!(endpoint, "backend answered 401, forcing logout");
            self.force_logout();
            return Err(ConsoleError::AuthExpired);
        }

        if !status.is_success() {
            let message = error_field(&body)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            warn!(endpoint, status = status.as_u16(), %message, "backend returned an error");
            return Err(ConsoleError::Request(message));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(ConsoleError::from)
    }

    pub async fn list(&self, entity_type: EntityType) -> Result<Vec<Record>> {
        let endpoints = entity_type.endpoints();
        let value = self.call(endpoints.list, Method::GET, None).await?;
        let items = match value.get(endpoints.collection_key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match Record::from_value(item) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(%entity_type, error = %err, "skipping malformed record");
                    None
                }
            })
            .collect())
    }

    pub async fn details(&self, entity_type: EntityType, id: &RecordId) -> Result<Record> {
        let endpoints = entity_type.endpoints();
        let body = json!({ "id": id.as_value() });
        let value = self
            .call(endpoints.details, endpoints.details_method.clone(), Some(&body))
            .await?;
        match value.get(endpoints.record_key) {
            Some(record) => Record::from_value(record.clone()),
            None => Err(ConsoleError::Request(format!(
                "{} {id} not found",
                entity_type.label()
            ))),
        }
    }

    /// Raw create response: `{success, <type>: record, message?}`.
    pub async fn create(&self, entity_type: EntityType, payload: &Map<String, Value>) -> Result<Value> {
        let body = Value::Object(payload.clone());
        self.call(entity_type.endpoints().create, Method::POST, Some(&body))
            .await
    }

    /// Raw update response; `payload` must carry the record's `id`.
    pub async fn update(&self, entity_type: EntityType, payload: &Map<String, Value>) -> Result<Value> {
        let body = Value::Object(payload.clone());
        self.call(entity_type.endpoints().update, Method::PUT, Some(&body))
            .await
    }

    pub async fn chat_history(
        &self,
        creator_id: &RecordId,
        fan_id: &RecordId,
    ) -> Result<Vec<ChatMessage>> {
        let query = [
            ("creator_id", creator_id.to_string()),
            ("fan_id", fan_id.to_string()),
        ];
        let value = self
            .request("/get_chat_history", Method::GET, &query, None)
            .await?;
        let items = match value.get("messages") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ChatMessage>(item) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable chat message");
                    None
                }
            })
            .collect())
    }

    pub async fn send_fan_message(
        &self,
        creator_id: &RecordId,
        fan_id: &RecordId,
        content: &str,
    ) -> Result<Value> {
        let body = serde_json::to_value(FanMessageRequest {
            fan_id: fan_id.as_value(),
            creator_id: creator_id.as_value(),
            content,
        })?;
        self.call("/send_fan_message", Method::POST, Some(&body)).await
    }

    /// Raw `recommended_chats` response; validation belongs to the chat workflow.
    pub async fn recommended_chats(
        &self,
        creator_id: &RecordId,
        fan_id: &RecordId,
        system_prompt_id: &RecordId,
    ) -> Result<Value> {
        let body = serde_json::to_value(RecommendationRequest {
            creator_id: creator_id.as_value(),
            fan_id: fan_id.as_value(),
            system_prompt_id: system_prompt_id.as_value(),
            chat_type: TEXT_CHAT,
        })?;
        self.call("/recommended_chats", Method::POST, Some(&body)).await
    }

    pub async fn select_reply(
        &self,
        creator_id: &RecordId,
        fan_id: &RecordId,
        recommendation: &Recommendation,
    ) -> Result<Value> {
        let body = serde_json::to_value(ReplySelection {
            fan_id: fan_id.as_value(),
            creator_id: creator_id.as_value(),
            reply_content: &recommendation.content,
            reply_id: &recommendation.reply_id,
            chat_type: TEXT_CHAT,
        })?;
        self.call("/chatter_selected_chat_reply", Method::POST, Some(&body))
            .await
    }

    /// Exchanges operator credentials for an API key and stores it.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let response = self
            .inner
            .http
            .post(self.url(&self.inner.login_path))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|err| ConsoleError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ConsoleError::Network(err.to_string()))?;
        if !status.is_success() {
            let message = error_field(&body).unwrap_or_else(|| {
                if status == StatusCode::UNAUTHORIZED {
                    "Invalid username or password".to_string()
                } else {
                    format!("HTTP error! status: {}", status.as_u16())
                }
            });
            return Err(ConsoleError::Request(message));
        }
        let value: Value = serde_json::from_str(&body)?;
        let api_key = value
            .get("api_key")
            .and_then(Value::as_str)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConsoleError::Request("Login response carried no API key".to_string()))?;
        self.inner.tokens.store(api_key)?;
        info!(username, "logged in");
        Ok(())
    }

    /// Best-effort server logout; the local token is always discarded.
    pub async fn logout(&self) {
        match self.call("/logout", Method::POST, None).await {
            Ok(_) => {}
            // 401 already went through force_logout.
            Err(ConsoleError::AuthExpired) => return,
            Err(err) => warn!(error = %err, "logout request failed"),
        }
        self.force_logout();
    }

    pub async fn health(&self) -> Result<String> {
        let value = self.call("/health", Method::GET, None).await?;
        Ok(value
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}
