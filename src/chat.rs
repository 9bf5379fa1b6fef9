//! Recommendation-assisted chat: history, fan messages, reply suggestions
//! and the operator's pick, plus the standalone Generate panel.
//!
//! State changes go through `ChatSession::begin_*`/`apply_*` so an
//! event-driven UI can run the network half on its own tasks. The free
//! async functions own their inputs for that reason.

use std::time::{Duration, Instant};

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::chat_fsm::{transition, ChatAction, ChatPhase};
use crate::client::ApiClient;
use crate::domains::chat::{ChatMessage, Recommendation};
use crate::domains::entity::{EntityType, RecordId};
use crate::error::{ConsoleError, Result};
use crate::store::EntityStore;

pub const BANNER_TTL: Duration = Duration::from_secs(5);
pub const SELECT_TO_CHAT: &str = "Select a creator and fan to start chatting";
pub const SELECT_ALL_THREE: &str = "Please select a creator, fan, and system prompt";
pub const NO_RECOMMENDATIONS: &str = "No recommendations received from server.";
pub const NO_VALID_RECOMMENDATIONS: &str = "No valid recommendations generated. Please try again.";
pub const NO_VALID_GENERATED: &str =
    "No valid recommendations generated. The AI service may be experiencing issues. Please try again.";

static MISTRAL_MESSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""message"\s*:\s*"([^"]+)""#).expect("mistral message pattern"));
static INTERNAL_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Internal server error:\s*(.+)").expect("internal error pattern"));

/// The conversation a request belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatTarget {
    pub creator_id: RecordId,
    pub fan_id: RecordId,
    pub system_prompt_id: Option<RecordId>,
}

impl ChatTarget {
    pub fn from_store(store: &EntityStore) -> Option<Self> {
        Some(Self {
            creator_id: store.selected_id(EntityType::Creator)?,
            fan_id: store.selected_id(EntityType::Fan)?,
            system_prompt_id: store.selected_id(EntityType::SystemPrompt),
        })
    }

    fn prompt_id(&self) -> Result<&RecordId> {
        self.system_prompt_id
            .as_ref()
            .ok_or_else(|| ConsoleError::UserInputInvalid(SELECT_ALL_THREE.to_string()))
    }
}

/// Checks a `recommended_chats` response and drops placeholder entries.
/// `empty_message` is reported when nothing usable survives.
pub fn validate_recommendations(response: &Value, empty_message: &str) -> Result<Vec<Recommendation>> {
    match response.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {}
        Some(Value::String(message)) if message.is_empty() => {}
        Some(Value::String(message)) => return Err(ConsoleError::Request(message.clone())),
        Some(other) => return Err(ConsoleError::Request(other.to_string())),
    }

    let entries = match response.get("recommendations") {
        Some(Value::Array(entries)) if !entries.is_empty() => entries,
        _ => return Err(ConsoleError::ValidationEmpty(NO_RECOMMENDATIONS.to_string())),
    };

    let valid: Vec<Recommendation> = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Recommendation>(entry.clone()) {
            Ok(recommendation) => Some(recommendation),
            Err(err) => {
                warn!(error = %err, "skipping unreadable recommendation");
                None
            }
        })
        .filter(|recommendation| {
            let placeholder = recommendation.is_placeholder();
            if placeholder {
                debug!("dropping placeholder recommendation");
            }
            !placeholder
        })
        .collect();

    if valid.is_empty() {
        return Err(ConsoleError::ValidationEmpty(empty_message.to_string()));
    }
    Ok(valid)
}

/// Rewrites recommendation failures from the AI backend into operator text.
pub fn friendly_error(message: &str) -> String {
    let mut text = message.to_string();
    if let Some(rest) = INTERNAL_ERROR
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|found| found.as_str().to_string())
    {
        text = rest;
    }
    if text.contains("Mistral API error:") {
        if let Some(inner) = MISTRAL_MESSAGE.captures(&text).and_then(|caps| caps.get(1)) {
            return inner.as_str().to_string();
        }
        if text.contains("Status 429") {
            return "Service capacity exceeded. Please try again in a moment.".to_string();
        }
        if text.contains("Status 401") {
            return "API authentication failed. Please check your API key.".to_string();
        }
        if text.contains("Status 500") {
            return "AI service error. Please try again later.".to_string();
        }
    }
    text
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerKind {
    Error,
    Notice,
}

/// Transient message strip shown above the console.
#[derive(Clone, Debug)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
    created: Instant,
}

impl Banner {
    pub fn error(text: impl Into<String>) -> Self {
        Self::at(BannerKind::Error, text, Instant::now())
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self::at(BannerKind::Notice, text, Instant::now())
    }

    pub fn at(kind: BannerKind, text: impl Into<String>, created: Instant) -> Self {
        Self {
            kind,
            text: text.into(),
            created,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= BANNER_TTL
    }
}

/// Error shown inside the transcript until the next history load.
#[derive(Clone, Debug, PartialEq)]
pub struct InlineError {
    pub text: String,
    pub time: String,
}

/// History for the pair. Failures are logged and read as an empty history.
pub async fn fetch_history(client: ApiClient, target: ChatTarget) -> Vec<ChatMessage> {
    match client.chat_history(&target.creator_id, &target.fan_id).await {
        Ok(messages) => messages,
        Err(err) => {
            warn!(
                creator_id = %target.creator_id,
                fan_id = %target.fan_id,
                error = %err,
                "chat history unavailable"
            );
            Vec::new()
        }
    }
}

/// Persists a fan message and returns the refreshed history.
pub async fn send_message(
    client: ApiClient,
    target: ChatTarget,
    content: String,
) -> Result<Vec<ChatMessage>> {
    client
        .send_fan_message(&target.creator_id, &target.fan_id, &content)
        .await?;
    Ok(fetch_history(client, target).await)
}

pub async fn fetch_recommendations(
    client: ApiClient,
    target: ChatTarget,
) -> Result<Vec<Recommendation>> {
    request_validated(&client, &target, NO_VALID_RECOMMENDATIONS).await
}

/// Generate-panel variant of [`fetch_recommendations`].
pub async fn generate_recommendations(
    client: ApiClient,
    target: ChatTarget,
) -> Result<Vec<Recommendation>> {
    request_validated(&client, &target, NO_VALID_GENERATED).await
}

async fn request_validated(
    client: &ApiClient,
    target: &ChatTarget,
    empty_message: &str,
) -> Result<Vec<Recommendation>> {
    let prompt_id = target.prompt_id()?;
    let response = client
        .recommended_chats(&target.creator_id, &target.fan_id, prompt_id)
        .await?;
    validate_recommendations(&response, empty_message)
}

/// Records the operator's pick and returns the refreshed history.
pub async fn confirm_reply(
    client: ApiClient,
    target: ChatTarget,
    recommendation: Recommendation,
) -> Result<Vec<ChatMessage>> {
    client
        .select_reply(&target.creator_id, &target.fan_id, &recommendation)
        .await?;
    Ok(fetch_history(client, target).await)
}

#[derive(Debug, Default)]
pub struct ChatSession {
    phase: ChatPhase,
    target: Option<ChatTarget>,
    messages: Vec<ChatMessage>,
    pending: Vec<Recommendation>,
    inline_errors: Vec<InlineError>,
    input: String,
    banner: Option<Banner>,
    generated: Vec<Recommendation>,
    generating: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn target(&self) -> Option<&ChatTarget> {
        self.target.as_ref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn pending(&self) -> &[Recommendation] {
        &self.pending
    }

    pub fn inline_errors(&self) -> &[InlineError] {
        &self.inline_errors
    }

    pub fn generated(&self) -> &[Recommendation] {
        &self.generated
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    fn advance(&mut self, action: ChatAction) {
        match transition(self.phase, action) {
            Some(next) => self.phase = next,
            None => debug!(phase = ?self.phase, ?action, "chat transition ignored"),
        }
    }

    /// Follows the store's selections. Returns the pair whose history should
    /// be loaded, or `None` when the chat is closed.
    pub fn sync_selection(&mut self, store: &EntityStore) -> Option<ChatTarget> {
        match ChatTarget::from_store(store) {
            Some(target) => {
                let same_pair = self.target.as_ref().is_some_and(|current| {
                    current.creator_id == target.creator_id && current.fan_id == target.fan_id
                });
                if !same_pair {
                    self.messages.clear();
                    self.pending.clear();
                    self.inline_errors.clear();
                }
                self.target = Some(target.clone());
                if !self.phase.is_busy() {
                    self.advance(ChatAction::Open);
                }
                Some(target)
            }
            None => {
                self.target = None;
                self.messages.clear();
                self.pending.clear();
                self.inline_errors.clear();
                self.advance(ChatAction::Close);
                None
            }
        }
    }

    pub fn apply_history(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
        self.inline_errors.clear();
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        match self.phase {
            ChatPhase::NeedsSelection => Some(SELECT_TO_CHAT),
            _ => None,
        }
    }

    /// Input is live once the pair is open, a prompt is chosen and nothing is in flight.
    pub fn can_send(&self) -> bool {
        self.phase == ChatPhase::Ready
            && self
                .target
                .as_ref()
                .is_some_and(|target| target.system_prompt_id.is_some())
    }

    pub fn send_label(&self) -> &'static str {
        if self.phase.is_busy() {
            "Sending..."
        } else {
            "Send"
        }
    }

    pub fn loading_text(&self) -> Option<&'static str> {
        match self.phase {
            ChatPhase::AwaitingRecommendations => Some("Generating recommendations..."),
            ChatPhase::RecommendationSelected => Some("Sending reply..."),
            _ => None,
        }
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    /// Banner for a failed action. Expired sessions are handled by the login
    /// screen instead.
    pub fn show_error(&mut self, err: &ConsoleError) {
        if err.is_auth_expired() {
            return;
        }
        self.banner = Some(Banner::error(err.user_message()));
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.banner = Some(Banner::notice(text));
    }

    /// Drops an expired banner. Returns true when one was removed.
    pub fn expire_banner(&mut self, now: Instant) -> bool {
        if self.banner.as_ref().is_some_and(|banner| banner.is_expired(now)) {
            self.banner = None;
            return true;
        }
        false
    }

    fn fail_with(&mut self, err: &ConsoleError, fallback: &str) {
        if err.is_auth_expired() {
            return;
        }
        let text = err.user_message();
        let text = if text.trim().is_empty() {
            fallback.to_string()
        } else {
            text
        };
        error!(error = %text, "chat action failed");
        self.banner = Some(Banner::error(text));
    }

    /// Starts sending the typed message. `Ok(None)` for blank input or while
    /// another request is running.
    pub fn begin_send(&mut self) -> Result<Option<(ChatTarget, String)>> {
        let content = self.input.trim().to_string();
        if content.is_empty() {
            return Ok(None);
        }
        let target = self
            .target
            .clone()
            .ok_or_else(|| ConsoleError::UserInputInvalid(SELECT_TO_CHAT.to_string()))?;
        match transition(self.phase, ChatAction::Send) {
            Some(next) => self.phase = next,
            None => return Ok(None),
        }
        Ok(Some((target, content)))
    }

    /// Applies a send result. On success returns the target to request
    /// recommendations for, when a prompt is selected.
    pub fn apply_sent(&mut self, result: Result<Vec<ChatMessage>>) -> Result<Option<ChatTarget>> {
        match result {
            Ok(history) => {
                self.input.clear();
                self.apply_history(history);
                self.pending.clear();
                let follow_up = self
                    .target
                    .clone()
                    .filter(|target| target.system_prompt_id.is_some());
                if follow_up.is_some() {
                    self.advance(ChatAction::RequestRecommendations);
                } else {
                    self.advance(ChatAction::Sent);
                }
                Ok(follow_up)
            }
            Err(err) => {
                self.fail_with(&err, "Failed to send message");
                self.advance(ChatAction::Failed);
                Err(err)
            }
        }
    }

    /// Asks for suggestions without sending a message first.
    pub fn begin_recommendations(&mut self) -> Result<Option<ChatTarget>> {
        let target = self
            .target
            .clone()
            .ok_or_else(|| ConsoleError::UserInputInvalid(SELECT_TO_CHAT.to_string()))?;
        target.prompt_id()?;
        match transition(self.phase, ChatAction::RequestRecommendations) {
            Some(next) => {
                self.phase = next;
                self.pending.clear();
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }

    pub fn apply_recommendations(
        &mut self,
        result: Result<Vec<Recommendation>>,
    ) -> Result<usize> {
        match result {
            Ok(recommendations) => {
                self.pending = recommendations;
                self.advance(ChatAction::RecommendationsReceived);
                Ok(self.pending.len())
            }
            Err(err) => {
                self.advance(ChatAction::Failed);
                if !err.is_auth_expired() {
                    let text = friendly_error(&err.user_message());
                    error!(error = %text, "recommendations failed");
                    self.inline_errors.push(InlineError {
                        text: text.clone(),
                        time: Local::now().format("%H:%M:%S").to_string(),
                    });
                    self.banner = Some(Banner::error(text));
                }
                Err(err)
            }
        }
    }

    /// Takes pending recommendation `index` for sending. Out-of-range
    /// indexes and busy phases are no-ops.
    pub fn begin_selection(&mut self, index: usize) -> Option<(ChatTarget, Recommendation)> {
        let target = self.target.clone()?;
        if index >= self.pending.len() {
            return None;
        }
        self.phase = transition(self.phase, ChatAction::Pick)?;
        let chosen = self.pending.swap_remove(index);
        self.pending.clear();
        Some((target, chosen))
    }

    pub fn apply_selection(&mut self, result: Result<Vec<ChatMessage>>) -> Result<()> {
        self.advance(ChatAction::Settled);
        match result {
            Ok(history) => {
                self.apply_history(history);
                Ok(())
            }
            Err(err) => {
                self.fail_with(&err, "Failed to send reply");
                Err(err)
            }
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn generate_label(&self) -> &'static str {
        if self.generating {
            "Generating..."
        } else {
            "Generate Recommendations"
        }
    }

    /// Starts the Generate panel request. Needs all three selections.
    pub fn begin_generate(&mut self) -> Result<Option<ChatTarget>> {
        let target = self
            .target
            .clone()
            .filter(|target| target.system_prompt_id.is_some())
            .ok_or_else(|| ConsoleError::UserInputInvalid(SELECT_ALL_THREE.to_string()))?;
        if self.generating {
            return Ok(None);
        }
        self.generating = true;
        self.generated.clear();
        self.banner = None;
        Ok(Some(target))
    }

    pub fn apply_generated(&mut self, result: Result<Vec<Recommendation>>) -> Result<usize> {
        self.generating = false;
        match result {
            Ok(recommendations) => {
                self.generated = recommendations;
                Ok(self.generated.len())
            }
            Err(err) => {
                self.fail_with(&err, "Failed to generate recommendations");
                Err(err)
            }
        }
    }

    /// Selects the pair from `store` and loads its history.
    pub async fn open(&mut self, client: &ApiClient, store: &EntityStore) -> Result<()> {
        let target = self
            .sync_selection(store)
            .ok_or_else(|| ConsoleError::UserInputInvalid(SELECT_TO_CHAT.to_string()))?;
        let history = fetch_history(client.clone(), target).await;
        self.apply_history(history);
        Ok(())
    }

    /// Sends `content` as the fan, then requests suggestions when a prompt
    /// is selected. Blank content does nothing.
    pub async fn send(&mut self, client: &ApiClient, content: &str) -> Result<()> {
        self.set_input(content);
        let Some((target, content)) = self.begin_send()? else {
            return Ok(());
        };
        let sent = send_message(client.clone(), target, content).await;
        if let Some(target) = self.apply_sent(sent)? {
            let result = fetch_recommendations(client.clone(), target).await;
            self.apply_recommendations(result)?;
        }
        Ok(())
    }

    pub async fn request_recommendations(&mut self, client: &ApiClient) -> Result<usize> {
        let Some(target) = self.begin_recommendations()? else {
            return Ok(0);
        };
        let result = fetch_recommendations(client.clone(), target).await;
        self.apply_recommendations(result)
    }

    /// Returns false when `index` named no pending recommendation.
    pub async fn select_recommendation(&mut self, client: &ApiClient, index: usize) -> Result<bool> {
        let Some((target, chosen)) = self.begin_selection(index) else {
            return Ok(false);
        };
        let result = confirm_reply(client.clone(), target, chosen).await;
        self.apply_selection(result)?;
        Ok(true)
    }

    /// Supplies suggestions directly, for callers that obtained them elsewhere.
    pub fn set_pending(&mut self, recommendations: Vec<Recommendation>) {
        self.pending = recommendations;
    }

    pub async fn generate(&mut self, client: &ApiClient) -> Result<usize> {
        let Some(target) = self.begin_generate()? else {
            return Ok(0);
        };
        let result = generate_recommendations(client.clone(), target).await;
        self.apply_generated(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::entity::Record;
    use crate::store::Collections;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn selected_store(with_prompt: bool) -> EntityStore {
        let mut store = EntityStore::from_collections(Collections {
            creators: vec![record(json!({"id": "C1", "creator_name": "Ana"}))],
            fans: vec![record(json!({"id": "F1", "fan_name": "Sam"}))],
            system_prompts: vec![record(json!({"id": "P1", "system_prompt": "Be kind"}))],
        });
        store.select(EntityType::Creator, &RecordId::from("C1"));
        store.select(EntityType::Fan, &RecordId::from("F1"));
        if with_prompt {
            store.select(EntityType::SystemPrompt, &RecordId::from("P1"));
        }
        store
    }

    fn recs(contents: &[&str]) -> Vec<Recommendation> {
        contents
            .iter()
            .map(|content| serde_json::from_value(json!({"content": content})).unwrap())
            .collect()
    }

    #[test]
    fn validation_rejects_error_missing_and_placeholders() {
        let err = validate_recommendations(
            &json!({"error": "Internal server error: quota"}),
            NO_VALID_RECOMMENDATIONS,
        )
        .unwrap_err();
        assert!(matches!(err, ConsoleError::Request(ref m) if m == "Internal server error: quota"));

        let err = validate_recommendations(&json!({"recommendations": []}), NO_VALID_RECOMMENDATIONS)
            .unwrap_err();
        assert_eq!(err.user_message(), NO_RECOMMENDATIONS);

        let err = validate_recommendations(
            &json!({"recommendations": [{"content": "Recommended reply based on persona: shy"}]}),
            NO_VALID_RECOMMENDATIONS,
        )
        .unwrap_err();
        assert!(matches!(err, ConsoleError::ValidationEmpty(ref m) if m == NO_VALID_RECOMMENDATIONS));
    }

    #[test]
    fn validation_keeps_real_suggestions_in_order() {
        let kept = validate_recommendations(
            &json!({"recommendations": [
                {"content": "hey you!", "confidence": 0.9, "reply_id": 11},
                {"content": "Recommended reply based on persona: shy"},
                {"content": "miss me?"}
            ]}),
            NO_VALID_RECOMMENDATIONS,
        )
        .unwrap();
        let contents: Vec<&str> = kept.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["hey you!", "miss me?"]);
        assert_eq!(kept[0].reply_id, Some(json!(11)));
    }

    #[test]
    fn friendly_error_rewrites_backend_failures() {
        assert_eq!(friendly_error("Internal server error: quota hit"), "quota hit");
        assert_eq!(
            friendly_error(
                r#"Internal server error: Mistral API error: Status 429 {"message": "Rate limit reached"}"#
            ),
            "Rate limit reached"
        );
        assert_eq!(
            friendly_error("Mistral API error: Status 429 Too Many Requests"),
            "Service capacity exceeded. Please try again in a moment."
        );
        assert_eq!(
            friendly_error("Mistral API error: Status 401"),
            "API authentication failed. Please check your API key."
        );
        assert_eq!(
            friendly_error("Mistral API error: Status 500"),
            "AI service error. Please try again later."
        );
        assert_eq!(friendly_error("Fan not found"), "Fan not found");
    }

    #[test]
    fn banner_expires_after_five_seconds() {
        let start = Instant::now();
        let banner = Banner::at(BannerKind::Error, "boom", start);
        assert!(!banner.is_expired(start + Duration::from_secs(4)));
        assert!(banner.is_expired(start + Duration::from_secs(5)));
    }

    #[test]
    fn chat_needs_creator_and_fan() {
        let mut session = ChatSession::new();
        let store = EntityStore::from_collections(Collections::default());
        assert!(session.sync_selection(&store).is_none());
        assert_eq!(session.placeholder(), Some(SELECT_TO_CHAT));
        session.set_input("hello");
        assert!(matches!(
            session.begin_send(),
            Err(ConsoleError::UserInputInvalid(_))
        ));
    }

    #[test]
    fn blank_message_is_a_no_op() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(true));
        session.set_input("   \n ");
        assert!(session.begin_send().unwrap().is_none());
        assert_eq!(session.phase(), ChatPhase::Ready);
    }

    #[test]
    fn input_requires_a_prompt() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(false));
        assert_eq!(session.phase(), ChatPhase::Ready);
        assert!(!session.can_send());
        session.sync_selection(&selected_store(true));
        assert!(session.can_send());
    }

    #[test]
    fn send_success_with_prompt_requests_recommendations() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(true));
        session.set_pending(recs(&["stale"]));
        session.set_input("  hi there ");
        let (target, content) = session.begin_send().unwrap().unwrap();
        assert_eq!(content, "hi there");
        assert_eq!(session.send_label(), "Sending...");
        assert!(!session.can_send());

        let follow_up = session.apply_sent(Ok(Vec::new())).unwrap();
        assert_eq!(follow_up, Some(target));
        assert!(session.pending().is_empty());
        assert!(session.input().is_empty());
        assert_eq!(session.phase(), ChatPhase::AwaitingRecommendations);
        assert_eq!(session.loading_text(), Some("Generating recommendations..."));
    }

    #[test]
    fn send_failure_shows_banner_and_reenables_input() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(true));
        session.set_input("hi");
        session.begin_send().unwrap().unwrap();
        let err = session
            .apply_sent(Err(ConsoleError::Request("Fan not found".into())))
            .unwrap_err();
        assert_eq!(err.user_message(), "Fan not found");
        assert_eq!(session.banner().map(|b| b.text.as_str()), Some("Fan not found"));
        assert!(session.can_send());
        assert_eq!(session.input(), "hi");
    }

    #[test]
    fn recommendation_failure_is_inline_and_banner() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(true));
        session.begin_recommendations().unwrap().unwrap();
        let _ = session.apply_recommendations(Err(ConsoleError::Request(
            "Internal server error: model offline".into(),
        )));
        assert_eq!(session.inline_errors()[0].text, "model offline");
        assert_eq!(session.banner().unwrap().text, "model offline");
        assert_eq!(session.phase(), ChatPhase::Ready);
    }

    #[test]
    fn auth_expiry_never_becomes_a_banner() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(true));
        session.set_input("hi");
        session.begin_send().unwrap();
        let _ = session.apply_sent(Err(ConsoleError::AuthExpired));
        assert!(session.banner().is_none());
    }

    #[test]
    fn selecting_takes_one_and_clears_the_rest() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(true));
        session.set_pending(recs(&["a", "b", "c"]));
        assert!(session.begin_selection(7).is_none());
        assert_eq!(session.pending().len(), 3);

        let (_, chosen) = session.begin_selection(1).unwrap();
        assert_eq!(chosen.content, "b");
        assert!(session.pending().is_empty());
        assert_eq!(session.loading_text(), Some("Sending reply..."));
        session.apply_selection(Ok(Vec::new())).unwrap();
        assert_eq!(session.phase(), ChatPhase::Ready);
        assert!(session.loading_text().is_none());
    }

    #[test]
    fn generate_requires_all_three_and_relabels() {
        let mut session = ChatSession::new();
        session.sync_selection(&selected_store(false));
        let err = session.begin_generate().unwrap_err();
        assert_eq!(err.user_message(), SELECT_ALL_THREE);

        session.sync_selection(&selected_store(true));
        session.begin_generate().unwrap().unwrap();
        assert_eq!(session.generate_label(), "Generating...");
        assert!(session.begin_generate().unwrap().is_none());
        session.apply_generated(Ok(recs(&["x"]))).unwrap();
        assert_eq!(session.generated().len(), 1);
        assert_eq!(session.generate_label(), "Generate Recommendations");
    }

    #[test]
    fn deselecting_closes_the_chat() {
        let mut session = ChatSession::new();
        let mut store = selected_store(true);
        session.sync_selection(&store);
        session.apply_history(vec![serde_json::from_value(json!({"content": "hi"})).unwrap()]);
        store.clear_selection(EntityType::Fan);
        assert!(session.sync_selection(&store).is_none());
        assert!(session.messages().is_empty());
        assert_eq!(session.phase(), ChatPhase::NeedsSelection);
    }
}
