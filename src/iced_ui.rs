use iced::widget::{
    button, column, container, row, scrollable, text, text_editor, text_input, Space,
};
use iced::{
    application, time, Background, Border, Color, Element, Length, Shadow, Size,
    Subscription, Task, Theme,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cards::{self, Card};
use crate::chat::{self, BannerKind, ChatSession};
use crate::client::{ApiClient, RedirectLatch};
use crate::config::ConsoleConfig;
use crate::console::{self, Startup};
use crate::domains::chat::{ChatMessage, Recommendation};
use crate::domains::entity::{EntityType, RecordId};
use crate::editor::form::{FieldInput, FormField};
use crate::editor::{self, CancelOutcome, EditorMode, RecordEditor, SaveRequest, SavedRecord};
use crate::error::Result;
use crate::store::{Collections, EntityStore};
use crate::vault::TokenStore;

#[derive(Clone)]
pub struct IcedUiLaunchConfig {
    pub config: ConsoleConfig,
    pub tokens: Arc<dyn TokenStore>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Screen {
    Loading,
    Login,
    Console,
}

struct ConsoleApp {
    client: Option<ApiClient>,
    redirects: Arc<RedirectLatch>,
    fatal: Option<String>,
    screen: Screen,
    username: String,
    password: String,
    login_busy: bool,
    login_error: String,
    refreshing: bool,
    store: EntityStore,
    editor: Option<RecordEditor>,
    long_text: Vec<(String, text_editor::Content)>,
    chat: ChatSession,
}

#[derive(Clone, Debug)]
enum Message {
    Tick,
    Started(Result<Startup>),
    UsernameChanged(String),
    PasswordChanged(String),
    LoginPressed,
    LoginFinished(Result<Collections>),
    LogoutPressed,
    LoggedOut,
    RefreshPressed,
    Loaded(Result<Collections>),
    CardPressed(EntityType, RecordId),
    DetailsPressed(EntityType, RecordId),
    CreatePressed(EntityType),
    EditPressed,
    CancelPressed,
    SavePressed,
    Saved(SaveRequest, Result<SavedRecord>),
    FieldChanged(String, String),
    LongTextEdited(String, text_editor::Action),
    FlagToggled(String),
    ItemChanged(String, u64, String),
    ItemAdded(String),
    ItemRemoved(String, u64),
    HistoryLoaded(Vec<ChatMessage>),
    ChatInputChanged(String),
    ChatSendPressed,
    ChatSent(Result<Vec<ChatMessage>>),
    RecommendationsReady(Result<Vec<Recommendation>>),
    RecommendationPicked(usize),
    ReplyConfirmed(Result<Vec<ChatMessage>>),
    GeneratePressed,
    Generated(Result<Vec<Recommendation>>),
}

pub fn launch_ui(config: IcedUiLaunchConfig) -> iced::Result {
    let boot_config = config.clone();
    application(
        move || {
            let state = ConsoleApp::new(boot_config.clone());
            let boot = match state.client.clone() {
                Some(client) => Task::perform(console::start(client), Message::Started),
                None => Task::none(),
            };
            (state, boot)
        },
        update,
        view,
    )
    .title(app_title)
    .theme(app_theme)
    .window(iced::window::Settings {
        size: Size::new(1360.0, 880.0),
        min_size: Some(Size::new(1040.0, 700.0)),
        ..Default::default()
    })
    .subscription(subscription)
    .run()
}

fn app_title(_state: &ConsoleApp) -> String {
    "Chatter Console".to_string()
}

fn app_theme(_state: &ConsoleApp) -> Theme {
    Theme::Dark
}

fn subscription(_state: &ConsoleApp) -> Subscription<Message> {
    time::every(Duration::from_secs(1)).map(|_| Message::Tick)
}

impl ConsoleApp {
    fn new(flags: IcedUiLaunchConfig) -> Self {
        let redirects = Arc::new(RedirectLatch::new());
        let (client, fatal) = match console::connect(&flags.config, flags.tokens, redirects.clone())
        {
            Ok(client) => (Some(client), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            client,
            redirects,
            fatal,
            screen: Screen::Loading,
            username: String::new(),
            password: String::new(),
            login_busy: false,
            login_error: String::new(),
            refreshing: false,
            store: EntityStore::new(),
            editor: None,
            long_text: Vec::new(),
            chat: ChatSession::new(),
        }
    }

    fn to_login(&mut self, notice: &str) {
        self.screen = Screen::Login;
        self.store = EntityStore::new();
        self.editor = None;
        self.long_text.clear();
        self.chat = ChatSession::new();
        self.password.clear();
        self.login_busy = false;
        self.refreshing = false;
        self.login_error = notice.to_string();
    }

    fn enter_console(&mut self, collections: Collections) {
        self.store.replace_all(collections);
        self.screen = Screen::Console;
    }

    /// Keeps the chat panel in step with the store's selections.
    fn sync_chat(&mut self, reload_history: bool) -> Task<Message> {
        let target = self.chat.sync_selection(&self.store);
        match (target, self.client.clone()) {
            (Some(target), Some(client)) if reload_history => Task::perform(
                chat::fetch_history(client, target),
                Message::HistoryLoaded,
            ),
            _ => Task::none(),
        }
    }

    fn refresh_long_text(&mut self) {
        self.long_text = self
            .editor
            .as_ref()
            .and_then(RecordEditor::form)
            .map(|form| {
                form.fields()
                    .iter()
                    .filter(|field| field.descriptor.kind.is_multiline())
                    .filter_map(|field| match &field.input {
                        FieldInput::Text(value) => Some((
                            field.descriptor.name.clone(),
                            text_editor::Content::with_text(value),
                        )),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
    }

    fn long_text_for(&self, name: &str) -> Option<&text_editor::Content> {
        self.long_text
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, content)| content)
    }
}

fn update(state: &mut ConsoleApp, message: Message) -> Task<Message> {
    let redirected = !state.redirects.take().is_empty();
    if let Message::LoggedOut = message {
        info!("logged out");
        state.to_login("");
        return Task::none();
    }
    if redirected {
        warn!("session expired, returning to login");
        state.to_login("Session expired. Please log in again.");
        return Task::none();
    }

    let Some(client) = state.client.clone() else {
        return Task::none();
    };

    match message {
        Message::Tick => {
            state.chat.expire_banner(Instant::now());
            Task::none()
        }
        Message::Started(result) => {
            match result {
                Ok(Startup::NeedsLogin) => state.to_login(""),
                Ok(Startup::Loaded(collections)) => state.enter_console(collections),
                Err(err) => {
                    state.screen = Screen::Console;
                    state.chat.show_error(&err);
                }
            }
            Task::none()
        }
        Message::UsernameChanged(value) => {
            state.username = value;
            Task::none()
        }
        Message::PasswordChanged(value) => {
            state.password = value;
            Task::none()
        }
        Message::LoginPressed => {
            if state.login_busy {
                return Task::none();
            }
            state.login_busy = true;
            state.login_error.clear();
            Task::perform(
                console::login(client, state.username.clone(), state.password.clone()),
                Message::LoginFinished,
            )
        }
        Message::LoginFinished(result) => {
            state.login_busy = false;
            match result {
                Ok(collections) => {
                    state.password.clear();
                    state.chat = ChatSession::new();
                    state.enter_console(collections);
                }
                Err(err) => state.login_error = err.user_message(),
            }
            Task::none()
        }
        Message::LogoutPressed => {
            Task::perform(console::logout(client), |_| Message::LoggedOut)
        }
        Message::LoggedOut => Task::none(),
        Message::RefreshPressed => {
            if state.refreshing {
                return Task::none();
            }
            state.refreshing = true;
            Task::perform(console::load(client), Message::Loaded)
        }
        Message::Loaded(result) => {
            state.refreshing = false;
            match result {
                Ok(collections) => {
                    state.store.replace_all(collections);
                    state.sync_chat(false)
                }
                Err(err) => {
                    state.chat.show_error(&err);
                    Task::none()
                }
            }
        }
        Message::CardPressed(entity_type, id) => {
            state.store.select(entity_type, &id);
            state.sync_chat(entity_type != EntityType::SystemPrompt)
        }
        Message::DetailsPressed(entity_type, id) => {
            if let Some(record) = state.store.find(entity_type, &id).cloned() {
                state.editor = Some(RecordEditor::view(entity_type, record));
                state.long_text.clear();
            }
            Task::none()
        }
        Message::CreatePressed(entity_type) => {
            state.editor = Some(RecordEditor::create(entity_type, &state.store));
            state.refresh_long_text();
            Task::none()
        }
        Message::EditPressed => {
            if let Some(editor) = state.editor.as_mut() {
                editor.enter_edit();
            }
            state.refresh_long_text();
            Task::none()
        }
        Message::CancelPressed => {
            if let Some(editor) = state.editor.as_mut() {
                if editor.cancel() == CancelOutcome::Closed {
                    state.editor = None;
                }
            }
            state.long_text.clear();
            Task::none()
        }
        Message::SavePressed => {
            let Some(request) = state.editor.as_mut().and_then(RecordEditor::begin_save) else {
                return Task::none();
            };
            Task::perform(
                async move {
                    let result = editor::submit(&client, &request).await;
                    (request, result)
                },
                |(request, result)| Message::Saved(request, result),
            )
        }
        Message::Saved(request, result) => {
            let outcome =
                editor::commit(request.entity_type, request.is_new, result, &mut state.store);
            // The operator may have opened another record while this save ran.
            if let Some(editor) = state.editor.as_mut().filter(|editor| editor.started(&request)) {
                editor.settle(&outcome);
                if outcome.as_ref().is_ok_and(|outcome| outcome.closes_editor()) {
                    state.editor = None;
                }
                if outcome.is_ok() {
                    state.long_text.clear();
                }
            }
            match outcome {
                Ok(outcome) => state.chat.show_notice(outcome.message()),
                Err(err) => state.chat.show_error(&err),
            }
            Task::none()
        }
        Message::FieldChanged(name, value) => {
            if let Some(form) = state.editor.as_mut().and_then(RecordEditor::form_mut) {
                form.set_text(&name, value);
            }
            Task::none()
        }
        Message::LongTextEdited(name, action) => {
            let Some(form) = state.editor.as_mut().and_then(RecordEditor::form_mut) else {
                return Task::none();
            };
            if let Some((_, content)) = state.long_text.iter_mut().find(|(field, _)| *field == name)
            {
                content.perform(action);
                form.set_text(&name, content.text());
            }
            Task::none()
        }
        Message::FlagToggled(name) => {
            if let Some(form) = state.editor.as_mut().and_then(RecordEditor::form_mut) {
                form.toggle_flag(&name);
            }
            Task::none()
        }
        Message::ItemChanged(name, key, value) => {
            if let Some(form) = state.editor.as_mut().and_then(RecordEditor::form_mut) {
                form.set_item(&name, key, value);
            }
            Task::none()
        }
        Message::ItemAdded(name) => {
            if let Some(form) = state.editor.as_mut().and_then(RecordEditor::form_mut) {
                form.add_item(&name);
            }
            Task::none()
        }
        Message::ItemRemoved(name, key) => {
            if let Some(form) = state.editor.as_mut().and_then(RecordEditor::form_mut) {
                form.remove_item(&name, key);
            }
            Task::none()
        }
        Message::HistoryLoaded(messages) => {
            state.chat.apply_history(messages);
            Task::none()
        }
        Message::ChatInputChanged(value) => {
            state.chat.set_input(value);
            Task::none()
        }
        Message::ChatSendPressed => {
            if !state.chat.can_send() {
                return Task::none();
            }
            match state.chat.begin_send() {
                Ok(Some((target, content))) => Task::perform(
                    chat::send_message(client, target, content),
                    Message::ChatSent,
                ),
                Ok(None) => Task::none(),
                Err(err) => {
                    state.chat.show_error(&err);
                    Task::none()
                }
            }
        }
        Message::ChatSent(result) => match state.chat.apply_sent(result) {
            Ok(Some(target)) => Task::perform(
                chat::fetch_recommendations(client, target),
                Message::RecommendationsReady,
            ),
            _ => Task::none(),
        },
        Message::RecommendationsReady(result) => {
            let _ = state.chat.apply_recommendations(result);
            Task::none()
        }
        Message::RecommendationPicked(index) => match state.chat.begin_selection(index) {
            Some((target, chosen)) => Task::perform(
                chat::confirm_reply(client, target, chosen),
                Message::ReplyConfirmed,
            ),
            None => Task::none(),
        },
        Message::ReplyConfirmed(result) => {
            let _ = state.chat.apply_selection(result);
            Task::none()
        }
        Message::GeneratePressed => match state.chat.begin_generate() {
            Ok(Some(target)) => Task::perform(
                chat::generate_recommendations(client, target),
                Message::Generated,
            ),
            Ok(None) => Task::none(),
            Err(err) => {
                state.chat.show_error(&err);
                Task::none()
            }
        },
        Message::Generated(result) => {
            let _ = state.chat.apply_generated(result);
            Task::none()
        }
    }
}

fn view(state: &ConsoleApp) -> Element<'_, Message> {
    let body: Element<'_, Message> = if let Some(fatal) = &state.fatal {
        container(text(format!("Console could not start: {fatal}")).color([0.95, 0.45, 0.45]))
            .padding(24)
            .style(glass_panel)
            .into()
    } else {
        match state.screen {
            Screen::Loading => container(text("Loading...").size(18))
                .padding(24)
                .style(glass_panel)
                .into(),
            Screen::Login => view_login(state),
            Screen::Console => view_console(state),
        }
    };

    container(container(body).height(Length::Fill).padding(16).style(glass_shell))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .into()
}

fn glass_shell(_theme: &Theme) -> iced::widget::container::Style {
    iced::widget::container::Style {
        text_color: None,
        background: Some(Background::Color(Color::from_rgba(0.08, 0.09, 0.16, 0.70))),
        border: Border {
            radius: 18.0.into(),
            width: 1.0,
            color: Color::from_rgba(1.0, 1.0, 1.0, 0.10),
        },
        shadow: Shadow::default(),
        snap: false,
    }
}

fn glass_panel(_theme: &Theme) -> iced::widget::container::Style {
    iced::widget::container::Style {
        text_color: None,
        background: Some(Background::Color(Color::from_rgba(0.12, 0.13, 0.24, 0.60))),
        border: Border {
            radius: 14.0.into(),
            width: 1.0,
            color: Color::from_rgba(1.0, 1.0, 1.0, 0.12),
        },
        shadow: Shadow::default(),
        snap: false,
    }
}

fn bubble(background: Color) -> iced::widget::container::Style {
    iced::widget::container::Style {
        text_color: Some(Color::WHITE),
        background: Some(Background::Color(background)),
        border: Border {
            radius: 14.0.into(),
            width: 1.0,
            color: Color::from_rgba(1.0, 1.0, 1.0, 0.14),
        },
        shadow: Shadow::default(),
        snap: false,
    }
}

fn fan_bubble(_theme: &Theme) -> iced::widget::container::Style {
    bubble(Color::from_rgba(0.20, 0.45, 0.85, 0.60))
}

fn creator_bubble(_theme: &Theme) -> iced::widget::container::Style {
    bubble(Color::from_rgba(0.55, 0.25, 0.85, 0.58))
}

fn error_banner(_theme: &Theme) -> iced::widget::container::Style {
    bubble(Color::from_rgba(0.75, 0.20, 0.22, 0.80))
}

fn notice_banner(_theme: &Theme) -> iced::widget::container::Style {
    bubble(Color::from_rgba(0.16, 0.55, 0.32, 0.80))
}

fn view_login(state: &ConsoleApp) -> Element<'_, Message> {
    let form = column![
        text("Chatter Console").size(28),
        text("Sign in to manage creators, fans and chats").size(14),
        text_input("Username", &state.username)
            .on_input(Message::UsernameChanged)
            .on_submit(Message::LoginPressed)
            .padding(10),
        text_input("Password", &state.password)
            .on_input(Message::PasswordChanged)
            .on_submit(Message::LoginPressed)
            .secure(true)
            .padding(10),
        button(if state.login_busy { "Logging in..." } else { "Login" })
            .padding([10, 16])
            .style(iced::widget::button::primary)
            .on_press_maybe((!state.login_busy).then_some(Message::LoginPressed)),
        if state.login_error.is_empty() {
            text("")
        } else {
            text(state.login_error.clone()).color([0.95, 0.45, 0.45])
        },
    ]
    .spacing(12)
    .width(360);

    container(container(form).padding(24).style(glass_panel))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

fn view_console(state: &ConsoleApp) -> Element<'_, Message> {
    let header = row![
        column![
            text("Chatter Console").size(26),
            text(format!(
                "Backend {}",
                state.client.as_ref().map(ApiClient::base_url).unwrap_or("")
            ))
            .size(13),
        ]
        .spacing(2),
        Space::new().width(Length::Fill),
        button(if state.refreshing { "Refreshing..." } else { "Refresh" })
            .padding([8, 12])
            .style(iced::widget::button::secondary)
            .on_press_maybe((!state.refreshing).then_some(Message::RefreshPressed)),
        button("Logout")
            .padding([8, 12])
            .style(iced::widget::button::danger)
            .on_press(Message::LogoutPressed),
    ]
    .spacing(10)
    .align_y(iced::Alignment::Center);

    let banner: Element<'_, Message> = match state.chat.banner() {
        Some(banner) => container(text(banner.text.clone()).size(14))
            .padding([8, 12])
            .width(Length::Fill)
            .style(match banner.kind {
                BannerKind::Error => error_banner,
                BannerKind::Notice => notice_banner,
            })
            .into(),
        None => Space::new().height(0).into(),
    };

    let columns = EntityType::all()
        .into_iter()
        .fold(row!().spacing(10).height(Length::FillPortion(3)), |row, entity_type| {
            row.push(view_card_column(state, entity_type))
        });

    let left = column![columns, view_generate_panel(state)]
        .spacing(10)
        .width(Length::FillPortion(3))
        .height(Length::Fill);

    let right: Element<'_, Message> = match &state.editor {
        Some(editor) => column![
            container(view_editor(state, editor))
                .height(Length::FillPortion(3))
                .width(Length::Fill),
            container(view_chat(state))
                .height(Length::FillPortion(2))
                .width(Length::Fill),
        ]
        .spacing(10)
        .into(),
        None => view_chat(state),
    };

    column![
        header,
        banner,
        row![
            left,
            container(right)
                .width(Length::FillPortion(2))
                .height(Length::Fill)
        ]
        .spacing(12)
        .height(Length::Fill)
    ]
    .spacing(12)
    .height(Length::Fill)
    .into()
}

fn view_card<'a>(card: &Card) -> Element<'a, Message> {
    let badges = card
        .badges
        .iter()
        .fold(column!().spacing(2), |col, badge| {
            let label = text(badge.text.clone()).size(13);
            col.push(if badge.highlight {
                label.color([0.45, 0.85, 0.55])
            } else {
                label
            })
        });
    let mut body = column![text(card.title.clone()).size(16), badges].spacing(4);
    if let Some(preview) = &card.preview {
        body = body.push(text(preview.clone()).size(12));
    }

    let select = button(body)
        .width(Length::Fill)
        .padding(10)
        .style(if card.selected {
            iced::widget::button::primary
        } else {
            iced::widget::button::secondary
        })
        .on_press_maybe(
            card.id
                .clone()
                .map(|id| Message::CardPressed(card.entity_type, id)),
        );
    let details = button(text("View Details").size(12))
        .padding([4, 8])
        .style(iced::widget::button::text)
        .on_press_maybe(
            card.id
                .clone()
                .map(|id| Message::DetailsPressed(card.entity_type, id)),
        );

    column![select, details].spacing(2).into()
}

fn view_card_column(state: &ConsoleApp, entity_type: EntityType) -> Element<'_, Message> {
    let cards = cards::cards(&state.store, entity_type);
    let list: Element<'_, Message> = if cards.is_empty() {
        text(cards::empty_state(entity_type)).size(14).into()
    } else {
        cards
            .iter()
            .fold(column!().spacing(8), |col, card| col.push(view_card(card)))
            .into()
    };

    container(
        column![
            row![
                text(entity_type.label()).size(18),
                Space::new().width(Length::Fill),
                button(text("+ Add").size(13))
                    .padding([4, 10])
                    .style(iced::widget::button::success)
                    .on_press(Message::CreatePressed(entity_type)),
            ]
            .align_y(iced::Alignment::Center),
            scrollable(list).height(Length::Fill),
        ]
        .spacing(8),
    )
    .padding(10)
    .width(Length::FillPortion(1))
    .height(Length::Fill)
    .style(glass_panel)
    .into()
}

fn view_recommendation_card<'a>(index: usize, recommendation: &Recommendation) -> Element<'a, Message> {
    container(
        column![
            text(format!("Option {}", index + 1)).size(13),
            text(recommendation.content.clone()).size(15),
            row![
                text(format!("Confidence: {}", recommendation.confidence_label())).size(12),
                Space::new().width(Length::Fill),
                text(recommendation.chat_type_label().to_string()).size(12),
            ],
        ]
        .spacing(6),
    )
    .padding(10)
    .width(Length::Fill)
    .style(creator_bubble)
    .into()
}

fn view_generate_panel(state: &ConsoleApp) -> Element<'_, Message> {
    let can_generate = state.store.can_generate() && !state.chat.is_generating();
    let generated = state.chat.generated();

    let mut panel = column![row![
        text("Generated Recommendations").size(18),
        Space::new().width(Length::Fill),
        button(state.chat.generate_label())
            .padding([8, 14])
            .style(iced::widget::button::primary)
            .on_press_maybe(can_generate.then_some(Message::GeneratePressed)),
    ]
    .align_y(iced::Alignment::Center)]
    .spacing(8);

    if !generated.is_empty() {
        panel = panel.push(text(format!("{} reply options", generated.len())).size(13));
        let options = generated
            .iter()
            .enumerate()
            .fold(column!().spacing(8), |col, (index, recommendation)| {
                col.push(view_recommendation_card(index, recommendation))
            });
        panel = panel.push(scrollable(options).height(Length::Fill));
    } else if !state.store.can_generate() {
        panel = panel.push(text("Select a creator, fan, and system prompt to generate").size(13));
    }

    container(panel)
        .padding(10)
        .width(Length::Fill)
        .height(Length::FillPortion(2))
        .style(glass_panel)
        .into()
}

fn view_form_field<'a>(state: &'a ConsoleApp, field: &'a FormField) -> Element<'a, Message> {
    let name = field.descriptor.name.clone();
    let input: Element<'a, Message> = match &field.input {
        FieldInput::Text(value) => match state.long_text_for(&name) {
            Some(content) => {
                let field_name = name.clone();
                text_editor(content)
                    .on_action(move |action| Message::LongTextEdited(field_name.clone(), action))
                    .height(140)
                    .into()
            }
            None => {
                let field_name = name.clone();
                text_input(&field.descriptor.label, value)
                    .on_input(move |value| Message::FieldChanged(field_name.clone(), value))
                    .padding(8)
                    .into()
            }
        },
        FieldInput::Flag(flag) => button(if *flag { "Yes" } else { "No" })
            .padding([6, 14])
            .style(if *flag {
                iced::widget::button::success
            } else {
                iced::widget::button::secondary
            })
            .on_press(Message::FlagToggled(name.clone()))
            .into(),
        FieldInput::List(entries) => {
            let rows = entries.iter().fold(column!().spacing(6), |col, entry| {
                let field_name = name.clone();
                let key = entry.key;
                col.push(
                    row![
                        text_input("Item", &entry.value)
                            .on_input(move |value| {
                                Message::ItemChanged(field_name.clone(), key, value)
                            })
                            .padding(6)
                            .width(Length::Fill),
                        button("Remove")
                            .padding([6, 10])
                            .style(iced::widget::button::danger)
                            .on_press(Message::ItemRemoved(name.clone(), key)),
                    ]
                    .spacing(6)
                    .align_y(iced::Alignment::Center),
                )
            });
            column![
                rows,
                button("+ Add Item")
                    .padding([4, 10])
                    .style(iced::widget::button::secondary)
                    .on_press(Message::ItemAdded(name.clone())),
            ]
            .spacing(6)
            .into()
        }
    };

    column![text(field.descriptor.label.clone()).size(13), input]
        .spacing(4)
        .into()
}

fn view_editor<'a>(state: &'a ConsoleApp, editor: &'a RecordEditor) -> Element<'a, Message> {
    let saving = editor.is_saving();
    let (body, actions): (Element<'a, Message>, Element<'a, Message>) = match editor.mode() {
        EditorMode::View => {
            let rows = editor
                .detail_rows()
                .into_iter()
                .fold(column!().spacing(8), |col, row| {
                    let value = if row.preformatted {
                        text(row.value).size(13).color([0.80, 0.85, 0.95])
                    } else {
                        text(row.value).size(14)
                    };
                    col.push(column![text(row.label).size(12), value].spacing(2))
                });
            (
                rows.into(),
                row![
                    button("Edit")
                        .padding([8, 14])
                        .style(iced::widget::button::primary)
                        .on_press(Message::EditPressed),
                    button("Close")
                        .padding([8, 14])
                        .style(iced::widget::button::secondary)
                        .on_press(Message::CancelPressed),
                ]
                .spacing(8)
                .into(),
            )
        }
        EditorMode::Edit => {
            let fields = editor
                .form()
                .map(|form| form.fields())
                .unwrap_or_default()
                .iter()
                .fold(column!().spacing(10), |col, field| {
                    col.push(view_form_field(state, field))
                });
            (
                fields.into(),
                row![
                    button(editor.save_label())
                        .padding([8, 14])
                        .style(iced::widget::button::success)
                        .on_press_maybe((!saving).then_some(Message::SavePressed)),
                    button("Cancel")
                        .padding([8, 14])
                        .style(iced::widget::button::secondary)
                        .on_press_maybe((!saving).then_some(Message::CancelPressed)),
                ]
                .spacing(8)
                .into(),
            )
        }
    };

    container(
        column![
            text(editor.title()).size(20),
            scrollable(container(body).padding([0, 8])).height(Length::Fill),
            actions,
        ]
        .spacing(10),
    )
    .padding(12)
    .width(Length::Fill)
    .height(Length::Fill)
    .style(glass_panel)
    .into()
}

fn view_chat(state: &ConsoleApp) -> Element<'_, Message> {
    let session = &state.chat;
    let mut transcript = column!().spacing(10).width(Length::Fill);

    if let Some(placeholder) = session.placeholder() {
        transcript = transcript.push(text(placeholder).size(14));
    } else if session.messages().is_empty() {
        transcript = transcript.push(text("No messages yet. Start the conversation!").size(14));
    }

    for message in session.messages() {
        let from_fan = message.is_from_fan();
        let time = message.time_label().unwrap_or_default();
        let bubble = container(
            column![
                text(format!("{} {}", message.sender, time)).size(11),
                text(message.content.clone()).size(14),
            ]
            .spacing(4),
        )
        .padding(10)
        .max_width(520.0)
        .style(if from_fan { fan_bubble } else { creator_bubble });
        transcript = transcript.push(if from_fan {
            row![bubble, Space::new().width(Length::Fill)]
        } else {
            row![Space::new().width(Length::Fill), bubble]
        });
    }

    for inline in session.inline_errors() {
        transcript = transcript.push(
            column![
                text(format!("Error: {}", inline.text)).color([0.95, 0.45, 0.45]),
                text(inline.time.clone()).size(11),
            ]
            .spacing(2),
        );
    }

    if !session.pending().is_empty() {
        let options = session.pending().iter().enumerate().fold(
            column!().spacing(6),
            |col, (index, recommendation)| {
                col.push(
                    button(text(recommendation.content.clone()).size(14))
                        .width(Length::Fill)
                        .padding(10)
                        .style(iced::widget::button::secondary)
                        .on_press(Message::RecommendationPicked(index)),
                )
            },
        );
        transcript = transcript.push(
            container(
                column![
                    text("AI Recommendations").size(16),
                    text("Select a reply to send:").size(13),
                    options
                ]
                .spacing(6),
            )
            .padding(10)
            .style(glass_panel),
        );
    }

    if let Some(loading) = session.loading_text() {
        transcript = transcript.push(text(loading).size(13));
    }

    let can_send = session.can_send();
    let composer = row![
        text_input("Type a message as the fan...", session.input())
            .on_input(Message::ChatInputChanged)
            .on_submit(Message::ChatSendPressed)
            .padding(10)
            .width(Length::Fill),
        button(session.send_label())
            .padding([10, 16])
            .style(iced::widget::button::primary)
            .on_press_maybe(can_send.then_some(Message::ChatSendPressed)),
    ]
    .spacing(10)
    .align_y(iced::Alignment::Center);

    container(
        column![
            text("Chat").size(20),
            scrollable(container(transcript).padding([0, 10]).width(Length::Fill))
                .height(Length::Fill)
                .width(Length::Fill)
                .anchor_bottom()
                .auto_scroll(true),
            composer,
        ]
        .spacing(10),
    )
    .padding(12)
    .width(Length::Fill)
    .height(Length::Fill)
    .style(glass_panel)
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::entity::Record;
    use crate::error::ConsoleError;
    use crate::vault::MemoryTokenStore;
    use serde_json::{json, Map};

    fn console_app() -> ConsoleApp {
        let mut app = ConsoleApp::new(IcedUiLaunchConfig {
            config: ConsoleConfig::default(),
            tokens: Arc::new(MemoryTokenStore::with_token("key")),
        });
        app.enter_console(Collections {
            creators: vec![Record::from_value(json!({"id": "C1", "creator_name": "Ana"})).unwrap()],
            ..Default::default()
        });
        app
    }

    fn creator_ids(app: &ConsoleApp) -> Vec<String> {
        app.store
            .records(EntityType::Creator)
            .iter()
            .filter_map(Record::id)
            .map(|id| id.to_string())
            .collect()
    }

    fn create_request() -> SaveRequest {
        SaveRequest {
            entity_type: EntityType::Creator,
            is_new: true,
            id: None,
            payload: Map::new(),
        }
    }

    fn saved_bea() -> Result<SavedRecord> {
        Ok(SavedRecord {
            record: Record::from_value(json!({"id": "C2", "creator_name": "Bea"})).unwrap(),
            message: None,
        })
    }

    #[test]
    fn create_result_is_stored_after_opening_another_record() {
        let mut app = console_app();
        let _ = update(&mut app, Message::CreatePressed(EntityType::Creator));
        let _ = update(
            &mut app,
            Message::FieldChanged("creator_name".to_string(), "Bea".to_string()),
        );
        let _ = update(&mut app, Message::SavePressed);
        let _ = update(
            &mut app,
            Message::DetailsPressed(EntityType::Creator, RecordId::from("C1")),
        );

        let _ = update(&mut app, Message::Saved(create_request(), saved_bea()));

        assert_eq!(creator_ids(&app), vec!["C1", "C2"]);
        let editor = app.editor.as_ref().unwrap();
        assert_eq!(editor.title(), "Creator: Ana");
        assert_eq!(editor.mode(), EditorMode::View);
        assert_eq!(editor.state().id, Some(RecordId::from("C1")));
    }

    #[test]
    fn create_result_closes_the_editor_that_started_it() {
        let mut app = console_app();
        let _ = update(&mut app, Message::CreatePressed(EntityType::Creator));
        let _ = update(&mut app, Message::SavePressed);
        assert!(app.editor.as_ref().is_some_and(RecordEditor::is_saving));

        let _ = update(&mut app, Message::Saved(create_request(), saved_bea()));

        assert!(app.editor.is_none());
        assert_eq!(creator_ids(&app), vec!["C1", "C2"]);
        let banner = app.chat.banner().unwrap();
        assert_eq!(banner.kind, BannerKind::Notice);
        assert_eq!(banner.text, "Created successfully");
    }

    #[test]
    fn failed_save_leaves_an_unrelated_editor_alone() {
        let mut app = console_app();
        let _ = update(&mut app, Message::CreatePressed(EntityType::Creator));
        let _ = update(&mut app, Message::SavePressed);
        let _ = update(&mut app, Message::CreatePressed(EntityType::Creator));

        let _ = update(
            &mut app,
            Message::Saved(
                create_request(),
                Err(ConsoleError::Request("Creator name taken".to_string())),
            ),
        );

        let editor = app.editor.as_ref().unwrap();
        assert_eq!(editor.mode(), EditorMode::Edit);
        assert!(!editor.is_saving());
        assert_eq!(creator_ids(&app), vec!["C1"]);
        assert_eq!(app.chat.banner().unwrap().text, "Creator name taken");
    }
}
