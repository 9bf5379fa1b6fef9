use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use chatter_console::cards;
use chatter_console::chat::ChatSession;
use chatter_console::client::{ApiClient, LogRedirect};
use chatter_console::console::{self, ConsoleOptions};
use chatter_console::domains::chat::Recommendation;
use chatter_console::domains::entity::{EntityType, RecordId};
use chatter_console::editor::RecordEditor;
use chatter_console::error::{ConsoleError, Result};
use chatter_console::store::EntityStore;
use chatter_console::vault;

#[derive(Parser, Debug)]
#[command(name = "chatter-console")]
#[command(about = "Operator console for creators, fans and recommended chats")]
#[command(version = chatter_console::REVISION)]
struct Cli {
    /// Config file (defaults to config.json in the app data directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (e.g. http://127.0.0.1:5000).
    #[arg(long, global = true, env = "CHATTER_CONSOLE_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange operator credentials for an API key.
    Login {
        #[arg(short, long)]
        username: String,
        /// Prompted for on stdin when omitted.
        #[arg(short, long, env = "CHATTER_CONSOLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    Health,
    /// Print one collection as summary cards.
    List {
        entity_type: EntityType,
        #[arg(long)]
        html: bool,
    },
    /// Print every field of one record.
    Show { entity_type: EntityType, id: String },
    Create {
        entity_type: EntityType,
        #[command(flatten)]
        edits: FieldEdits,
    },
    Update {
        entity_type: EntityType,
        id: String,
        #[command(flatten)]
        edits: FieldEdits,
    },
    History {
        #[command(flatten)]
        pair: ChatArgs,
    },
    /// Send a message as the fan; suggestions follow when a prompt is given.
    Send {
        #[command(flatten)]
        pair: ChatArgs,
        text: String,
    },
    Recommend {
        #[command(flatten)]
        pair: ChatArgs,
    },
    /// Send a chosen reply on behalf of the creator.
    Pick {
        #[command(flatten)]
        pair: ChatArgs,
        #[arg(long)]
        content: String,
        /// Opaque reply id as JSON (e.g. 12 or "abc").
        #[arg(long)]
        reply_id: Option<String>,
    },
}

#[derive(Args, Debug)]
struct FieldEdits {
    /// field=value; lists take comma-separated items.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    set: Vec<String>,
    /// Append one item to a list field.
    #[arg(long = "add", value_name = "FIELD=ITEM")]
    add: Vec<String>,
    /// Remove an item from a list field.
    #[arg(long = "remove", value_name = "FIELD=ITEM")]
    remove: Vec<String>,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[arg(long)]
    creator: String,
    #[arg(long)]
    fan: String,
    #[arg(long)]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    chatter_console::logging::init_tracing("chatter_console_cli");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ConsoleError::AuthExpired) => {
            eprintln!("Session expired. Run `chatter-console login` to sign in again.");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {}", err.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = console::load_config(&ConsoleOptions {
        config_path: cli.config,
        base_url: cli.url,
    })?;
    let client = console::connect(&config, vault::default_token_store(), Arc::new(LogRedirect))?;

    match cli.command {
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_line("Password: ").await?,
            };
            client.login(username.trim(), &password).await?;
            println!("Logged in to {}", client.base_url());
        }
        Command::Logout => {
            console::logout(client).await;
            println!("Logged out");
        }
        Command::Health => {
            println!("{}", client.health().await?);
        }
        Command::List { entity_type, html } => {
            let store = loaded_store(&client).await?;
            if html {
                println!("{}", cards::render_html(&store, entity_type));
            } else {
                print_cards(&store, entity_type);
            }
        }
        Command::Show { entity_type, id } => {
            let record = client.details(entity_type, &RecordId::from(id)).await?;
            let editor = RecordEditor::view(entity_type, record);
            println!("{}", editor.title());
            for row in editor.detail_rows() {
                if row.preformatted {
                    println!("{}:\n{}", row.label, row.value);
                } else {
                    println!("{}: {}", row.label, row.value);
                }
            }
        }
        Command::Create { entity_type, edits } => {
            let mut store = loaded_store(&client).await?;
            let mut editor = RecordEditor::create(entity_type, &store);
            apply_edits(&mut editor, &edits)?;
            let outcome = editor.save(&client, &mut store).await?;
            println!("{}", outcome.message());
        }
        Command::Update {
            entity_type,
            id,
            edits,
        } => {
            let mut store = loaded_store(&client).await?;
            let id = RecordId::from(id);
            let record = store.find(entity_type, &id).cloned().ok_or_else(|| {
                ConsoleError::UserInputInvalid(format!("{} {id} not found", entity_type.label()))
            })?;
            let mut editor = RecordEditor::view(entity_type, record);
            editor.enter_edit();
            apply_edits(&mut editor, &edits)?;
            let outcome = editor.save(&client, &mut store).await?;
            println!("{}", outcome.message());
        }
        Command::History { pair } => {
            let (_, session) = open_chat(&client, &pair).await?;
            print_transcript(&session);
        }
        Command::Send { pair, text } => {
            let (_, mut session) = open_chat(&client, &pair).await?;
            let result = session.send(&client, &text).await;
            print_transcript(&session);
            result?;
        }
        Command::Recommend { pair } => {
            let (_, mut session) = open_chat(&client, &pair).await?;
            let result = session.request_recommendations(&client).await;
            print_transcript(&session);
            result?;
        }
        Command::Pick {
            pair,
            content,
            reply_id,
        } => {
            let (_, mut session) = open_chat(&client, &pair).await?;
            let reply_id = reply_id
                .map(|raw| serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw)));
            session.set_pending(vec![Recommendation {
                content,
                confidence: None,
                chat_type: None,
                reply_id,
                extra: Default::default(),
            }]);
            session.select_recommendation(&client, 0).await?;
            print_transcript(&session);
        }
    }
    Ok(())
}

async fn prompt_line(label: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(label.as_bytes())
        .await
        .map_err(|e| ConsoleError::Runtime(e.to_string()))?;
    stdout
        .flush()
        .await
        .map_err(|e| ConsoleError::Runtime(e.to_string()))?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| ConsoleError::Runtime(e.to_string()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn loaded_store(client: &ApiClient) -> Result<EntityStore> {
    let mut store = EntityStore::new();
    store.load_all(client).await?;
    Ok(store)
}

fn split_assignment(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| ConsoleError::UserInputInvalid(format!("expected FIELD=VALUE, got {raw}")))
}

fn apply_edits(editor: &mut RecordEditor, edits: &FieldEdits) -> Result<()> {
    let form = editor
        .form_mut()
        .ok_or_else(|| ConsoleError::Runtime("editor has no open form".to_string()))?;
    for raw in &edits.set {
        let (name, value) = split_assignment(raw)?;
        form.assign(name, value)?;
    }
    for raw in &edits.add {
        let (name, value) = split_assignment(raw)?;
        form.push_item(name, value)?;
    }
    for raw in &edits.remove {
        let (name, value) = split_assignment(raw)?;
        form.remove_value(name, value)?;
    }
    Ok(())
}

fn select_or_fail(store: &mut EntityStore, entity_type: EntityType, raw: &str) -> Result<()> {
    let id = RecordId::from(raw);
    if store.select(entity_type, &id).is_none() {
        return Err(ConsoleError::UserInputInvalid(format!(
            "{} {id} not found",
            entity_type.label()
        )));
    }
    Ok(())
}

async fn open_chat(client: &ApiClient, pair: &ChatArgs) -> Result<(EntityStore, ChatSession)> {
    let mut store = loaded_store(client).await?;
    select_or_fail(&mut store, EntityType::Creator, &pair.creator)?;
    select_or_fail(&mut store, EntityType::Fan, &pair.fan)?;
    if let Some(prompt) = &pair.prompt {
        select_or_fail(&mut store, EntityType::SystemPrompt, prompt)?;
    }
    let mut session = ChatSession::new();
    session.open(client, &store).await?;
    Ok((store, session))
}

fn print_cards(store: &EntityStore, entity_type: EntityType) {
    let cards = cards::cards(store, entity_type);
    if cards.is_empty() {
        println!("{}", cards::empty_state(entity_type));
        return;
    }
    for card in cards {
        let id = card.id.map(|id| id.to_string()).unwrap_or_default();
        println!("[{id}] {}", card.title);
        for badge in &card.badges {
            println!("    {}", badge.text);
        }
        if let Some(preview) = &card.preview {
            println!("    {preview}");
        }
    }
}

fn print_transcript(session: &ChatSession) {
    if session.messages().is_empty() {
        println!("(no messages yet)");
    }
    for message in session.messages() {
        let time = message.time_label().unwrap_or_default();
        println!("{time:>8} {:<8} {}", message.sender, message.content);
    }
    for inline in session.inline_errors() {
        println!("{:>8} error    {}", inline.time, inline.text);
    }
    if !session.pending().is_empty() {
        println!("\nSuggested replies:");
        for (index, recommendation) in session.pending().iter().enumerate() {
            println!(
                "  {}. {} (confidence {}, {})",
                index + 1,
                recommendation.content,
                recommendation.confidence_label(),
                recommendation.chat_type_label()
            );
        }
    }
}
