pub mod cards;
pub mod chat;
pub mod chat_fsm;
pub mod client;
pub mod config;
pub mod console;
pub mod domains;
pub mod editor;
pub mod error;
pub mod iced_ui;
pub mod logging;
pub mod runtime_paths;
pub mod store;
pub mod vault;

pub use error::ConsoleError;

pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Build revision baked in by `build.rs`.
pub const REVISION: &str = env!("CHATTER_CONSOLE_REVISION");
