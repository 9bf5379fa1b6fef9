use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatter-console-ui")]
#[command(version = chatter_console::REVISION)]
struct UiCli {
    /// Config file (defaults to config.json in the app data directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL (e.g. http://127.0.0.1:5000).
    #[arg(long, env = "CHATTER_CONSOLE_URL")]
    url: Option<String>,
}

fn main() -> chatter_console::Result<()> {
    chatter_console::logging::init_tracing("chatter_console_ui");
    let cli = UiCli::parse();

    let config = chatter_console::console::load_config(&chatter_console::console::ConsoleOptions {
        config_path: cli.config,
        base_url: cli.url,
    })?;

    chatter_console::iced_ui::launch_ui(chatter_console::iced_ui::IcedUiLaunchConfig {
        config,
        tokens: chatter_console::vault::default_token_store(),
    })
    .map_err(|err| chatter_console::ConsoleError::Runtime(err.to_string()))
}
