//! Startup and session wiring shared by the CLI and the desktop console.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::client::{ApiClient, LoginRedirect};
use crate::config::ConsoleConfig;
use crate::domains::entity::validate_endpoint_table;
use crate::error::{ConsoleError, Result};
use crate::store::{fetch_all, Collections};
use crate::vault::TokenStore;

#[derive(Clone, Debug, Default)]
pub struct ConsoleOptions {
    /// Config file; the app root's `config.json` when unset.
    pub config_path: Option<PathBuf>,
    /// Overrides both the file and the environment.
    pub base_url: Option<String>,
}

/// Defaults, then the config file, then the environment, then `options`.
pub fn load_config(options: &ConsoleOptions) -> Result<ConsoleConfig> {
    let path = options
        .config_path
        .clone()
        .unwrap_or_else(crate::runtime_paths::default_config_path);
    ConsoleConfig::load_or_init(&path)?
        .apply_env()
        .with_base_url(options.base_url.clone())
        .normalized()
}

/// Checks the endpoint table and builds the backend client.
pub fn connect(
    config: &ConsoleConfig,
    tokens: Arc<dyn TokenStore>,
    redirect: Arc<dyn LoginRedirect>,
) -> Result<ApiClient> {
    validate_endpoint_table()?;
    let client = ApiClient::new(config, tokens, redirect)?;
    info!(base_url = client.base_url(), "backend client ready");
    Ok(client)
}

#[derive(Clone, Debug)]
pub enum Startup {
    /// No usable credential; show the login screen before loading anything.
    NeedsLogin,
    Loaded(Collections),
}

/// Gates on the stored credential, then loads all three collections.
pub async fn start(client: ApiClient) -> Result<Startup> {
    if !client.has_token() {
        info!("no stored credential, login required");
        return Ok(Startup::NeedsLogin);
    }
    match fetch_all(&client).await {
        Ok(collections) => Ok(Startup::Loaded(collections)),
        Err(ConsoleError::AuthExpired) => Ok(Startup::NeedsLogin),
        Err(err) => Err(err),
    }
}

pub async fn load(client: ApiClient) -> Result<Collections> {
    fetch_all(&client).await
}

pub async fn login(client: ApiClient, username: String, password: String) -> Result<Collections> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ConsoleError::UserInputInvalid(
            "Please enter both username and password".to_string(),
        ));
    }
    client.login(username, &password).await?;
    fetch_all(&client).await
}

pub async fn logout(client: ApiClient) {
    client.logout().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RedirectLatch;
    use crate::vault::MemoryTokenStore;

    #[test]
    fn config_file_is_created_and_flag_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = load_config(&ConsoleOptions {
            config_path: Some(path.clone()),
            base_url: Some("backend.local:8080/".to_string()),
        })
        .unwrap();
        assert!(path.exists());
        assert_eq!(config.base_url, "http://backend.local:8080");
        assert_eq!(config.login_path, "/login");
    }

    #[tokio::test]
    async fn missing_token_skips_loading() {
        let client = connect(
            &ConsoleConfig::default(),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(RedirectLatch::new()),
        )
        .unwrap();
        assert!(matches!(start(client).await.unwrap(), Startup::NeedsLogin));
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let client = connect(
            &ConsoleConfig::default(),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(RedirectLatch::new()),
        )
        .unwrap();
        let err = login(client, "  ".to_string(), "secret".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::UserInputInvalid(_)));
    }
}
