use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

const APP_DIR: &str = "chatter-console";

fn app_root_override_lock() -> &'static RwLock<Option<PathBuf>> {
    static OVERRIDE: OnceLock<RwLock<Option<PathBuf>>> = OnceLock::new();
    OVERRIDE.get_or_init(|| RwLock::new(None))
}

fn app_root_override() -> Option<PathBuf> {
    let lock = app_root_override_lock();
    match lock.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Redirects every runtime path (config, token fallback) under `path`.
pub fn set_app_root_override(path: Option<PathBuf>) {
    let lock = app_root_override_lock();
    match lock.write() {
        Ok(mut guard) => *guard = path,
        Err(poisoned) => {
            let mut guard = poisoned.into_inner();
            *guard = path;
        }
    }
}

fn platform_app_root() -> PathBuf {
    if let Some(project_dirs) = ProjectDirs::from("", "", APP_DIR) {
        return project_dirs.data_dir().to_path_buf();
    }

    if let Some(base_dirs) = BaseDirs::new() {
        return base_dirs.data_local_dir().join(APP_DIR);
    }

    std::env::temp_dir().join(APP_DIR)
}

pub fn app_root() -> PathBuf {
    app_root_override().unwrap_or_else(platform_app_root)
}

pub fn default_config_path() -> PathBuf {
    app_root().join("config.json")
}

pub fn secrets_dir() -> PathBuf {
    app_root().join("secrets")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_moves_config_and_secrets() {
        let dir = tempfile::tempdir().unwrap();
        set_app_root_override(Some(dir.path().to_path_buf()));
        assert_eq!(default_config_path(), dir.path().join("config.json"));
        assert_eq!(secrets_dir(), dir.path().join("secrets"));
        set_app_root_override(None);
    }
}
