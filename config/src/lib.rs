//! Load configuration from the XDG `config.toml` and the project `.env`, then apply it to the
//! process environment with priority: **existing env > .env > XDG**.
//!
//! Components read the environment once, at construction, after this has run.

mod env_file;
#[cfg(feature = "tracing-init")]
pub mod logging;
mod xdg_toml;

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    Dotenv(#[from] dotenv::Error),
}

/// Sets environment variables from project `.env` and `$XDG_CONFIG_HOME/<app_name>/config.toml`
/// `[env]`, only for keys that are not already set.
///
/// * `app_name`: XDG directory name, e.g. `"acp"`.
/// * `override_dir`: look for `.env` here instead of the current directory.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = env_file::load_env_map(override_dir)?;

    let mut keys: std::collections::HashSet<&String> = xdg_map.keys().collect();
    keys.extend(dotenv_map.keys());

    for key in keys {
        if std::env::var_os(key).is_some() {
            continue;
        }
        if let Some(v) = dotenv_map.get(key).or_else(|| xdg_map.get(key)) {
            std::env::set_var(key, v);
        }
    }
    Ok(())
}
