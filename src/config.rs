//! Configuration file support.
//!
//! Looks for `noqli.toml` in the working directory, then
//! `~/.noqli/config.toml`. Command-line flags and environment variables
//! are layered on top by the binary.
//!
//! ```toml
//! [database]
//! host = "127.0.0.1:3306"
//! user = "root"
//! password = "secret"
//! name = "shop"
//!
//! [shell]
//! history_file = "/tmp/noqli_history"
//! max_history = 500
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;

use crate::error::{NoqliError, NoqliResult};

pub const FILE_NAME: &str = "noqli.toml";
const DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub shell: ShellConfig,
}

/// Connection settings. `url` wins over the individual parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub history_file: Option<PathBuf>,
    pub max_history: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_file: None,
            max_history: 1000,
        }
    }
}

impl Config {
    /// Load the first config file found, or defaults if there is none.
    pub fn load() -> NoqliResult<Self> {
        match Self::locate() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        dirs::home_dir()
            .map(|home| home.join(".noqli").join("config.toml"))
            .filter(|path| path.exists())
    }

    pub fn from_path(path: &Path) -> NoqliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| NoqliError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> NoqliResult<Self> {
        toml::from_str(content).map_err(|e| NoqliError::Config(e.to_string()))
    }
}

impl DatabaseConfig {
    /// Overlay every setting present in `other`.
    pub fn merge(&mut self, other: DatabaseConfig) {
        if other.url.is_some() {
            self.url = other.url;
        }
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.name.is_some() {
            self.name = other.name;
        }
    }

    /// Connection options, parsed from `url` or built from the parts.
    ///
    /// Building from parts keeps passwords containing `@`, `/` or `:`
    /// intact, since they never pass through a URL.
    pub fn connect_options(&self) -> NoqliResult<MySqlConnectOptions> {
        if let Some(url) = &self.url {
            return url
                .parse::<MySqlConnectOptions>()
                .map_err(|e| NoqliError::Config(format!("invalid database url: {}", e)));
        }

        let host = self
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| NoqliError::Config("no database host configured (DB_HOST)".to_string()))?;
        let (host, port) = split_host(host)?;

        let mut options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(self.user.as_deref().unwrap_or("root"));

        if let Some(pw) = self.password.as_deref().filter(|p| !p.is_empty()) {
            options = options.password(pw);
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            options = options.database(name);
        }
        Ok(options)
    }
}

/// `host[:port]`, defaulting to the MySQL port.
fn split_host(host: &str) -> NoqliResult<(&str, u16)> {
    match host.rsplit_once(':') {
        Some((name, port)) => {
            let port = port
                .parse()
                .map_err(|_| NoqliError::Config(format!("invalid port in DB_HOST: '{}'", host)))?;
            Ok((name, port))
        }
        None => Ok((host, DEFAULT_PORT)),
    }
}

impl ShellConfig {
    /// History file, defaulting to `~/.noqli_history`.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".noqli_history")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(
            r#"
            [database]
            host = "db:3306"
            user = "app"
            password = "pw"
            name = "shop"

            [shell]
            max_history = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.database.host.as_deref(), Some("db:3306"));
        assert_eq!(config.shell.max_history, 50);

        let options = config.database.connect_options().unwrap();
        assert_eq!(options.get_host(), "db");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("shop"));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
        assert_eq!(ShellConfig::default().max_history, 1000);
    }

    #[test]
    fn test_url_wins() {
        let db = DatabaseConfig {
            url: Some("mysql://x@y/z".into()),
            host: Some("ignored".into()),
            ..Default::default()
        };
        let options = db.connect_options().unwrap();
        assert_eq!(options.get_host(), "y");
        assert_eq!(options.get_username(), "x");
        assert_eq!(options.get_database(), Some("z"));
    }

    #[test]
    fn test_missing_host() {
        assert!(matches!(
            DatabaseConfig::default().connect_options(),
            Err(NoqliError::Config(_))
        ));
    }

    #[test]
    fn test_merge_overrides() {
        let mut db = DatabaseConfig {
            host: Some("a".into()),
            name: Some("one".into()),
            ..Default::default()
        };
        db.merge(DatabaseConfig {
            name: Some("two".into()),
            ..Default::default()
        });
        assert_eq!(db.host.as_deref(), Some("a"));
        assert_eq!(db.name.as_deref(), Some("two"));
        let options = db.connect_options().unwrap();
        assert_eq!(options.get_host(), "a");
        assert_eq!(options.get_username(), "root");
        assert_eq!(options.get_database(), Some("two"));
    }

    #[test]
    fn test_password_with_url_characters() {
        let db = DatabaseConfig {
            host: Some("db.internal:3307".into()),
            user: Some("app".into()),
            password: Some("p@ss/w:rd".into()),
            name: Some("shop".into()),
            ..Default::default()
        };
        let options = db.connect_options().unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("shop"));
    }

    #[test]
    fn test_bad_port() {
        let db = DatabaseConfig {
            host: Some("db:abc".into()),
            ..Default::default()
        };
        assert!(matches!(db.connect_options(), Err(NoqliError::Config(_))));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml("[database\nhost = 1"),
            Err(NoqliError::Config(_))
        ));
    }
}
