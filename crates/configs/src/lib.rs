//! # configs
//!
//! Typed application configuration. Values come from an optional TOML file
//! overlaid with `BOARDSMITH__SECTION__KEY` environment variables (a `.env`
//! file is read first when present).

mod board;
pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use domains::SiteSettings;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub use board::{BoardConfig, BoardOverride};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: SecretString::from("sqlite://boardsmith.db"),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub document_root: PathBuf,
    pub web_root: String,
    pub site_name: String,
    pub site_host: String,
    pub check_referer: bool,
    pub max_recent_posts: usize,
    /// Octal permission bits for generated files, e.g. "0644".
    pub file_mode: String,
    pub owner_uid: Option<u32>,
    pub owner_gid: Option<u32>,
    pub tripcode_secret: SecretString,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let defaults = SiteSettings::default();
        Self {
            document_root: defaults.document_root,
            web_root: defaults.web_root,
            site_name: defaults.site_name,
            site_host: defaults.site_host,
            check_referer: defaults.check_referer,
            max_recent_posts: defaults.max_recent_posts,
            file_mode: format!("{:04o}", defaults.file_mode),
            owner_uid: None,
            owner_gid: None,
            tripcode_secret: SecretString::from(""),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. "info,sqlx=warn".
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpamConfig {
    /// DNS block list zones queried for each poster; empty disables the check.
    pub dnsbl_zones: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub site: SiteConfig,
    pub logging: LoggingConfig,
    pub spam: SpamConfig,
    pub board_defaults: BoardConfig,
    /// Keyed by board dir.
    pub boards: HashMap<String, BoardOverride>,
}

impl AppConfig {
    /// Loads `path` (or `boardsmith.toml` in the working directory, if present)
    /// and the environment, then validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "loaded .env");
        }

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("boardsmith").required(false),
        };
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("BOARDSMITH")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("board_defaults.allowed_extensions")
                    .with_list_parse_key("spam.dnsbl_zones"),
            )
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Parses TOML text without consulting the environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        let app: AppConfig = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    pub fn database_url(&self) -> &str {
        self.database.url.expose_secret()
    }

    pub fn validate(&self) -> Result<()> {
        if self.site.document_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("site.document_root must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be at least 1".into()));
        }
        parse_file_mode(&self.site.file_mode)?;

        check_board("board_defaults", &self.board_defaults)?;
        for (dir, over) in &self.boards {
            check_board(&format!("boards.{dir}"), &self.board_defaults.merged(over))?;
        }
        Ok(())
    }

    /// Effective rules for one board.
    pub fn board_config(&self, dir: &str) -> BoardConfig {
        match self.boards.get(dir) {
            Some(over) => self.board_defaults.merged(over),
            None => self.board_defaults.clone(),
        }
    }

    /// The settings handed to the services.
    pub fn site_settings(&self) -> Result<SiteSettings> {
        Ok(SiteSettings {
            document_root: self.site.document_root.clone(),
            web_root: normalize_web_root(&self.site.web_root),
            site_name: self.site.site_name.clone(),
            site_host: self.site.site_host.clone(),
            check_referer: self.site.check_referer,
            max_recent_posts: self.site.max_recent_posts,
            file_mode: parse_file_mode(&self.site.file_mode)?,
            owner_uid: self.site.owner_uid,
            owner_gid: self.site.owner_gid,
            tripcode_secret: self.site.tripcode_secret.expose_secret().to_string(),
            default_policy: self.board_defaults.to_policy(),
            board_policies: self
                .boards
                .keys()
                .map(|dir| (dir.clone(), self.board_config(dir).to_policy()))
                .collect(),
        })
    }
}

fn check_board(section: &str, board: &BoardConfig) -> Result<()> {
    let sizes = [
        ("threads_per_page", board.threads_per_page),
        ("catalog_threads_per_page", board.catalog_threads_per_page),
        ("max_message_length", board.max_message_length),
    ];
    for (field, value) in sizes {
        if value == 0 {
            return Err(ConfigError::Invalid(format!("{section}.{field} must be greater than zero")));
        }
    }
    if board.allowed_extensions.is_empty() {
        return Err(ConfigError::Invalid(format!("{section}.allowed_extensions must not be empty")));
    }
    Ok(())
}

fn parse_file_mode(mode: &str) -> Result<u32> {
    let digits = mode.trim().trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|bits| *bits <= 0o7777)
        .ok_or_else(|| ConfigError::Invalid(format!("site.file_mode '{mode}' is not an octal permission")))
}

/// Web root with exactly one leading and one trailing slash.
fn normalize_web_root(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".into()
    } else {
        format!("/{trimmed}/")
    }
}
