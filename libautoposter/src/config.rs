//! Configuration management for autoPoster
//!
//! The whole process is driven by one JSON document read at startup. Every
//! section is optional so a config holding only, say, Mastodon accounts is
//! valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::automation::NoteSelectors;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub wordpress: WordpressConfig,
    pub mastodon: MastodonConfig,
    pub twitter: TwitterConfig,
    pub note: NoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub show_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            show_browser: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Client-side timeout applied to every REST call
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Paid-content plan identifier; WordPress.com hands these out as numbers
/// but older configs store them as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanId {
    Number(u64),
    Text(String),
}

impl PlanId {
    /// JSON value used inside the block marker comment
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PlanId::Number(n) => serde_json::Value::from(*n),
            PlanId::Text(s) => match s.parse::<u64>() {
                Ok(n) => serde_json::Value::from(n),
                Err(_) => serde_json::Value::from(s.as_str()),
            },
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanId::Number(n) => write!(f, "{}", n),
            PlanId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WordpressConfig {
    /// Plan used for paid blocks when neither the request nor the account names one
    pub default_plan_id: Option<PlanId>,
    /// Override for the REST API base, `{site}` is substituted
    pub api_base: Option<String>,
    /// Override for the OAuth2 token endpoint
    pub token_url: Option<String>,
    pub accounts: BTreeMap<String, WordpressAccount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WordpressAccount {
    pub site: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub plan_id: Option<PlanId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MastodonConfig {
    pub accounts: BTreeMap<String, MastodonAccount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MastodonAccount {
    pub instance_url: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    /// Override for the v1.1/v2 API host (tests point this at a local server)
    pub api_base: Option<String>,
    /// Override for the media upload host
    pub upload_base: Option<String>,
    pub accounts: BTreeMap<String, TwitterAccount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterAccount {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteConfig {
    pub selectors: NoteSelectors,
    /// Timeout for ordinary element waits
    pub wait_timeout_secs: u64,
    /// Timeout for the post-login redirect
    pub login_timeout_secs: u64,
    /// Override for the REST host used for drafts (tests point this at a local server)
    pub api_base: Option<String>,
    pub api_timeout_secs: u64,
    pub accounts: BTreeMap<String, NoteAccount>,
}

impl Default for NoteConfig {
    fn default() -> Self {
        Self {
            selectors: NoteSelectors::default(),
            wait_timeout_secs: 20,
            login_timeout_secs: 40,
            api_base: None,
            api_timeout_secs: 30,
            accounts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteAccount {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_json(&content)
    }

    /// Load from an explicit path, or from the resolved default location
    ///
    /// A missing file at the default location yields an empty configuration;
    /// an explicit path that cannot be read is an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let path = resolve_config_path()?;
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, starting without accounts"
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// Resolve the configuration file path
///
/// `AUTOPOSTER_CONFIG` wins when set; otherwise the file lives under the
/// platform config directory.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("AUTOPOSTER_CONFIG") {
        return Ok(PathBuf::from(expand_tilde(&path)));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("autoposter").join("config.json"))
}
