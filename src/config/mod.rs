//! Configuration system (layered: defaults < config file < environment).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, Result};
use crate::provider::ollama::DEFAULT_BASE_URL;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;
pub const DEFAULT_SEARCH_URL: &str = "https://api.duckduckgo.com/";

/// How tool results are fed back to the model on continuation.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolResultProtocol {
    /// One `tool`-role message per result.
    #[default]
    ToolRole,
    /// A single user message listing every result.
    UserMessage,
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParleyConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    /// Bound on connecting and receiving response headers.
    pub request_timeout: Duration,
    pub flush_interval: Duration,
    pub max_tool_rounds: u32,
    /// Default for newly created conversations.
    pub tools_enabled: bool,
    pub web_tools_enabled: bool,
    /// IANA identifier used as the "system" timezone by date/time tools.
    pub default_timezone: String,
    pub system_prompt: Option<String>,
    pub tool_result_protocol: ToolResultProtocol,
    pub search_base_url: String,
    /// Where `FileStorage` keeps conversations. `None` means the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: None,
            request_timeout: Duration::from_secs(30),
            flush_interval: crate::buffer::DEFAULT_FLUSH_INTERVAL,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            tools_enabled: true,
            web_tools_enabled: cfg!(feature = "web-tools"),
            default_timezone: "UTC".to_string(),
            system_prompt: None,
            tool_result_protocol: ToolResultProtocol::default(),
            search_base_url: DEFAULT_SEARCH_URL.to_string(),
            data_dir: None,
        }
    }
}

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    bearer_token: Option<String>,
    request_timeout_secs: Option<u64>,
    flush_interval_ms: Option<u64>,
    max_tool_rounds: Option<u32>,
    tools_enabled: Option<bool>,
    web_tools_enabled: Option<bool>,
    default_timezone: Option<String>,
    system_prompt: Option<String>,
    tool_result_protocol: Option<ToolResultProtocol>,
    search_base_url: Option<String>,
    data_dir: Option<PathBuf>,
}

impl ParleyConfig {
    /// Defaults, then the platform config file if present, then `.env` and
    /// the process environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                config.merge_file(&path)?;
            }
        }
        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Like [`load`](Self::load) but with an explicit config file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge_file(path)?;
        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `<platform config dir>/parley/config.toml`.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "parley")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Directory for persisted conversations.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("", "", "parley")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".parley"))
        })
    }

    /// The configured default timezone, or UTC when it does not parse.
    pub fn timezone(&self) -> Tz {
        Tz::from_str(&self.default_timezone).unwrap_or(Tz::UTC)
    }

    fn merge_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let file: FileConfig = toml::from_str(&raw).map_err(|e| {
            ParleyError::Configuration(format!("{}: {}", path.display(), e.message()))
        })?;

        if let Some(v) = file.base_url {
            self.base_url = v;
        }
        if file.bearer_token.is_some() {
            self.bearer_token = file.bearer_token;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.flush_interval_ms {
            self.flush_interval = Duration::from_millis(v);
        }
        if let Some(v) = file.max_tool_rounds {
            self.max_tool_rounds = v;
        }
        if let Some(v) = file.tools_enabled {
            self.tools_enabled = v;
        }
        if let Some(v) = file.web_tools_enabled {
            self.web_tools_enabled = v;
        }
        if let Some(v) = file.default_timezone {
            self.default_timezone = v;
        }
        if file.system_prompt.is_some() {
            self.system_prompt = file.system_prompt;
        }
        if let Some(v) = file.tool_result_protocol {
            self.tool_result_protocol = v;
        }
        if let Some(v) = file.search_base_url {
            self.search_base_url = v;
        }
        if file.data_dir.is_some() {
            self.data_dir = file.data_dir;
        }
        self.validate()
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("OLLAMA_BEARER_TOKEN") {
            self.bearer_token = Some(v);
        }
        if let Some(v) = get("PARLEY_FLUSH_INTERVAL_MS") {
            self.flush_interval = Duration::from_millis(parse_env("PARLEY_FLUSH_INTERVAL_MS", &v)?);
        }
        if let Some(v) = get("PARLEY_MAX_TOOL_ROUNDS") {
            self.max_tool_rounds = parse_env("PARLEY_MAX_TOOL_ROUNDS", &v)?;
        }
        if let Some(v) = get("PARLEY_TOOLS_ENABLED") {
            self.tools_enabled = parse_bool("PARLEY_TOOLS_ENABLED", &v)?;
        }
        if let Some(v) = get("PARLEY_WEB_TOOLS") {
            self.web_tools_enabled = parse_bool("PARLEY_WEB_TOOLS", &v)?;
        }
        if let Some(v) = get("PARLEY_SYSTEM_PROMPT") {
            self.system_prompt = Some(v);
        }
        if let Some(v) = get("PARLEY_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("TZ") {
            self.default_timezone = v;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.flush_interval.is_zero() {
            return Err(ParleyError::Configuration(
                "flush interval must be greater than zero".into(),
            ));
        }
        if Tz::from_str(&self.default_timezone).is_err() {
            return Err(ParleyError::Configuration(format!(
                "unknown timezone '{}'",
                self.default_timezone
            )));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ParleyError::Configuration(format!("{key}: invalid value '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ParleyError::Configuration(format!(
            "{key}: expected a boolean, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_sane() {
        let config = ParleyConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.flush_interval, Duration::from_millis(100));
        assert_eq!(config.max_tool_rounds, 8);
        assert_eq!(config.timezone(), Tz::UTC);
        assert_eq!(config.tool_result_protocol, ToolResultProtocol::ToolRole);
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = ParleyConfig::default();
        config
            .apply_env(env(&[
                ("OLLAMA_BASE_URL", "gpu-box:11434"),
                ("OLLAMA_BEARER_TOKEN", "okki"),
                ("PARLEY_FLUSH_INTERVAL_MS", "40"),
                ("PARLEY_MAX_TOOL_ROUNDS", "2"),
                ("PARLEY_TOOLS_ENABLED", "off"),
                ("TZ", "Europe/Paris"),
            ]))
            .unwrap();
        assert_eq!(config.base_url, "gpu-box:11434");
        assert_eq!(config.bearer_token.as_deref(), Some("okki"));
        assert_eq!(config.flush_interval, Duration::from_millis(40));
        assert_eq!(config.max_tool_rounds, 2);
        assert!(!config.tools_enabled);
        assert_eq!(config.timezone(), chrono_tz::Europe::Paris);
    }

    #[test]
    fn invalid_env_values_are_configuration_errors() {
        let mut config = ParleyConfig::default();
        let err = config
            .apply_env(env(&[("PARLEY_MAX_TOOL_ROUNDS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(ref m) if m.contains("PARLEY_MAX_TOOL_ROUNDS")));

        let mut config = ParleyConfig::default();
        assert!(config.apply_env(env(&[("TZ", "Mars/Olympus")])).is_err());

        let mut config = ParleyConfig::default();
        assert!(config.apply_env(env(&[("PARLEY_FLUSH_INTERVAL_MS", "0")])).is_err());
    }

    #[test]
    fn file_layer_is_merged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
base_url = "http://10.0.0.5:11434"
flush_interval_ms = 250
tool_result_protocol = "user_message"
system_prompt = "Be brief."
"#,
        )
        .unwrap();

        let mut config = ParleyConfig::default();
        config.merge_file(&path).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:11434");
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.tool_result_protocol, ToolResultProtocol::UserMessage);
        assert_eq!(config.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(config.max_tool_rounds, 8);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_ur = \"typo\"\n").unwrap();
        let err = ParleyConfig::default().merge_file(&path).unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(_)));
    }
}
