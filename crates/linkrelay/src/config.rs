use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use tracing::warn;
use url::Url;

use crate::engine::Topology;
use crate::gate::{AccessGate, Principal};

const TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
const MY_CHAT_ID: &str = "MY_CHAT_ID";
const TOPIC_ID: &str = "TOPIC_ID";
const LINKDING_URL: &str = "LINKDING_URL";
const LINKDING_API_TOKEN: &str = "LINKDING_API_TOKEN";
const READECK_API_URL: &str = "READECK_API_URL";
const READECK_API_TOKEN: &str = "READECK_API_TOKEN";
const MODE: &str = "LINKRELAY_MODE";
const HTTP_TIMEOUT: &str = "LINKRELAY_HTTP_TIMEOUT_SECONDS";

// ============================================================================
// Config (resolved)
// ============================================================================

/// Fully resolved configuration. Every required value is present.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub access: AccessConfig,
    pub mode: Topology,
    pub linkding: ServiceConfig,
    /// Present exactly when `mode` is [`Topology::Dual`].
    pub readeck: Option<ServiceConfig>,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub chat_id: i64,
    /// Forum topic restriction; `None` when unset or 0.
    pub thread_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub api_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load `.env`, the YAML file at `path` (optional) and the process
    /// environment, in increasing order of precedence.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_dotenv();
        let file = FileConfig::read(path).await?;
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Merge `file` with values from `env` and validate the result.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let bot_token = lookup(TELEGRAM_TOKEN)
            .or(file.telegram.bot_token)
            .ok_or(ConfigError::Missing(TELEGRAM_TOKEN))?;

        let chat_id = match lookup(MY_CHAT_ID) {
            Some(raw) => parse_number(MY_CHAT_ID, &raw)?,
            None => file.access.chat_id.ok_or(ConfigError::Missing(MY_CHAT_ID))?,
        };
        let thread_id = match lookup(TOPIC_ID) {
            Some(raw) => parse_number(TOPIC_ID, &raw)?,
            None => file.access.thread_id.unwrap_or(0),
        };

        let linkding = resolve_service(
            file.linkding,
            lookup(LINKDING_URL),
            lookup(LINKDING_API_TOKEN),
            (LINKDING_URL, LINKDING_API_TOKEN),
        )?
        .ok_or(ConfigError::Missing(LINKDING_URL))?;

        let readeck = resolve_service(
            file.readeck,
            lookup(READECK_API_URL),
            lookup(READECK_API_TOKEN),
            (READECK_API_URL, READECK_API_TOKEN),
        )?;

        let explicit_mode = match lookup(MODE) {
            Some(raw) => Some(parse_mode(&raw)?),
            None => file.mode,
        };
        let (mode, readeck) = match (explicit_mode, readeck) {
            (Some(Topology::Dual), None) => return Err(ConfigError::Missing(READECK_API_URL)),
            (Some(Topology::Single), _) => (Topology::Single, None),
            (_, Some(readeck)) => (Topology::Dual, Some(readeck)),
            (_, None) => (Topology::Single, None),
        };

        let mut http = file.http;
        if let Some(raw) = lookup(HTTP_TIMEOUT) {
            http.timeout_seconds = parse_number(HTTP_TIMEOUT, &raw)?;
        }

        Ok(Self {
            bot_token,
            access: AccessConfig {
                chat_id,
                thread_id: (thread_id != 0).then_some(thread_id),
            },
            mode,
            linkding,
            readeck,
            http,
        })
    }

    /// The single principal allowed to talk to the bot.
    pub fn principal(&self) -> Principal {
        Principal::new(self.access.chat_id, self.access.thread_id)
    }

    /// Access gate matching the configured topology.
    pub fn access_gate(&self) -> AccessGate {
        AccessGate::new(self.principal(), self.mode.access_policy())
    }
}

fn load_dotenv() {
    if let Err(e) = tolerate_missing(dotenvy::dotenv()) {
        warn!(error = %e, "Failed to load .env file");
    }
}

/// A missing `.env` is the normal case in containers.
fn tolerate_missing<T>(result: dotenvy::Result<T>) -> dotenvy::Result<()> {
    match result {
        Err(e) if e.not_found() => Ok(()),
        other => other.map(|_| ()),
    }
}

/// Returns `Ok(None)` when neither URL nor token is set anywhere.
fn resolve_service(
    file: Option<FileServiceConfig>,
    env_url: Option<String>,
    env_token: Option<String>,
    (url_name, token_name): (&'static str, &'static str),
) -> Result<Option<ServiceConfig>, ConfigError> {
    let file = file.unwrap_or_default();
    let url = env_url.or(file.base_url).filter(|v| !v.trim().is_empty());
    let token = env_token.or(file.api_token).filter(|v| !v.trim().is_empty());

    match (url, token) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(ConfigError::Missing(url_name)),
        (Some(_), None) => Err(ConfigError::Missing(token_name)),
        (Some(url), Some(api_token)) => {
            let base_url = Url::parse(url.trim()).map_err(|e| ConfigError::Invalid {
                name: url_name,
                reason: e.to_string(),
            })?;
            if !matches!(base_url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid {
                    name: url_name,
                    reason: format!("unsupported scheme '{}'", base_url.scheme()),
                });
            }
            Ok(Some(ServiceConfig {
                base_url,
                api_token,
            }))
        }
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_mode(raw: &str) -> Result<Topology, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "single" => Ok(Topology::Single),
        "dual" => Ok(Topology::Dual),
        other => Err(ConfigError::Invalid {
            name: MODE,
            reason: format!("expected 'single' or 'dual', got '{other}'"),
        }),
    }
}

// ============================================================================
// FileConfig (as written on disk)
// ============================================================================

/// Config file contents. Every field is optional; the environment fills gaps.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub telegram: FileTelegramConfig,
    #[serde(default)]
    pub access: FileAccessConfig,
    #[serde(default)]
    pub mode: Option<Topology>,
    #[serde(default)]
    pub linkding: Option<FileServiceConfig>,
    #[serde(default)]
    pub readeck: Option<FileServiceConfig>,
    #[serde(default)]
    pub http: HttpConfig,
}

impl FileConfig {
    /// Read and parse `path`. A missing file yields an empty config.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Ok(serde_saphyr::from_str(&contents)?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileTelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileAccessConfig {
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub thread_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FileServiceConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::AccessPolicy;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const SINGLE: &[(&str, &str)] = &[
        ("TELEGRAM_TOKEN", "123:abc"),
        ("MY_CHAT_ID", "4242"),
        ("LINKDING_URL", "https://links.example.com"),
        ("LINKDING_API_TOKEN", "ld-token"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs: Vec<_> = SINGLE.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn single_mode_from_env() {
        let config = Config::resolve(FileConfig::default(), env(SINGLE)).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.access.chat_id, 4242);
        assert_eq!(config.access.thread_id, None);
        assert_eq!(config.mode, Topology::Single);
        assert_eq!(
            config.linkding.base_url.as_str(),
            "https://links.example.com/"
        );
        assert!(config.readeck.is_none());
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.access_gate().policy(), AccessPolicy::ChatOrUser);
    }

    #[test]
    fn readeck_credentials_imply_dual_mode() {
        let pairs = with(&[
            ("READECK_API_URL", "https://read.example.com"),
            ("READECK_API_TOKEN", "rd-token"),
            ("TOPIC_ID", "17"),
        ]);
        let config = Config::resolve(FileConfig::default(), env(&pairs)).unwrap();
        assert_eq!(config.mode, Topology::Dual);
        assert_eq!(config.access.thread_id, Some(17));
        assert_eq!(config.readeck.unwrap().api_token, "rd-token");
    }

    #[test]
    fn topic_zero_means_unrestricted() {
        let pairs = with(&[("TOPIC_ID", "0")]);
        let config = Config::resolve(FileConfig::default(), env(&pairs)).unwrap();
        assert_eq!(config.access.thread_id, None);
    }

    #[test]
    fn explicit_dual_without_readeck_is_missing() {
        let pairs = with(&[("LINKRELAY_MODE", "dual")]);
        let err = Config::resolve(FileConfig::default(), env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("READECK_API_URL")));
    }

    #[test]
    fn explicit_single_ignores_readeck() {
        let pairs = with(&[
            ("LINKRELAY_MODE", "Single"),
            ("READECK_API_URL", "https://read.example.com"),
            ("READECK_API_TOKEN", "rd-token"),
        ]);
        let config = Config::resolve(FileConfig::default(), env(&pairs)).unwrap();
        assert_eq!(config.mode, Topology::Single);
        assert!(config.readeck.is_none());
    }

    #[test]
    fn each_required_value_is_reported() {
        for missing in [
            "TELEGRAM_TOKEN",
            "MY_CHAT_ID",
            "LINKDING_URL",
            "LINKDING_API_TOKEN",
        ] {
            let pairs: Vec<_> = SINGLE.iter().filter(|(k, _)| *k != missing).cloned().collect();
            let err = Config::resolve(FileConfig::default(), env(&pairs)).unwrap_err();
            match err {
                ConfigError::Missing(name) => assert_eq!(name, missing),
                other => panic!("expected Missing({missing}), got {other:?}"),
            }
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let pairs: Vec<_> = SINGLE
            .iter()
            .map(|(k, v)| if *k == "LINKDING_API_TOKEN" { (*k, "  ") } else { (*k, *v) })
            .collect();
        let err = Config::resolve(FileConfig::default(), env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("LINKDING_API_TOKEN")));
    }

    #[test]
    fn partial_readeck_is_missing_token() {
        let pairs = with(&[("READECK_API_URL", "https://read.example.com")]);
        let err = Config::resolve(FileConfig::default(), env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("READECK_API_TOKEN")));
    }

    #[test]
    fn invalid_chat_id_and_url_are_rejected() {
        let pairs: Vec<_> = SINGLE
            .iter()
            .map(|(k, v)| if *k == "MY_CHAT_ID" { (*k, "me") } else { (*k, *v) })
            .collect();
        let err = Config::resolve(FileConfig::default(), env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MY_CHAT_ID", .. }));

        let pairs: Vec<_> = SINGLE
            .iter()
            .map(|(k, v)| if *k == "LINKDING_URL" { (*k, "ftp://links") } else { (*k, *v) })
            .collect();
        let err = Config::resolve(FileConfig::default(), env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LINKDING_URL", .. }));
    }

    #[test]
    fn missing_dotenv_is_fine_but_malformed_is_reported() {
        let tmp_dir = TempDir::new().unwrap();
        assert!(tolerate_missing(dotenvy::from_path(tmp_dir.path().join(".env"))).is_ok());

        let malformed = tmp_dir.path().join("broken.env");
        std::fs::write(&malformed, "LINKRELAY_TEST_BROKEN=\"unterminated\n").unwrap();
        let err = tolerate_missing(dotenvy::from_path(&malformed)).unwrap_err();
        assert!(!err.not_found());
    }

    #[tokio::test]
    async fn read_missing_file_returns_empty() {
        let tmp_dir = TempDir::new().unwrap();
        let file = FileConfig::read(tmp_dir.path().join("missing.yaml"))
            .await
            .unwrap();
        assert!(file.telegram.bot_token.is_none());
        assert!(file.linkding.is_none());
        assert_eq!(file.http.timeout_seconds, 30);
    }

    #[tokio::test]
    async fn yaml_file_with_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
telegram:
  bot_token: "file-token"
access:
  chat_id: -1001234
  thread_id: 5
mode: dual
linkding:
  base_url: "http://linkding:9090"
  api_token: "ld"
readeck:
  base_url: "http://readeck:8000"
  api_token: "rd"
http:
  timeout_seconds: 5
"#
        )
        .unwrap();

        let parsed = FileConfig::read(file.path()).await.unwrap();
        let config =
            Config::resolve(parsed, env(&[("TELEGRAM_TOKEN", "env-token")])).unwrap();

        assert_eq!(config.bot_token, "env-token");
        assert_eq!(config.access.chat_id, -1001234);
        assert_eq!(config.access.thread_id, Some(5));
        assert_eq!(config.mode, Topology::Dual);
        assert_eq!(config.http.timeout_seconds, 5);
        assert_eq!(
            config.readeck.as_ref().unwrap().base_url.as_str(),
            "http://readeck:8000/"
        );
        assert_eq!(
            config.access_gate().policy(),
            AccessPolicy::ChatAndThread
        );
    }

    #[tokio::test]
    async fn invalid_yaml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();
        assert!(FileConfig::read(file.path()).await.is_err());
    }

    #[test]
    fn config_error_display() {
        assert_eq!(
            ConfigError::Missing("TELEGRAM_TOKEN").to_string(),
            "missing required configuration value: TELEGRAM_TOKEN"
        );
    }
}
