use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::delta::FileCheckpointStore;
use crate::duration::deserialize_duration_opt;
use crate::session::{SessionCache, SessionOptions, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

const CONFIG_FILE_NAME: &str = "v2ex.toml";
const CHECKPOINT_FILE_NAME: &str = "checkpoint.json";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Where and how to reach the forum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout such as `"30s"`. Unset means no timeout.
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing
    )]
    pub timeout: Option<Duration>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: None,
        }
    }
}

/// Delivery target for new notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Push webhook that receives `text`/`desp` form posts. When unset,
    /// notifications are only logged.
    pub webhook_url: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for the session cache and checkpoint. If relative, resolved
    /// from the config file location; if unset, the config file's directory.
    pub data_dir: Option<PathBuf>,

    pub site: SiteConfig,

    pub notify: NotifyConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub site: SiteConfig,
    pub notify: NotifyConfig,
}

/// Returns the default config file path.
///
/// `./v2ex.toml` when present, otherwise `v2ex-client/v2ex.toml` under the
/// platform data directory.
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("v2ex-client").join(CONFIG_FILE_NAME);
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        Ok(Self::resolve(config, config_dir))
    }

    /// Load config, falling back to defaults rooted at the config file's
    /// intended directory when it doesn't exist.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };
        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Self::resolve(Config::default(), config_dir))
    }

    fn resolve(config: Config, config_dir: &Path) -> Self {
        Self {
            data_dir: config.resolve_data_dir(config_dir),
            site: config.site,
            notify: config.notify,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            base_url: self.site.base_url.clone(),
            user_agent: self.site.user_agent.clone(),
            timeout: self.site.timeout,
        }
    }

    pub fn session_cache(&self) -> Result<SessionCache> {
        SessionCache::with_dir(&self.data_dir)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_FILE_NAME)
    }

    pub fn checkpoint_store(&self) -> FileCheckpointStore {
        FileCheckpointStore::new(self.checkpoint_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_data_dir_is_config_dir() {
        let config = Config::default();
        let config_dir = Path::new("/home/user/v2ex");
        assert_eq!(
            config.resolve_data_dir(config_dir),
            PathBuf::from("/home/user/v2ex")
        );
    }

    #[test]
    fn test_relative_and_absolute_data_dir() {
        let config_dir = Path::new("/home/user/v2ex");
        let relative = Config {
            data_dir: Some(PathBuf::from("state")),
            ..Default::default()
        };
        assert_eq!(
            relative.resolve_data_dir(config_dir),
            PathBuf::from("/home/user/v2ex/state")
        );

        let absolute = Config {
            data_dir: Some(PathBuf::from("/var/lib/v2ex")),
            ..Default::default()
        };
        assert_eq!(
            absolute.resolve_data_dir(config_dir),
            PathBuf::from("/var/lib/v2ex")
        );
    }

    #[test]
    fn test_load_site_and_notify() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("v2ex.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[site]")?;
        writeln!(file, "base_url = \"http://127.0.0.1:8080\"")?;
        writeln!(file, "timeout = \"15s\"")?;
        writeln!(file, "[notify]")?;
        writeln!(file, "webhook_url = \"https://push.example.com/send/abc\"")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.site.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.site.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.site.timeout, Some(Duration::from_secs(15)));
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://push.example.com/send/abc")
        );

        Ok(())
    }

    #[test]
    fn test_load_empty_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("v2ex.toml");
        std::fs::File::create(&config_path)?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.data_dir, None);
        assert_eq!(config.site.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.site.timeout, None);
        assert_eq!(config.notify.webhook_url, None);

        Ok(())
    }

    #[test]
    fn test_invalid_timeout_is_error() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("v2ex.toml");
        std::fs::write(&config_path, "[site]\ntimeout = \"soon\"\n")?;

        assert!(Config::load(&config_path).is_err());
        Ok(())
    }

    #[test]
    fn test_resolved_config_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("v2ex.toml");

        let resolved = ResolvedConfig::load_or_default(&config_path)?;
        assert_eq!(resolved.data_dir, dir.path());
        assert_eq!(resolved.checkpoint_path(), dir.path().join("checkpoint.json"));
        assert_eq!(resolved.session_options().base_url, DEFAULT_BASE_URL);

        Ok(())
    }

    #[test]
    fn test_resolved_config_paths_follow_data_dir() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("v2ex.toml");
        std::fs::write(&config_path, "data_dir = \"./state\"\n")?;

        let resolved = ResolvedConfig::load(&config_path)?;
        let data_dir = dir.path().canonicalize()?.join("state");
        assert_eq!(resolved.data_dir, data_dir);
        assert_eq!(resolved.session_cache()?.path(), data_dir.join("session.json"));
        assert_eq!(resolved.checkpoint_store().path(), data_dir.join("checkpoint.json"));

        Ok(())
    }
}
