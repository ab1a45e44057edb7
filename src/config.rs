use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the value for `api.api_key_header`.
pub const API_KEY_ENV: &str = "RESTBARREL_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub connectivity: ConnectivityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Absolute base URL that resource paths are resolved against
  pub base_url: String,
  /// Static headers sent with every request
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Header name that receives the value of RESTBARREL_API_KEY
  pub api_key_header: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database path (default: $XDG_DATA_HOME/restbarrel/cache.db)
  pub path: Option<PathBuf>,
  /// Cache duration in hours used when a call does not give one
  #[serde(default = "default_cache_hours")]
  pub default_hours: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      default_hours: default_cache_hours(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
  /// `host:port` to probe (defaults to the base URL's host)
  pub probe: Option<String>,
  #[serde(default = "default_probe_timeout_ms")]
  pub timeout_ms: u64,
}

impl Default for ConnectivityConfig {
  fn default() -> Self {
    Self {
      probe: None,
      timeout_ms: default_probe_timeout_ms(),
    }
  }
}

fn default_true() -> bool {
  true
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_cache_hours() -> i64 {
  24
}

fn default_probe_timeout_ms() -> u64 {
  1500
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./restbarrel.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/restbarrel/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/restbarrel/config.yaml\n\
                 or pass --base-url. See config.example.yaml for the format."
      )),
    }
  }

  /// Load the first config file found in the search path, if any.
  pub fn discover() -> Result<Option<Self>> {
    Self::find_config_file()
      .map(|p| Self::load_from_path(&p))
      .transpose()
  }

  /// Configuration with defaults for everything except the base URL.
  pub fn from_base_url(base_url: impl Into<String>) -> Self {
    Self {
      api: ApiConfig {
        base_url: base_url.into(),
        headers: BTreeMap::new(),
        timeout_secs: default_timeout_secs(),
        api_key_header: None,
      },
      cache: CacheConfig::default(),
      connectivity: ConnectivityConfig::default(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("restbarrel.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("restbarrel").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Static headers from the file, plus the API key header when configured.
  pub fn static_headers(&self) -> Result<BTreeMap<String, String>> {
    let mut headers = self.api.headers.clone();

    if let Some(name) = &self.api.api_key_header {
      headers.insert(name.clone(), Self::get_api_key()?);
    }

    Ok(headers)
  }

  /// Get the API key from the environment.
  pub fn get_api_key() -> Result<String> {
    std::env::var(API_KEY_ENV).map_err(|_| {
      eyre!(
        "api_key_header is configured but {} is not set.",
        API_KEY_ENV
      )
    })
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  pub fn probe_timeout(&self) -> Duration {
    Duration::from_millis(self.connectivity.timeout_ms)
  }
}
