use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

/// Client configuration: credentials plus the transport knobs.
///
/// All behavior lives in the kernel; this is pure data.
#[derive(Debug, Clone)]
pub struct PelagosConfig {
    /// Private key in any supported encoding (hex, base-58, base-64).
    pub private_key: Secret<String>,
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for PelagosConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("PelagosConfig", 9)?;
        state.serialize_field("private_key", "[REDACTED]")?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("ws_url", &self.ws_url)?;
        state.serialize_field("timeout_seconds", &self.timeout_seconds)?;
        state.serialize_field("max_retries", &self.max_retries)?;
        state.serialize_field("retry_base_delay_ms", &self.retry_base_delay_ms)?;
        state.serialize_field("auto_reconnect", &self.auto_reconnect)?;
        state.serialize_field("reconnect_delay_ms", &self.reconnect_delay_ms)?;
        state.serialize_field("max_reconnect_attempts", &self.max_reconnect_attempts)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for PelagosConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct PelagosConfigHelper {
            private_key: String,
            base_url: Option<String>,
            ws_url: Option<String>,
            #[serde(default = "default_timeout")]
            timeout_seconds: u64,
            #[serde(default = "default_retries")]
            max_retries: u32,
            #[serde(default = "default_retry_delay")]
            retry_base_delay_ms: u64,
            #[serde(default = "default_true")]
            auto_reconnect: bool,
            #[serde(default = "default_retry_delay")]
            reconnect_delay_ms: u64,
            #[serde(default = "default_reconnect_attempts")]
            max_reconnect_attempts: u32,
        }

        let helper = PelagosConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            private_key: Secret::new(helper.private_key),
            base_url: helper.base_url,
            ws_url: helper.ws_url,
            timeout_seconds: helper.timeout_seconds,
            max_retries: helper.max_retries,
            retry_base_delay_ms: helper.retry_base_delay_ms,
            auto_reconnect: helper.auto_reconnect,
            reconnect_delay_ms: helper.reconnect_delay_ms,
            max_reconnect_attempts: helper.max_reconnect_attempts,
        })
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1_000
}
fn default_true() -> bool {
    true
}
fn default_reconnect_attempts() -> u32 {
    10
}

impl PelagosConfig {
    /// Create a new configuration with a private key.
    #[must_use]
    pub fn new(private_key: String) -> Self {
        Self {
            private_key: Secret::new(private_key),
            base_url: None,
            ws_url: None,
            timeout_seconds: default_timeout(),
            max_retries: default_retries(),
            retry_base_delay_ms: default_retry_delay(),
            auto_reconnect: true,
            reconnect_delay_ms: default_retry_delay(),
            max_reconnect_attempts: default_reconnect_attempts(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_PRIVATE_KEY` (e.g., `PELAGOS_PRIVATE_KEY`)
    /// - `{PREFIX}_BASE_URL` (optional)
    /// - `{PREFIX}_WS_URL` (optional)
    /// - `{PREFIX}_TIMEOUT_SECONDS` (optional)
    /// - `{PREFIX}_MAX_RETRIES` (optional)
    /// - `{PREFIX}_AUTO_RECONNECT` (optional, defaults to true)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let key_var = format!("{}_PRIVATE_KEY", prefix);

        let private_key =
            env::var(&key_var).map_err(|_| ConfigError::MissingEnvironmentVariable(key_var))?;

        let mut config = Self::new(private_key);
        config.base_url = env::var(format!("{}_BASE_URL", prefix)).ok();
        config.ws_url = env::var(format!("{}_WS_URL", prefix)).ok();

        if let Ok(timeout) = env::var(format!("{}_TIMEOUT_SECONDS", prefix)) {
            config.timeout_seconds = timeout
                .parse()
                .map_err(|_| ConfigError::InvalidConfiguration(format!(
                    "{}_TIMEOUT_SECONDS must be an integer, got '{}'",
                    prefix, timeout
                )))?;
        }
        if let Ok(retries) = env::var(format!("{}_MAX_RETRIES", prefix)) {
            config.max_retries = retries
                .parse()
                .map_err(|_| ConfigError::InvalidConfiguration(format!(
                    "{}_MAX_RETRIES must be an integer, got '{}'",
                    prefix, retries
                )))?;
        }
        if let Ok(auto) = env::var(format!("{}_AUTO_RECONNECT", prefix)) {
            config.auto_reconnect = auto.parse::<bool>().unwrap_or(true);
        }

        Ok(config)
    }

    /// Create configuration from a .env file and environment variables.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    /// Add .env to your .gitignore file.
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path.
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(_) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no .env file, continue with system env vars
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Configuration for public market-data endpoints only.
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new())
    }

    /// Whether this configuration can sign authenticated operations.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.private_key.expose_secret().is_empty()
    }

    /// Set custom REST base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set custom WebSocket URL.
    #[must_use]
    pub fn ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    #[must_use]
    pub const fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    #[must_use]
    pub const fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub const fn auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    #[must_use]
    pub const fn reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub const fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Get the private key (use carefully - exposes the secret).
    pub fn private_key(&self) -> &str {
        self.private_key.expose_secret()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
