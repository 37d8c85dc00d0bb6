/*
[INPUT]:  Optional YAML configuration file, DERIBIT_STREAM__* environment variables
[OUTPUT]: Validated runner configuration, session config and signer
[POS]:    Configuration layer - stream setup
[UPDATE]: When adding new configuration options
*/

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use deribit_adapter::auth::DEFAULT_SCOPE_PREFIX;
use deribit_adapter::{BackoffConfig, Credentials, DeribitAuth, Domain, SessionConfig};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "DERIBIT_STREAM";
const ENV_SEPARATOR: &str = "__";

/// Top-level configuration for the user stream runner
#[derive(Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Venue environment: `main` or `test`
    #[serde(default)]
    pub domain: Domain,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Prefix of the per-connection session scope
    #[serde(default = "default_scope_prefix")]
    pub scope_prefix: String,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub backoff: BackoffSettings,
}

/// Reconnect delay settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffSettings {
    #[serde(default = "default_backoff_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub max_ms: u64,
    /// Fraction in `0.0..=1.0`
    #[serde(default = "default_backoff_jitter")]
    pub jitter: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_ms: default_backoff_initial_ms(),
            max_ms: default_backoff_max_ms(),
            jitter: default_backoff_jitter(),
        }
    }
}

fn default_scope_prefix() -> String {
    DEFAULT_SCOPE_PREFIX.to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    40
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_backoff_initial_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_backoff_jitter() -> f64 {
    0.2
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope_prefix", &self.scope_prefix)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Environment source: `DERIBIT_STREAM__CLIENT_ID`, `DERIBIT_STREAM__BACKOFF__MAX_MS`, ...
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

impl StreamConfig {
    /// Load from an optional YAML file, overridden by the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }
        Self::from_builder(builder.add_source(env_source()))
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.credentials()
            .validate()
            .context("invalid credentials")?;
        if self.scope_prefix.trim().is_empty() {
            bail!("scope_prefix must not be empty");
        }
        if self.heartbeat_interval_secs < 10 {
            bail!(
                "heartbeat_interval_secs must be at least 10, got {}",
                self.heartbeat_interval_secs
            );
        }
        if self.idle_timeout_secs == 0 {
            bail!("idle_timeout_secs must be positive");
        }
        if self.backoff.initial_ms == 0 || self.backoff.initial_ms > self.backoff.max_ms {
            bail!(
                "backoff.initial_ms must be in 1..=max_ms ({}), got {}",
                self.backoff.max_ms,
                self.backoff.initial_ms
            );
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter) {
            bail!("backoff.jitter must be within 0.0..=1.0, got {}", self.backoff.jitter);
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.client_id.clone(), self.client_secret.clone())
    }

    pub fn auth(&self) -> Result<DeribitAuth> {
        let auth = DeribitAuth::new(self.credentials()).context("build request signer")?;
        Ok(auth.with_scope_prefix(self.scope_prefix.clone()))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            backoff: BackoffConfig {
                initial: Duration::from_millis(self.backoff.initial_ms),
                max: Duration::from_millis(self.backoff.max_ms),
                jitter: self.backoff.jitter,
            },
            ..SessionConfig::for_domain(self.domain)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> Result<StreamConfig> {
        StreamConfig::from_builder(
            Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)),
        )
    }

    #[test]
    fn test_defaults_applied() {
        let config = from_yaml("client_id: abc\nclient_secret: xyz\n").unwrap();
        assert_eq!(config.domain, Domain::Main);
        assert_eq!(config.scope_prefix, DEFAULT_SCOPE_PREFIX);

        let session = config.session_config();
        assert_eq!(session.url, "wss://www.deribit.com/ws/api/v2");
        assert_eq!(session.heartbeat_interval, Duration::from_secs(40));
        assert_eq!(session.idle_timeout, Duration::from_secs(30));
        assert_eq!(session.backoff.initial, Duration::from_millis(500));
        assert_eq!(session.backoff.max, Duration::from_secs(30));
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
domain: test
client_id: abc
client_secret: xyz
scope_prefix: desk
heartbeat_interval_secs: 60
backoff:
  initial_ms: 250
  max_ms: 5000
  jitter: 0.0
"#;
        let config = from_yaml(yaml).unwrap();
        let session = config.session_config();
        assert_eq!(session.url, "wss://test.deribit.com/ws/api/v2");
        assert_eq!(session.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(session.backoff.initial, Duration::from_millis(250));
        assert_eq!(session.backoff.jitter, 0.0);

        let scope = config.auth().unwrap().handshake_payload().params.scope;
        assert!(scope.starts_with("session:desk-"), "{scope}");
    }

    #[test]
    fn test_environment_overrides_file() {
        let env = env_source().source(Some(
            [
                ("DERIBIT_STREAM__CLIENT_SECRET", "from-env"),
                ("DERIBIT_STREAM__BACKOFF__MAX_MS", "9000"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ));
        let builder = Config::builder()
            .add_source(File::from_str(
                "client_id: abc\nclient_secret: from-file\n",
                FileFormat::Yaml,
            ))
            .add_source(env);

        let config = StreamConfig::from_builder(builder).unwrap();
        assert_eq!(config.client_secret, "from-env");
        assert_eq!(config.backoff.max_ms, 9000);
        assert_eq!(config.backoff.initial_ms, 500);
    }

    #[test]
    fn test_missing_credentials_rejected() {
        assert!(from_yaml("domain: test\n").is_err());
        assert!(from_yaml("client_id: abc\nclient_secret: '  '\n").is_err());
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let base = "client_id: abc\nclient_secret: xyz\n";
        assert!(from_yaml(&format!("{base}heartbeat_interval_secs: 5\n")).is_err());
        assert!(from_yaml(&format!("{base}backoff:\n  initial_ms: 0\n")).is_err());
        assert!(from_yaml(&format!("{base}backoff:\n  jitter: 1.5\n")).is_err());
        assert!(from_yaml(&format!("{base}domain: staging\n")).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = from_yaml("client_id: abc\nclient_secret: hunter2\n").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("abc"));
    }
}
