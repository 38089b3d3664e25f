use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use sprout_hub::{DEFAULT_RECONNECT_ATTEMPTS, MqttSettings};
use sprout_services::AuthConfig;

/// Process configuration, read from `SPROUT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub series_db_path: PathBuf,
    pub mqtt: MqttSettings,
    pub reconnect_attempts: u32,
    /// Externally reachable base URL, used to build password reset links.
    pub public_url: String,
    /// Without a key, outgoing mail is only logged.
    pub sendgrid_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("SPROUT_PORT", "8080")
            .parse()
            .context("SPROUT_PORT must be a port number")?;
        let reconnect_attempts = match lookup("SPROUT_MQTT_RECONNECT_ATTEMPTS") {
            Some(v) => v
                .parse()
                .context("SPROUT_MQTT_RECONNECT_ATTEMPTS must be a non-negative integer")?,
            None => DEFAULT_RECONNECT_ATTEMPTS,
        };

        Ok(Self {
            host: var("SPROUT_HOST", "0.0.0.0"),
            port,
            db_path: var("SPROUT_DB_PATH", "sprout.db").into(),
            series_db_path: var("SPROUT_SERIES_DB_PATH", "sprout-series.db").into(),
            mqtt: MqttSettings {
                uri: var("SPROUT_MQTT_URI", "mqtt://localhost:1883"),
                client_id: var("SPROUT_MQTT_CLIENT_ID", "sprout_hub"),
                keep_alive: Duration::from_secs(30),
            },
            reconnect_attempts,
            public_url: var("SPROUT_PUBLIC_URL", "http://localhost:8080"),
            sendgrid_api_key: lookup("SPROUT_SENDGRID_API_KEY").filter(|k| !k.is_empty()),
            mail_from: var("SPROUT_MAIL_FROM", "noreply@localhost"),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            reset_link_base: format!("{}/pw/change", self.public_url.trim_end_matches('/')),
            ..AuthConfig::default()
        }
    }
}
