use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;
use walkin_core::application::ThresholdPolicy;
use walkin_infra_sms::{TwilioConfig, TWILIO_API_BASE};

pub const DEFAULT_CONFIG_PATH: &str = "~/.walkin/notifier.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite path or URL; `~` is expanded
    pub database_url: String,
    /// Shop whose queue this daemon watches
    pub shop_id: String,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    #[serde(default)]
    pub threshold_policy: ThresholdPolicy,
    /// How long a notification claim blocks other cycles.
    /// Must be longer than the transport timeout.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Twilio,
    /// Dry run: messages are logged, never sent
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    #[serde(default = "default_transport_kind")]
    pub kind: TransportKind,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_transport_timeout_secs")]
    pub timeout_secs: u64,
}

impl Settings {
    /// Defaults, then the TOML file at `WALKIN_CONFIG` (if present), then
    /// `WALKIN_*` environment variables (`__` separates nested keys, e.g.
    /// `WALKIN_TRANSPORT__AUTH_TOKEN`).
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WALKIN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = shellexpand::tilde(&path).into_owned();

        let builder = defaults()?
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(environment());

        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shop_id.trim().is_empty() {
            return Err(ConfigError::Message("shop_id cannot be empty".to_string()));
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::Message(
                "tick_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.claim_lease_secs <= self.transport.timeout_secs {
            return Err(ConfigError::Message(format!(
                "claim_lease_secs ({}) must exceed transport.timeout_secs ({})",
                self.claim_lease_secs, self.transport.timeout_secs
            )));
        }
        if self.transport.kind == TransportKind::Twilio {
            for (key, value) in [
                ("transport.account_sid", &self.transport.account_sid),
                ("transport.auth_token", &self.transport.auth_token),
                ("transport.from_number", &self.transport.from_number),
            ] {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    return Err(ConfigError::Message(format!(
                        "{} is required when transport.kind = twilio",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database_url).into_owned()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl TransportSettings {
    /// Twilio client settings; `None` unless kind = twilio with credentials
    pub fn twilio(&self) -> Option<TwilioConfig> {
        if self.kind != TransportKind::Twilio {
            return None;
        }
        Some(TwilioConfig {
            account_sid: self.account_sid.clone()?,
            auth_token: self.auth_token.clone()?,
            from_number: self.from_number.clone()?,
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("database_url", default_database_url())?
        .set_default("tick_interval_secs", default_tick_interval_secs() as i64)?
        .set_default("threshold_policy", ThresholdPolicy::default().as_str())?
        .set_default("claim_lease_secs", default_claim_lease_secs() as i64)?
        .set_default("shutdown_timeout_secs", default_shutdown_timeout_secs() as i64)?
        .set_default("transport.kind", "twilio")?
        .set_default("transport.base_url", default_base_url())?
        .set_default(
            "transport.timeout_secs",
            default_transport_timeout_secs() as i64,
        )
}

fn environment() -> Environment {
    Environment::with_prefix("WALKIN")
        .prefix_separator("_")
        .separator("__")
}

fn default_database_url() -> String {
    "~/.walkin/walkin.db".to_string()
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_claim_lease_secs() -> u64 {
    60
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_transport_kind() -> TransportKind {
    TransportKind::Twilio
}

fn default_base_url() -> String {
    TWILIO_API_BASE.to_string()
}

fn default_transport_timeout_secs() -> u64 {
    10
}
