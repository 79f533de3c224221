//! Layered application configuration.
//!
//! Precedence, lowest to highest: built-in defaults, a YAML file when
//! provided, environment variables prefixed `CASHBOOK__`.

use std::path::Path;

use anyhow::Context;
use entitlements::EntitlementsConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default tracing filter; `RUST_LOG` takes precedence when set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub entitlements: EntitlementsConfig,
    /// Account tracked by the validator and listener in local mode.
    pub subject: String,
    /// Whether the stub billing provider reports an active subscription.
    pub billing_active: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            entitlements: EntitlementsConfig::default(),
            subject: "owner@cashbook.local".to_owned(),
            billing_active: false,
        }
    }
}

impl AppConfig {
    /// Load defaults, then the YAML file (if any), then `CASHBOOK__*` env.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("CASHBOOK__").split("__"))
            .extract()
            .context("invalid configuration")
    }

    /// The effective configuration, rendered for `--print-config`.
    pub fn render(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serializing configuration")
    }
}
