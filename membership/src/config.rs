use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::engine::guild::MemberLimits;
use crate::engine::validation::{MAX_NICKNAME_LENGTH, MAX_ROLES_PER_MEMBER};

/// Top-level configuration, loaded from concord-members.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct MembershipConfig {
    pub limits: LimitsSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_nickname_length: usize,
    pub max_roles_per_member: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_nickname_length: MAX_NICKNAME_LENGTH,
            max_roles_per_member: MAX_ROLES_PER_MEMBER,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl MembershipConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MAX_NICKNAME_LENGTH")
            && let Ok(len) = v.parse()
        {
            self.limits.max_nickname_length = len;
        }
        if let Ok(v) = std::env::var("MAX_ROLES_PER_MEMBER")
            && let Ok(max) = v.parse()
        {
            self.limits.max_roles_per_member = max;
        }
        if let Ok(v) = std::env::var("LOG_FILTER") {
            self.logging.filter = v;
        }
    }

    pub fn limits(&self) -> MemberLimits {
        MemberLimits {
            max_nickname_length: self.limits.max_nickname_length,
            max_roles_per_member: self.limits.max_roles_per_member,
        }
    }
}
