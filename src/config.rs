//! Environment-driven configuration.

use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://product_advisor.db";
pub const DEFAULT_STORAGE_SLOT: &str = "product-advisor.conversations";
pub const DEFAULT_AGENT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_AGENT_ID: &str = "llama3.2";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorConfig {
    pub database_url: String,
    pub storage_slot: String,
    pub agent_base_url: String,
    pub agent_id: String,
    pub demo_mode: bool,
    pub port: u16,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            storage_slot: DEFAULT_STORAGE_SLOT.to_string(),
            agent_base_url: DEFAULT_AGENT_BASE_URL.to_string(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
            demo_mode: false,
            port: DEFAULT_PORT,
        }
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default)
        };

        Self {
            database_url: string("DATABASE_URL", defaults.database_url),
            storage_slot: string("STORAGE_SLOT", defaults.storage_slot),
            agent_base_url: string("AGENT_BASE_URL", defaults.agent_base_url),
            agent_id: string("AGENT_ID", defaults.agent_id),
            demo_mode: parse_or("DEMO_MODE", lookup("DEMO_MODE"), defaults.demo_mode),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {key}={raw:?}, using default");
            default
        }),
    }
}
