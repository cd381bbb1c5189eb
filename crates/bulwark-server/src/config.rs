use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

const PLACEHOLDER_TOKENS: &[&str] = &["change-me", "changeme", "dev-secret-change-me", "your-admin-token"];

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub admin_token: String,
    /// `None` runs against the in-memory transport.
    pub discord_token: Option<String>,
    pub discord_api_base: String,
    pub publish_channel: Option<String>,
    pub admin_channel: Option<String>,
    pub default_season: String,
    pub opponent_delay: Duration,
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let admin_token = required("BULWARK_ADMIN_TOKEN")?;
        if PLACEHOLDER_TOKENS.contains(&admin_token.as_str()) {
            bail!("BULWARK_ADMIN_TOKEN is still a placeholder value");
        }

        Ok(Self {
            db_path: PathBuf::from(or_default("BULWARK_DB_PATH", "data/submissions.db")),
            host: or_default("BULWARK_HOST", "0.0.0.0"),
            port: or_default("BULWARK_PORT", "3000")
                .parse()
                .context("BULWARK_PORT must be a port number")?,
            admin_token,
            discord_token: optional("DISCORD_TOKEN"),
            discord_api_base: or_default("DISCORD_API_BASE", bulwark_gateway::discord::DEFAULT_API_BASE),
            publish_channel: optional("PUBLISH_CHANNEL_ID"),
            admin_channel: optional("ADMIN_CHANNEL_ID"),
            default_season: or_default("BULWARK_DEFAULT_SEASON", "158"),
            opponent_delay: Duration::from_millis(
                or_default("BULWARK_OPPONENT_DELAY_MS", "500")
                    .parse()
                    .context("BULWARK_OPPONENT_DELAY_MS must be a number of milliseconds")?,
            ),
            session_ttl: Duration::from_secs(
                or_default("BULWARK_SESSION_TTL_SECS", "600")
                    .parse()
                    .context("BULWARK_SESSION_TTL_SECS must be a number of seconds")?,
            ),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn or_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn required(key: &str) -> anyhow::Result<String> {
    optional(key).with_context(|| format!("{} must be set", key))
}
