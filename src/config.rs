use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use serenity::all::{ChannelId, RoleId};

use crate::error::ConfigError;
use crate::moderation::DeletionPolicy;

const DEFAULT_ROLE_NAME: &str = "lowball";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PACING_MS: u64 = 100;
const DEFAULT_MAX_AGE_DAYS: i64 = 14;

/// Settings read once at startup and shared immutably afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    /// Channel that receives lowball submissions.
    pub lowball_channel_id: Option<ChannelId>,
    /// Channel where messages from non-admins are removed on arrival.
    pub auto_delete_channel_id: Option<ChannelId>,
    pub lowball_role_name: String,
    /// Role mentioned (spoilered) at the top of every submission.
    pub lowball_ping_role_id: Option<RoleId>,
    pub port: u16,
    /// Base URL pinged every 14 minutes in production deployments.
    pub keep_alive_url: Option<String>,
    pub deletion: DeletionPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::MissingEnvVar("DISCORD_TOKEN"))?;

        let lowball_channel_id = get("LOWBALL_CHANNEL_ID")
            .map(|value| parse_id("LOWBALL_CHANNEL_ID", &value).map(ChannelId::new))
            .transpose()?;
        let auto_delete_channel_id = get("AUTO_DELETE_CHANNEL_ID")
            .map(|value| parse_id("AUTO_DELETE_CHANNEL_ID", &value).map(ChannelId::new))
            .transpose()?;
        let lowball_ping_role_id = get("LOWBALL_PING_ROLE_ID")
            .map(|value| parse_id("LOWBALL_PING_ROLE_ID", &value).map(RoleId::new))
            .transpose()?;

        let lowball_role_name =
            get("LOWBALL_ROLE_NAME").unwrap_or_else(|| DEFAULT_ROLE_NAME.to_string());

        let port = get("PORT")
            .map(|value| parse_number::<u16>("PORT", &value))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let production = get("APP_ENV").is_some_and(|value| value == "production");
        let keep_alive_url = get("RENDER_SERVICE_URL")
            .filter(|_| production)
            .map(|url| url.trim_end_matches('/').to_string());

        let pacing_ms = get("PURGE_PACING_MS")
            .map(|value| parse_number::<u64>("PURGE_PACING_MS", &value))
            .transpose()?
            .unwrap_or(DEFAULT_PACING_MS);
        let max_age_days = get("MAX_DELETE_AGE_DAYS")
            .map(|value| parse_number::<i64>("MAX_DELETE_AGE_DAYS", &value))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_AGE_DAYS);
        if max_age_days <= 0 {
            return Err(ConfigError::InvalidEnvVar {
                name: "MAX_DELETE_AGE_DAYS",
                value: max_age_days.to_string(),
            });
        }

        Ok(Self {
            token,
            lowball_channel_id,
            auto_delete_channel_id,
            lowball_role_name,
            lowball_ping_role_id,
            port,
            keep_alive_url,
            deletion: DeletionPolicy {
                max_age: Duration::days(max_age_days),
                pacing: StdDuration::from_millis(pacing_ms),
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnvVar {
            name,
            value: value.to_string(),
        })
}

/// Discord snowflakes are never zero, and serenity's id constructors reject it.
fn parse_id(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match parse_number::<u64>(name, value)? {
        0 => Err(ConfigError::InvalidEnvVar {
            name,
            value: value.to_string(),
        }),
        id => Ok(id),
    }
}
