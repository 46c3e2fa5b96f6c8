use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use evlog::meta;

use crate::runtime::get_logger;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
}

impl Config {
    /// Reads configuration from the environment. `.env` should already have
    /// been loaded by the caller.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("EASYRAFFLE_DATABASE_URL")
            .ok_or_else(|| anyhow!("expected EASYRAFFLE_DATABASE_URL"))?;

        Ok(Self {
            database_url,
            port: try_load(&lookup, "EASYRAFFLE_PORT", "3000")?,
            max_connections: try_load(&lookup, "EASYRAFFLE_MAX_CONNECTIONS", "5")?,
        })
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = match lookup(key) {
        Some(v) => v,
        None => {
            get_logger().info("Environment variable not set, using default.", meta! {
                "Key" => key,
                "Default" => default,
            });
            default.to_owned()
        }
    };

    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("invalid {} value '{}'", key, raw))
}
