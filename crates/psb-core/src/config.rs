use std::{env, fs, path::Path, time::Duration};

use crate::{domain::Credentials, domain::UserId, errors::Error, Result};

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub force_join_channel: String,
    pub admin_id: UserId,

    // Scraping backend
    pub instagram_credentials: Option<Credentials>,
    pub instagram_min_interval: Duration,
    pub instagram_request_timeout: Duration,

    // Runtime
    pub health_port: u16,
    pub polling_restart_delay: Duration,

    // Optional links rendered as buttons
    pub updates_url: Option<String>,
    pub developer_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required env vars
        let telegram_bot_token = get("API_TOKEN").ok_or_else(|| missing("API_TOKEN"))?;
        let force_join_channel = get("FORCE_JOIN_CHANNEL")
            .map(|c| c.trim().trim_start_matches('@').to_string())
            .and_then(non_empty)
            .ok_or_else(|| missing("FORCE_JOIN_CHANNEL"))?;
        let admin_raw = get("ADMIN_ID").ok_or_else(|| missing("ADMIN_ID"))?;
        let admin_id = admin_raw.trim().parse::<i64>().map(UserId).map_err(|_| {
            Error::Config(format!("ADMIN_ID must be a numeric user id, got {admin_raw:?}"))
        })?;

        // Optional backend credentials; both halves must be present.
        let instagram_credentials = match (get("INSTAGRAM_USERNAME"), get("INSTAGRAM_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.trim().to_string(),
                password,
            }),
            _ => None,
        };

        let instagram_min_interval =
            Duration::from_secs(parse_u64(&get, "INSTAGRAM_MIN_INTERVAL_SECS")?.unwrap_or(5));
        let instagram_request_timeout =
            Duration::from_secs(parse_u64(&get, "INSTAGRAM_REQUEST_TIMEOUT_SECS")?.unwrap_or(60));

        let health_port = match get("PORT") {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a valid port, got {p:?}")))?,
            None => 8080,
        };
        let polling_restart_delay =
            Duration::from_secs(parse_u64(&get, "POLLING_RESTART_DELAY_SECS")?.unwrap_or(5));

        Ok(Self {
            telegram_bot_token,
            force_join_channel,
            admin_id,
            instagram_credentials,
            instagram_min_interval,
            instagram_request_timeout,
            health_port,
            polling_restart_delay,
            updates_url: get("UPDATES_URL"),
            developer_url: get("DEVELOPER_URL"),
        })
    }

    pub fn channel_url(&self) -> String {
        format!("https://t.me/{}", self.force_join_channel)
    }
}

fn missing(key: &str) -> Error {
    Error::Config(format!("{key} environment variable is required"))
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
