use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Everything comes from the environment (plus an optional `.env` file).
/// Missing credentials are the only fatal startup condition.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub admin_id: i64,
    pub answer_api_keys: Vec<String>,
    pub image_api_keys: Vec<String>,

    // Persistence
    pub data_dir: PathBuf,

    // Keep-alive
    pub port: u16,
    pub self_ping_url: Option<String>,
    pub self_ping_interval: Duration,

    // Entitlement constants
    pub subscription_days: i64,
    pub trial_window: Duration,
    pub trial_cooldown: Duration,
    pub image_key_grant: u32,

    // Upstreams
    pub answer_model: String,
    pub image_model: String,
    pub upstream_timeout: Duration,

    // Transport limits
    pub message_limit: usize,
    pub long_input_notice_len: usize,
    pub broadcast_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let bot_token = env_str("BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;
        let admin_id = env_str("ADMIN_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| {
                Error::Config("ADMIN_ID environment variable is required".to_string())
            })?;

        let answer_api_keys = parse_csv(env_str("GEMINI_API_KEYS"));
        if answer_api_keys.is_empty() {
            return Err(Error::Config(
                "GEMINI_API_KEYS is not set (comma-separated)".to_string(),
            ));
        }
        let image_api_keys = parse_csv(env_str("REPLICATE_API_KEYS"));
        if image_api_keys.is_empty() {
            return Err(Error::Config(
                "REPLICATE_API_KEYS is not set (comma-separated)".to_string(),
            ));
        }

        let data_dir = env_path("DATA_DIR").unwrap_or_else(|| PathBuf::from("data"));
        fs::create_dir_all(&data_dir)?;

        let port = env_u64("PORT").unwrap_or(8080) as u16;
        let self_ping_url = env_str("SELF_PING_URL").and_then(non_empty);
        let self_ping_interval =
            Duration::from_secs(env_u64("SELF_PING_INTERVAL_SECS").unwrap_or(300));

        let subscription_days = env_u64("SUBSCRIPTION_DAYS").unwrap_or(25) as i64;
        let trial_window = Duration::from_secs(env_u64("TRIAL_PERIOD_SECONDS").unwrap_or(600));
        let trial_cooldown =
            Duration::from_secs(env_u64("TRIAL_COOLDOWN_SECONDS").unwrap_or(5 * 24 * 60 * 60));
        let image_key_grant = env_u64("IMAGE_KEY_GRANT").unwrap_or(10) as u32;

        let answer_model =
            env_str("ANSWER_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string());
        let image_model =
            env_str("IMAGE_MODEL").unwrap_or_else(|| "recraft-ai/recraft-v3".to_string());
        let upstream_timeout = Duration::from_secs(env_u64("UPSTREAM_TIMEOUT_SECS").unwrap_or(90));

        let message_limit = env_u64("MESSAGE_LIMIT").unwrap_or(4000) as usize;
        let long_input_notice_len = env_u64("LONG_INPUT_NOTICE_LEN").unwrap_or(10_000) as usize;
        let broadcast_delay = Duration::from_millis(env_u64("BROADCAST_DELAY_MS").unwrap_or(100));

        Ok(Self {
            bot_token,
            admin_id,
            answer_api_keys,
            image_api_keys,
            data_dir,
            port,
            self_ping_url,
            self_ping_interval,
            subscription_days,
            trial_window,
            trial_cooldown,
            image_key_grant,
            answer_model,
            image_model,
            upstream_timeout,
            message_limit,
            long_input_notice_len,
            broadcast_delay,
        })
    }
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

        let key = k.trim();
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

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parsing_trims_and_drops_empty() {
        let keys = parse_csv(Some(" a , ,b,,c ".to_string()));
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(parse_csv(None).is_empty());
    }
}
