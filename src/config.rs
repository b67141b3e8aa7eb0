use std::env;

use anyhow::{anyhow, Result};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_vision_model: String,
    pub openai_text_model: String,
    pub openai_temperature: f32,
    pub openai_timeout_seconds: u64,
    pub vision_max_images: usize,
    pub telegram_chunk_limit: usize,
    pub webhook_host: Option<String>,
    pub webhook_path_secret: String,
    pub port: u16,
}

const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_WEBHOOK_PATH_SECRET: &str = "secret-path";

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_port(name: &str, default: u16) -> u16 {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u16>().unwrap_or_else(|_| {
            warn!("Invalid {} value '{}'; using {}", name, value, default);
            default
        }),
        Err(_) => default,
    }
}

fn required(name: &str) -> Result<String> {
    env_optional(name).ok_or_else(|| anyhow!("{name} is required"))
}

fn normalize_webhook_host(value: String) -> String {
    value.trim_end_matches('/').to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let bot_token = required("BOT_TOKEN")?;
        let openai_api_key = required("OPENAI_API_KEY")?;

        let openai_vision_model = env_optional("OPENAI_VISION_MODEL")
            .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string());
        let openai_text_model =
            env_optional("OPENAI_TEXT_MODEL").unwrap_or_else(|| openai_vision_model.clone());

        let webhook_path_secret = env_optional("WEBHOOK_PATH_SECRET")
            .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH_SECRET.to_string());

        Ok(Config {
            bot_token,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            openai_api_key,
            openai_base_url: env_string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_vision_model,
            openai_text_model,
            openai_temperature: env_f32("OPENAI_TEMPERATURE", 0.7),
            openai_timeout_seconds: env_u64("OPENAI_TIMEOUT_SECONDS", 120),
            vision_max_images: env_usize("VISION_MAX_IMAGES", 8).max(1),
            telegram_chunk_limit: env_usize("TELEGRAM_CHUNK_LIMIT", 3500).max(1),
            webhook_host: env_optional("WEBHOOK_HOST").map(normalize_webhook_host),
            webhook_path_secret,
            port: env_port("PORT", 3000),
        })
    }

    pub fn webhook_path(&self) -> String {
        format!("/telegram/{}", self.webhook_path_secret.trim_matches('/'))
    }

    /// Full public webhook URL, or `None` when the bot should long-poll.
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook_host
            .as_ref()
            .map(|host| format!("{}{}", host, self.webhook_path()))
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            bot_token: "token".to_string(),
            log_level: "info".to_string(),
            openai_api_key: "key".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_vision_model: DEFAULT_VISION_MODEL.to_string(),
            openai_text_model: DEFAULT_VISION_MODEL.to_string(),
            openai_temperature: 0.7,
            openai_timeout_seconds: 120,
            vision_max_images: 8,
            telegram_chunk_limit: 3500,
            webhook_host: None,
            webhook_path_secret: "abc".to_string(),
            port: 3000,
        }
    }
}
