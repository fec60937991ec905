use color_eyre::eyre::{Result, WrapErr, ensure};
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::{path::Path, path::PathBuf, time::Duration};

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// What every command has to start with.
    pub prefix: String,
    /// Shown in the menu and `info`.
    pub bot_name: String,
    pub owner_name: String,
    /// Phone numbers (any formatting) that count as bot owners.
    pub owner_numbers: Vec<String>,
    /// Where the sled store lives.
    pub database_path: PathBuf,
    /// Address the webhook + health server binds to.
    pub bind_address: String,
    /// How often stale limiter keys, games and conversations are dropped.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "janitor_interval_secs")]
    pub janitor_interval: Duration,
    /// Unfinished games with no move for this long are forgotten.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "game_timeout_secs")]
    pub game_timeout: Duration,
    pub bridge: BridgeConfig,
    pub rate_limit: RateLimitConfig,
    pub xp: XpConfig,
    pub moderation: ModerationConfig,
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prefix: ".".to_owned(),
            bot_name: "BLACKSKY-MD".to_owned(),
            owner_name: "Owner".to_owned(),
            owner_numbers: vec![],
            database_path: PathBuf::from("blacksky.db"),
            bind_address: "0.0.0.0:5000".to_owned(),
            janitor_interval: Duration::from_secs(300),
            game_timeout: Duration::from_secs(300),
            bridge: BridgeConfig::default(),
            rate_limit: RateLimitConfig::default(),
            xp: XpConfig::default(),
            moderation: ModerationConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the Baileys bridge, e.g. `http://localhost:3001`.
    pub url: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            url: "http://localhost:3001".to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests one user may make of one command per window.
    pub per_command: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "window_secs")]
    pub window: Duration,
    /// Messages a single group may receive per minute before anti-spam kicks in.
    pub group_messages_per_minute: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            per_command: 5,
            window: Duration::from_secs(60),
            group_messages_per_minute: 15,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct XpConfig {
    pub message: u64,
    pub command: u64,
}

impl Default for XpConfig {
    fn default() -> Self {
        XpConfig {
            message: 1,
            command: 5,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModerationConfig {
    /// Warnings before a member is removed from the group.
    pub max_warnings: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        ModerationConfig { max_warnings: 3 }
    }
}

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub image_model: String,
    pub system_prompt: String,
    /// Turns of history kept per user.
    pub max_history: usize,
    /// Idle conversations are dropped after this long.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "conversation_ttl_secs")]
    pub conversation_ttl: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            model: "gpt-4o-mini".to_owned(),
            image_model: "dall-e-3".to_owned(),
            system_prompt: "You are a helpful assistant in a WhatsApp chat. Keep answers short."
                .to_owned(),
            max_history: 10,
            conversation_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl Config {
    /// Fetches the config from the config file.
    pub fn create_from_file(config_path: impl AsRef<Path>) -> Result<Config> {
        let file = std::fs::read_to_string(config_path).wrap_err("Could not read config file")?;

        let config: Config = toml::from_str(&file).wrap_err("Could not parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make the bot misbehave rather than fail.
    pub fn validate(&self) -> Result<()> {
        validate_prefix(&self.prefix)
    }

    /// Reloads the config file and updates the configuration.
    ///
    /// A file that no longer parses or validates leaves the current config in place.
    pub fn reload(&mut self, config_path: impl AsRef<Path>) {
        match Config::create_from_file(config_path) {
            Ok(config) => *self = config,
            Err(e) => tracing::warn!("keeping previous config: {e:?}"),
        }
    }

    pub fn save(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let toml = toml::to_string(&self).wrap_err("Could not serialize config")?;

        std::fs::write(config_path, toml).wrap_err("Could not save config")
    }
}

/// A prefix must be non-empty and a single word, or every message would look like a command.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    ensure!(!prefix.is_empty(), "prefix must not be empty");
    ensure!(
        !prefix.chars().any(char::is_whitespace),
        "prefix must not contain whitespace"
    );
    Ok(())
}

/// API keys and the webhook secret. Never written back to disk.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub weather_api_key: Option<String>,
    pub bridge_secret: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Secrets {
        let var = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());

        Secrets {
            openai_api_key: var("OPENAI_API_KEY"),
            weather_api_key: var("OPENWEATHER_API_KEY"),
            bridge_secret: var("BRIDGE_SECRET"),
        }
    }
}
