/// Account configuration
use crate::delivery::DeliveryMode;
use crate::error::{BirdfeedError, Result};
use crate::format::StripPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://twitter.com";
const USAGE_ARGS: &str = "<handle> <secret> [--config <path>] [--base-url <url>] [--direct] [--strip-html always|auto|never] [--poll-secs <n>] [--no-friends]";

/// Settings for one account connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Remote account handle (also the local identity in group chats)
    pub handle: String,

    /// Account secret for basic auth
    pub secret: String,

    /// API root, without trailing slash
    pub base_url: String,

    /// Deliver timeline into one shared conversation instead of private messages
    pub use_groupchat: bool,

    /// Markup stripping policy
    pub strip_html: StripPolicy,

    /// Home timeline polling period
    pub poll_interval: Duration,

    /// Per-request timeout handed to the transport
    pub request_timeout: Duration,

    /// Fetch the full friend listing right after login
    pub fetch_friends_on_login: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            handle: String::new(),
            secret: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            use_groupchat: true,
            strip_html: StripPolicy::Auto,
            poll_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(20),
            fetch_friends_on_login: true,
        }
    }
}

impl AccountConfig {
    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.use_groupchat {
            DeliveryMode::Grouped
        } else {
            DeliveryMode::Direct
        }
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(BirdfeedError::Io)?;
        let config: Self = serde_json::from_str(&raw).map_err(BirdfeedError::Serialization)?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(BirdfeedError::Serialization)?;
        fs::write(path, json).map_err(BirdfeedError::Io)?;
        Ok(())
    }

    /// Create config from command line arguments, then apply env overrides
    pub fn from_args(args: &[String]) -> Result<Self> {
        let bin = args.first().map(|s| s.as_str()).unwrap_or("birdfeed");

        // --config is applied first so the remaining flags override the file
        let mut config = match args.iter().position(|a| a == "--config") {
            Some(i) => {
                let path = args.get(i + 1).ok_or_else(|| {
                    BirdfeedError::Config("--config requires a path argument".to_string())
                })?;
                Self::load(Path::new(path))?
            }
            None => Self::default(),
        };

        let mut positional = Vec::new();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" => {
                    i += 2;
                }
                "--base-url" => {
                    let url = args.get(i + 1).ok_or_else(|| {
                        BirdfeedError::Config("--base-url requires a url argument".to_string())
                    })?;
                    config.base_url = url.trim_end_matches('/').to_string();
                    i += 2;
                }
                "--direct" => {
                    config.use_groupchat = false;
                    i += 1;
                }
                "--strip-html" => {
                    let mode = args.get(i + 1).ok_or_else(|| {
                        BirdfeedError::Config("--strip-html requires a mode argument".to_string())
                    })?;
                    config.strip_html = mode.parse().map_err(BirdfeedError::Config)?;
                    i += 2;
                }
                "--poll-secs" => {
                    let secs = args.get(i + 1).ok_or_else(|| {
                        BirdfeedError::Config("--poll-secs requires a number".to_string())
                    })?;
                    config.poll_interval = parse_poll_secs(secs)?;
                    i += 2;
                }
                "--no-friends" => {
                    config.fetch_friends_on_login = false;
                    i += 1;
                }
                other if other.starts_with("--") => {
                    return Err(BirdfeedError::Config(format!(
                        "Unknown option {}. Usage: {} {}",
                        other, bin, USAGE_ARGS
                    )));
                }
                other => {
                    positional.push(other.to_string());
                    i += 1;
                }
            }
        }

        match positional.as_slice() {
            [handle, secret] => {
                config.handle = handle.clone();
                config.secret = secret.clone();
            }
            [] if !config.handle.is_empty() => {}
            _ => {
                return Err(BirdfeedError::Config(format!("Usage: {} {}", bin, USAGE_ARGS)));
            }
        }

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Env overrides (nice for scripts)
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("BIRDFEED_BASE_URL") {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(secs) = std::env::var("BIRDFEED_POLL_SECS") {
            self.poll_interval = parse_poll_secs(&secs)?;
        }
        if let Ok(mode) = std::env::var("BIRDFEED_STRIP_HTML") {
            self.strip_html = mode.parse().map_err(BirdfeedError::Config)?;
        }
        if let Ok(direct) = std::env::var("BIRDFEED_DIRECT") {
            self.use_groupchat = !parse_flag("BIRDFEED_DIRECT", &direct)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.handle.is_empty() {
            return Err(BirdfeedError::Config("handle must not be empty".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(BirdfeedError::Config(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(BirdfeedError::Config("poll interval must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BirdfeedError::Config(format!("{} must be true or false, got {}", name, other))),
    }
}

fn parse_poll_secs(s: &str) -> Result<Duration> {
    let secs = s
        .trim()
        .parse::<u64>()
        .map_err(|_| BirdfeedError::Config("--poll-secs must be a whole number of seconds".to_string()))?;
    Ok(Duration::from_secs(secs))
}
