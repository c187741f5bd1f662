use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use hearth_core::WaitPolicy;

pub struct HearthConfig {
    pub owner_id: i64,
    pub dev_mode: bool,
    pub game_name: String,
    pub telegram: TelegramConfig,
    pub instance: InstanceConfig,
    pub webhook: WebhookConfig,
    pub lock: Option<LockConfig>,
    pub log_format: LogFormat,
}

pub struct TelegramConfig {
    pub token: String,
    pub http_timeout: Duration,
}

pub struct InstanceConfig {
    pub region: String,
    pub instance_id: String,
    /// `None` when start/stop should not wait for the target state.
    pub wait: Option<WaitPolicy>,
}

#[derive(Clone)]
pub struct WebhookConfig {
    pub secret: String,
    pub listen_addr: SocketAddr,
    pub path: String,
    pub public_url: Option<String>,
}

pub struct LockConfig {
    pub redis_url: String,
    pub ttl: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl HearthConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let wait = if vars.flag("WAIT_FOR_TRANSITIONS", true)? {
            Some(WaitPolicy {
                poll_interval: Duration::from_secs(vars.parsed_or("WAIT_POLL_SECS", 5)?),
                timeout: Duration::from_secs(vars.parsed_or("WAIT_TIMEOUT_SECS", 300)?),
            })
        } else {
            None
        };

        let lock = match vars.optional("REDIS_URL") {
            Some(redis_url) => Some(LockConfig {
                redis_url,
                ttl: Duration::from_secs(vars.parsed_or("LOCK_TTL_SECS", 600)?),
            }),
            None => None,
        };
        // Release is a plain DEL: a lock expiring mid-wait could free someone else's.
        if let (Some(lock), Some(wait)) = (&lock, &wait) {
            if lock.ttl <= wait.timeout {
                return Err(format!(
                    "LOCK_TTL_SECS ({}) must be greater than WAIT_TIMEOUT_SECS ({})",
                    lock.ttl.as_secs(),
                    wait.timeout.as_secs()
                ));
            }
        }

        Ok(HearthConfig {
            owner_id: vars.parsed("OWNER_ID")?,
            dev_mode: vars.flag("DEV", false)?,
            game_name: vars.or("GAME_NAME", "Valheim"),
            telegram: TelegramConfig {
                token: vars.required("TELEGRAM_TOKEN")?,
                http_timeout: Duration::from_secs(vars.parsed_or("HTTP_TIMEOUT_SECS", 30)?),
            },
            instance: InstanceConfig {
                region: vars.required("REGION")?,
                instance_id: vars.required("INSTANCE_ID")?,
                wait,
            },
            webhook: WebhookConfig {
                secret: vars.required("SECRET_API_KEY")?,
                listen_addr: vars.parsed_or("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
                path: vars.or("WEBHOOK_PATH", "/webhook"),
                public_url: vars.optional("WEBHOOK_URL"),
            },
            lock,
            log_format: match vars.or("LOG_FORMAT", "text").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => return Err(format!("LOG_FORMAT must be 'text' or 'json', got '{other}'")),
            },
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, var_name: &str) -> Option<String> {
        (self.lookup)(var_name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, var_name: &str) -> Result<String, String> {
        self.optional(var_name)
            .ok_or_else(|| format!("Unable to find {var_name} in env"))
    }

    fn or(&self, var_name: &str, default: &str) -> String {
        self.optional(var_name).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T>(&self, var_name: &str) -> Result<T, String>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(var_name)?;
        parse(var_name, &raw)
    }

    fn parsed_or<T>(&self, var_name: &str, default: T) -> Result<T, String>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(var_name) {
            Some(raw) => parse(var_name, &raw),
            None => Ok(default),
        }
    }

    fn flag(&self, var_name: &str, default: bool) -> Result<bool, String> {
        match self.optional(var_name).map(|v| v.trim().to_lowercase()) {
            None => Ok(default),
            Some(v) if v == "1" || v == "true" => Ok(true),
            Some(v) if v == "0" || v == "false" => Ok(false),
            Some(v) => Err(format!("{var_name} must be 0/1/true/false, got '{v}'")),
        }
    }
}

fn parse<T>(var_name: &str, raw: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    T::from_str(raw.trim()).map_err(|e| format!("{var_name} is not valid ('{raw}'): {e}"))
}
