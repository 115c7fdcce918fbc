use std::{str::FromStr, time::Duration};

use anyhow::Context;

use crate::{
    chat::{ContentPolicy, RateLimitConfig},
    middleware::ApiLimitConfig,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    /// CORS origin; any origin when unset.
    pub client_origin: Option<String>,
    pub rate_limit: RateLimitConfig,
    pub content: ContentPolicy,
    /// Per-IP budget for routes under `/api`.
    pub api_limit: ApiLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_owned(),
            database_url: "sqlite://strangers.db?mode=rwc".to_owned(),
            client_origin: None,
            rate_limit: RateLimitConfig::default(),
            content: ContentPolicy::default(),
            api_limit: ApiLimitConfig::default(),
        }
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Config::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let defaults = Config::default();

        fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
        where
            T: FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match lookup(key) {
                Some(raw) => raw.trim().parse().with_context(|| format!("{key}={raw:?}")),
                None => Ok(default),
            }
        }

        let window_secs = parsed(&lookup, "RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window.as_secs())?;
        if window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be at least 1");
        }

        let api_window_secs = parsed(&lookup, "API_RATE_LIMIT_WINDOW_SECS", defaults.api_limit.window.as_secs())?;
        let api_max = parsed(&lookup, "API_RATE_LIMIT_MAX", defaults.api_limit.max_requests)?;
        if api_window_secs == 0 || api_max == 0 {
            anyhow::bail!("API_RATE_LIMIT_MAX and API_RATE_LIMIT_WINDOW_SECS must be at least 1");
        }

        Ok(Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            client_origin: lookup("CLIENT_ORIGIN").filter(|o| !o.trim().is_empty()),
            rate_limit: RateLimitConfig {
                max_messages: parsed(&lookup, "RATE_LIMIT_MAX", defaults.rate_limit.max_messages)?,
                window: Duration::from_secs(window_secs),
            },
            content: ContentPolicy {
                max_text_chars: parsed(&lookup, "MAX_MESSAGE_CHARS", defaults.content.max_text_chars)?,
                max_image_bytes: parsed(&lookup, "MAX_IMAGE_BYTES", defaults.content.max_image_bytes)?,
            },
            api_limit: ApiLimitConfig {
                max_requests: api_max,
                window: Duration::from_secs(api_window_secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        assert_eq!(config.rate_limit.max_messages, 30);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert!(config.client_origin.is_none());
        assert_eq!(config.api_limit.max_requests, 100);
        assert_eq!(config.api_limit.window, Duration::from_secs(900));
    }

    #[test]
    fn overrides() {
        let config = from_pairs(&[
            ("RATE_LIMIT_MAX", "5"),
            ("RATE_LIMIT_WINDOW_SECS", " 10 "),
            ("MAX_MESSAGE_CHARS", "200"),
            ("CLIENT_ORIGIN", "http://localhost:3000"),
            ("API_RATE_LIMIT_MAX", "20"),
        ])
        .unwrap();
        assert_eq!(config.rate_limit.max_messages, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(10));
        assert_eq!(config.content.max_text_chars, 200);
        assert_eq!(config.client_origin.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.api_limit.max_requests, 20);
    }

    #[test]
    fn bad_number_names_the_variable() {
        let err = from_pairs(&[("RATE_LIMIT_MAX", "lots")]).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_MAX"));
        assert!(from_pairs(&[("RATE_LIMIT_WINDOW_SECS", "0")]).is_err());
        assert!(from_pairs(&[("API_RATE_LIMIT_MAX", "0")]).is_err());
    }
}
