//! Configuration module
//!
//! Connection settings for the remote PLM server and tuning knobs for the
//! upload/commit coordinator, loaded from the environment (and `.env`).

use std::env;
use std::time::Duration;

// Common constants
const REQUEST_TIMEOUT_SECS: u64 = 60;
const COMMIT_QUIET_PERIOD_MS: u64 = 1000;
const COMMIT_MAX_WAIT_MS: u64 = 10_000;
const COMMIT_MAX_ATTEMPTS: u32 = 3;
const COMMIT_RETRY_BACKOFF_MS: u64 = 500;

/// Remote server connection settings
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Raw `Cookie` header of an authenticated session.
    pub session_cookie: Option<String>,
    pub bearer_token: Option<String>,
}

/// Upload/commit coordinator settings
#[derive(Clone, Debug)]
pub struct CommitConfig {
    /// Quiet period of the commit debounce.
    pub quiet_period_ms: u64,
    /// Longest a queued commit waits while uploads keep finishing.
    pub max_wait_ms: u64,
    /// Attempts per commit batch, first call included.
    pub max_attempts: u32,
    /// Delay before the first commit retry; doubles per retry.
    pub retry_backoff_ms: u64,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: COMMIT_QUIET_PERIOD_MS,
            max_wait_ms: COMMIT_MAX_WAIT_MS,
            max_attempts: COMMIT_MAX_ATTEMPTS,
            retry_backoff_ms: COMMIT_RETRY_BACKOFF_MS,
        }
    }
}

impl CommitConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub client: ClientConfig,
    pub commit: CommitConfig,
    /// Overrides the server's create-document-on-drop preference.
    pub create_doc_preference: Option<String>,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_source(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup. Does not validate.
    pub fn from_source<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = get("ENVIRONMENT")
            .or_else(|| get("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let base_url = get("PLM_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow::anyhow!("PLM_BASE_URL must be set"))?;

        let client = ClientConfig {
            base_url,
            request_timeout_secs: parse_or(&get, "PLM_REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS),
            session_cookie: get("PLM_SESSION_COOKIE").filter(|s| !s.trim().is_empty()),
            bearer_token: get("PLM_BEARER_TOKEN").filter(|s| !s.trim().is_empty()),
        };

        let commit = CommitConfig {
            quiet_period_ms: parse_or(&get, "PLM_COMMIT_QUIET_PERIOD_MS", COMMIT_QUIET_PERIOD_MS),
            max_wait_ms: parse_or(&get, "PLM_COMMIT_MAX_WAIT_MS", COMMIT_MAX_WAIT_MS),
            max_attempts: parse_or(&get, "PLM_COMMIT_MAX_ATTEMPTS", COMMIT_MAX_ATTEMPTS),
            retry_backoff_ms: parse_or(&get, "PLM_COMMIT_RETRY_BACKOFF_MS", COMMIT_RETRY_BACKOFF_MS),
        };

        Ok(Config {
            environment,
            client,
            commit,
            create_doc_preference: get("PLM_CREATE_DOC_PREFERENCE"),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let url = &self.client.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "PLM_BASE_URL must start with http:// or https://"
            ));
        }

        if self.is_production() && !url.starts_with("https://") {
            return Err(anyhow::anyhow!("PLM_BASE_URL must use https in production"));
        }

        if self.commit.quiet_period_ms == 0 {
            return Err(anyhow::anyhow!(
                "PLM_COMMIT_QUIET_PERIOD_MS must be greater than 0"
            ));
        }

        if self.commit.quiet_period_ms > self.commit.max_wait_ms {
            return Err(anyhow::anyhow!(
                "PLM_COMMIT_QUIET_PERIOD_MS must not exceed PLM_COMMIT_MAX_WAIT_MS"
            ));
        }

        if self.commit.max_attempts == 0 {
            return Err(anyhow::anyhow!("PLM_COMMIT_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.client.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs)
    }

    pub fn session_cookie(&self) -> Option<&str> {
        self.client.session_cookie.as_deref()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.client.bearer_token.as_deref()
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
