use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::config::FetcherConfig;
use crate::error::AppError;

/// Query parameters stripped during URL normalization. Everything else is
/// assumed site-essential and kept.
const TRACKING_PARAMS: [&str; 9] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "tag",
];

const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Round-robin pool of browser user agents shared across concurrent fetches.
/// Rotation is last-writer-wins; contention only affects which agent goes out
/// next, never the pool itself.
pub struct UserAgentPool {
    agents: Vec<String>,
    index: AtomicUsize,
}

impl UserAgentPool {
    pub fn new(agents: Vec<String>) -> Self {
        let agents = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
        } else {
            agents
        };
        Self {
            agents,
            index: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> &str {
        let index = self.index.load(Ordering::Relaxed) % self.agents.len();
        &self.agents[index]
    }

    pub fn rotate(&self) -> &str {
        let index = self.index.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % self.agents.len();
        &self.agents[index]
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Validate and normalize a URL before any network call. Tracking parameters
/// are stripped; invalid URLs are a `Validation` error, never retried.
pub fn normalize_url(raw: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(raw)
        .map_err(|e| AppError::Validation(format!("invalid URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::Validation(format!(
                "unsupported URL scheme '{}' in '{}'",
                other, raw
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(AppError::Validation(format!("URL '{}' has no host", raw)));
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        drop(pairs);
    }

    Ok(url)
}

/// Performs one resilient HTTP GET: politeness delay plus jitter before each
/// attempt, exponential backoff on failure, rate-limit cooldown on 429 and
/// user-agent rotation on 403.
pub struct Fetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    agents: Arc<UserAgentPool>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig, agents: Arc<UserAgentPool>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            config,
            agents,
        })
    }

    /// Fetch the raw body text of `url`. Exhausting all attempts yields
    /// `FetchExhausted`; callers treat that as "no data" and move on.
    pub async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let url = normalize_url(url)?;
        let mut last_error = String::new();

        for attempt in 0..self.config.max_attempts {
            self.politeness_pause().await;

            match self.attempt(url.as_str()).await {
                Ok(body) => return Ok(body),
                Err(AttemptError::RateLimited) => {
                    last_error = "HTTP 429 Too Many Requests".to_string();
                    let cooldown = 2u64.pow(attempt) * self.config.base_backoff_secs;
                    warn!(url = %url, attempt, cooldown_secs = cooldown, "rate limited, cooling down");
                    if attempt + 1 < self.config.max_attempts {
                        tokio::time::sleep(Duration::from_secs(cooldown)).await;
                    }
                }
                Err(AttemptError::Forbidden) => {
                    last_error = "HTTP 403 Forbidden".to_string();
                    let next = self.agents.rotate();
                    debug!(url = %url, attempt, user_agent = next, "forbidden, rotating user agent");
                }
                Err(AttemptError::Other(message)) => {
                    last_error = message;
                    debug!(url = %url, attempt, error = %last_error, "fetch attempt failed");
                    if attempt + 1 < self.config.max_attempts {
                        tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    }
                }
            }
        }

        Err(AppError::FetchExhausted {
            url: url.to_string(),
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    async fn attempt(&self, url: &str) -> Result<String, AttemptError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", self.agents.current())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| AttemptError::Other(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(AttemptError::RateLimited),
            StatusCode::FORBIDDEN => Err(AttemptError::Forbidden),
            status if status.is_success() => response
                .text()
                .await
                .map_err(|e| AttemptError::Other(e.to_string())),
            status => Err(AttemptError::Other(format!("HTTP {}", status))),
        }
    }

    async fn politeness_pause(&self) {
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        let pause = self.config.politeness_delay_ms + jitter;
        if pause > 0 {
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }
}

enum AttemptError {
    RateLimited,
    Forbidden,
    Other(String),
}
