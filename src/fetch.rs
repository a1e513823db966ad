//! Outbound HTTP with a single process-wide request interval.
//!
//! Every call to the documentation host or the registry goes through one
//! [`RateLimiter`], so the crates.io crawler policy is honoured regardless of
//! which component issues the request.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::FetchError;

pub trait Fetch {
    /// Fetches `url` and returns the body as text.
    fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;

    /// Fetches `url` and returns the raw body.
    fn fetch_file(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Blocks until `min_interval` has passed since the previous call, then
    /// records the current instant as the new watermark.
    pub fn wait(&self) {
        let mut last_call = match self.last_call.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                tracing::info!(
                    seconds = remaining.as_secs_f64(),
                    "sleeping to satisfy registry rate limit"
                );
                std::thread::sleep(remaining);
            }
        }

        *last_call = Some(Instant::now());
    }
}

#[derive(Debug)]
pub struct RateLimitedFetcher {
    client: Client,
    limiter: RateLimiter,
}

impl RateLimitedFetcher {
    pub fn new(user_agent: &str, min_interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, min_interval))
    }

    pub fn with_client(client: Client, min_interval: Duration) -> Self {
        Self {
            client,
            limiter: RateLimiter::new(min_interval),
        }
    }

    fn get(&self, url: &str) -> std::result::Result<Response, FetchError> {
        self.limiter.wait();
        tracing::info!(url, "fetching");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Fetch for RateLimitedFetcher {
    fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        self.get(url)?.text().map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }

    fn fetch_file(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let bytes = self.get(url)?.bytes().map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}
