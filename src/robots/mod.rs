//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching
//! robots.txt files, and the gate the crawler consults before admitting a URL.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRuleset;

use crate::url::origin_key;
use crate::QuarryError;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Fetches and parses robots.txt from `robots_url`
///
/// Any non-success response or network error yields a permissive ruleset; a
/// site without robots.txt places no restrictions on the crawler.
pub async fn fetch_robots(client: &Client, robots_url: &Url, user_agent: &str) -> RobotsRuleset {
    let response = match client.get(robots_url.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt fetch failed for {}: {}", robots_url, e);
            return RobotsRuleset::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} returned HTTP {}, allowing all",
            robots_url,
            response.status().as_u16()
        );
        return RobotsRuleset::allow_all();
    }

    match response.text().await {
        Ok(body) => RobotsRuleset::parse(&body, user_agent),
        Err(e) => {
            tracing::debug!("Failed to read robots.txt body from {}: {}", robots_url, e);
            RobotsRuleset::allow_all()
        }
    }
}

/// Robots compliance gate for one crawl session
///
/// Owns its cache, so two crawls never share robots state. Bypassing the gate
/// is an explicit opt-out chosen by the caller.
pub struct RobotsGate {
    client: Client,
    user_agent: String,
    cache: RobotsCache,
    enabled: bool,
}

impl RobotsGate {
    /// Creates a gate that enforces robots.txt
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            cache: RobotsCache::new(),
            enabled: true,
        }
    }

    /// Creates a gate that allows everything and never fetches robots.txt
    pub fn bypassed(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(client, user_agent)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the rules for `url`'s origin, fetching them on first request
    ///
    /// # Returns
    ///
    /// * `Ok(rules)` - Cached or freshly fetched rules (permissive on fetch failure)
    /// * `Err(QuarryError)` - The robots.txt URL could not be built
    pub async fn fetch(&mut self, url: &Url) -> Result<Arc<RobotsRuleset>, QuarryError> {
        let origin = origin_key(url);
        if let Some(rules) = self.cache.get(&origin) {
            tracing::trace!("Using cached robots.txt for {}", origin);
            return Ok(rules);
        }

        if !self.enabled {
            return Ok(self.cache.insert(&origin, RobotsRuleset::allow_all()));
        }

        let robots_url = Url::parse(&format!("{}/robots.txt", origin))?;
        tracing::debug!("Fetching robots.txt: {}", robots_url);
        let rules = fetch_robots(&self.client, &robots_url, &self.user_agent).await;

        if rules.exists() {
            tracing::info!(
                "robots.txt for {}: {} disallow rule(s), crawl-delay {:?}",
                origin,
                rules.disallowed().len(),
                rules.crawl_delay_ms()
            );
        } else {
            tracing::info!("No usable robots.txt for {}, allowing all", origin);
        }

        Ok(self.cache.insert(&origin, rules))
    }
}
