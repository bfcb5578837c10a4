//! Robots.txt parser implementation
//!
//! Line-oriented parsing of the directives the crawler honors: `User-agent`,
//! `Disallow` and `Crawl-delay`. Everything else (`Allow`, `Sitemap`, ...) is
//! ignored.

use regex::Regex;
use std::time::Duration;

/// A single `Disallow` rule
#[derive(Debug, Clone)]
enum DisallowRule {
    /// Plain path prefix
    Prefix(String),
    /// Pattern containing `*` or a trailing `$`, compiled to an anchored regex
    Pattern { source: String, regex: Regex },
}

impl DisallowRule {
    fn compile(value: &str) -> Option<Self> {
        if !value.contains('*') && !value.ends_with('$') {
            return Some(Self::Prefix(value.to_string()));
        }

        let (body, anchored_end) = match value.strip_suffix('$') {
            Some(body) => (body, true),
            None => (value, false),
        };

        let mut expr = String::from("^");
        for (i, part) in body.split('*').enumerate() {
            if i > 0 {
                expr.push_str(".*");
            }
            expr.push_str(&regex::escape(part));
        }
        if anchored_end {
            expr.push('$');
        }

        match Regex::new(&expr) {
            Ok(regex) => Some(Self::Pattern {
                source: value.to_string(),
                regex,
            }),
            Err(e) => {
                tracing::warn!("Ignoring unparseable robots.txt pattern {}: {}", value, e);
                None
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Pattern { regex, .. } => regex.is_match(path),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Prefix(prefix) => prefix,
            Self::Pattern { source, .. } => source,
        }
    }
}

/// Parsed robots.txt rules that apply to one user agent on one origin
///
/// Absence of a robots.txt (or a failed fetch) is modelled by
/// [`RobotsRuleset::allow_all`], which disallows nothing.
#[derive(Debug, Clone, Default)]
pub struct RobotsRuleset {
    disallow: Vec<DisallowRule>,
    crawl_delay_ms: Option<u64>,
    exists: bool,
}

impl RobotsRuleset {
    /// Creates a permissive ruleset that allows everything
    ///
    /// This is used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parses robots.txt content for the given user agent
    ///
    /// Consecutive `User-agent` lines form one group. `Disallow` and
    /// `Crawl-delay` lines are kept only while the current group matches
    /// `user_agent`: a `*` token matches everyone, otherwise the match is a
    /// case-insensitive substring/prefix comparison. When several matching
    /// groups declare a crawl delay, the largest one is kept.
    ///
    /// # Example
    ///
    /// ```
    /// use quarry::robots::RobotsRuleset;
    ///
    /// let robots = RobotsRuleset::parse("User-agent: *\nDisallow: /admin/", "quarry/0.1");
    /// assert!(!robots.is_allowed("/admin/secret"));
    /// assert!(robots.is_allowed("/public"));
    /// ```
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let agent = user_agent.to_lowercase();
        let product = agent.split('/').next().unwrap_or("").trim().to_string();

        let mut ruleset = Self {
            exists: true,
            ..Self::default()
        };

        let mut group_matches = false;
        let mut in_agent_lines = false;

        for line in content.lines() {
            // Strip comments
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            };
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A User-agent after other directives starts a new group
                    if !in_agent_lines {
                        group_matches = false;
                    }
                    in_agent_lines = true;
                    group_matches |= agent_matches(value, &agent, &product);
                }
                "disallow" => {
                    in_agent_lines = false;
                    if group_matches && !value.is_empty() {
                        if let Some(rule) = DisallowRule::compile(value) {
                            ruleset.disallow.push(rule);
                        }
                    }
                }
                "crawl-delay" => {
                    in_agent_lines = false;
                    if group_matches {
                        match value.parse::<f64>() {
                            Ok(secs) if secs.is_finite() && secs >= 0.0 => {
                                let ms = (secs * 1000.0).round() as u64;
                                ruleset.crawl_delay_ms =
                                    Some(ruleset.crawl_delay_ms.map_or(ms, |cur| cur.max(ms)));
                            }
                            _ => tracing::debug!("Ignoring invalid Crawl-delay value: {}", value),
                        }
                    }
                }
                _ => {
                    in_agent_lines = false;
                }
            }
        }

        ruleset
    }

    /// Returns whether a robots.txt was actually found and parsed
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Crawl delay in milliseconds, if the matching group declared one
    pub fn crawl_delay_ms(&self) -> Option<u64> {
        self.crawl_delay_ms
    }

    /// Crawl delay as a Duration
    pub fn crawl_delay(&self) -> Option<Duration> {
        self.crawl_delay_ms.map(Duration::from_millis)
    }

    /// Disallow patterns in file order
    pub fn disallowed(&self) -> Vec<&str> {
        self.disallow.iter().map(DisallowRule::as_str).collect()
    }

    /// Checks a path (optionally with `?query`) against the disallow rules
    pub fn is_allowed(&self, path: &str) -> bool {
        !self.disallow.iter().any(|rule| rule.matches(path))
    }

    /// Checks a full URL against the disallow rules
    pub fn is_url_allowed(&self, url: &url::Url) -> bool {
        match url.query() {
            Some(query) => self.is_allowed(&format!("{}?{}", url.path(), query)),
            None => self.is_allowed(url.path()),
        }
    }
}

fn agent_matches(token: &str, agent: &str, product: &str) -> bool {
    let token = token.trim().to_lowercase();
    if token.is_empty() {
        return false;
    }
    token == "*" || agent.contains(&token) || (!product.is_empty() && token.starts_with(product))
}
