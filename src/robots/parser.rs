//! Robots.txt parser implementation
//!
//! Turns robots.txt text into a `RobotsPolicy` for one crawler agent and one
//! search path. Per-URL checks for detail pages go through the robotstxt
//! crate's matcher against the retained rule text.

use robotstxt::DefaultMatcher;

/// Crawl delay substituted when robots.txt cannot be loaded (milliseconds)
pub const DEFAULT_CRAWL_DELAY_MS: u64 = 2_000;

/// Structured crawl policy for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotsPolicy {
    /// Whether the search endpoint may be crawled at all
    pub allowed_for_search: bool,

    /// Minimum delay between two requests to the source (milliseconds)
    pub crawl_delay_ms: u64,

    /// Disallow paths from every group that applies to this agent
    pub disallowed_paths: Vec<String>,

    /// Raw robots.txt content (empty for the default policy)
    content: String,

    /// Agent name the policy was computed for
    user_agent: String,
}

impl RobotsPolicy {
    /// Parses robots.txt content for the given agent and search path
    ///
    /// # Parsing Rules
    ///
    /// - A group applies when one of its `User-agent` lines is `*` or is
    ///   contained in the agent name (case-insensitive)
    /// - `Disallow` values from applicable groups are collected; empty values
    ///   mean "allow everything" and are skipped
    /// - The largest `Crawl-delay` from applicable groups wins, floored at
    ///   `min_delay_ms`; with no delay declared the floor applies
    /// - The search path is denied when it and any disallowed path are
    ///   prefixes of one another
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    /// * `user_agent` - The crawler's declared agent name
    /// * `search_path` - Path of the search endpoint (e.g., "/search")
    /// * `min_delay_ms` - Floor for the crawl delay
    pub fn parse(content: &str, user_agent: &str, search_path: &str, min_delay_ms: u64) -> Self {
        let agent = user_agent.to_lowercase();

        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut disallowed_paths: Vec<String> = Vec::new();
        let mut max_delay_secs: Option<f64> = None;

        for line in content.lines() {
            // Strip trailing comments
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A User-agent line after rules starts a new group
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "disallow" | "allow" | "crawl-delay" => {
                    in_rules = true;

                    let applies = group_agents
                        .iter()
                        .any(|ua| ua == "*" || (!ua.is_empty() && agent.contains(ua.as_str())));
                    if !applies {
                        continue;
                    }

                    if key == "disallow" && !value.is_empty() {
                        if !disallowed_paths.iter().any(|p| p == value) {
                            disallowed_paths.push(value.to_string());
                        }
                    } else if key == "crawl-delay" {
                        if let Ok(delay) = value.parse::<f64>() {
                            if delay.is_finite() && delay >= 0.0 {
                                max_delay_secs = Some(max_delay_secs.map_or(delay, |d| d.max(delay)));
                            }
                        }
                    }
                }
                _ => {
                    // Sitemap and unknown directives don't affect the policy
                }
            }
        }

        let declared_ms = max_delay_secs.map_or(0, |secs| (secs * 1000.0).round() as u64);
        let allowed_for_search = !disallowed_paths
            .iter()
            .any(|path| rule_covers_search(path, search_path));

        Self {
            allowed_for_search,
            crawl_delay_ms: declared_ms.max(min_delay_ms),
            disallowed_paths,
            content: content.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    /// Conservative policy used when robots.txt cannot be loaded
    pub fn default_policy(user_agent: &str) -> Self {
        Self {
            allowed_for_search: true,
            crawl_delay_ms: DEFAULT_CRAWL_DELAY_MS,
            disallowed_paths: Vec::new(),
            content: String::new(),
            user_agent: user_agent.to_string(),
        }
    }

    /// Checks whether a specific URL may be fetched
    ///
    /// Used for item detail pages discovered from listings.
    pub fn is_allowed(&self, url: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.user_agent, url)
    }

    /// Returns the crawl delay as a `Duration`
    pub fn crawl_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.crawl_delay_ms)
    }
}

/// True when a Disallow rule blocks the search endpoint
///
/// The rule either prefixes the search path or names it as a directory
/// (`/search/` blocks `/search`). Longer paths that merely share the prefix,
/// such as `/search-history` or `/search?sort=`, do not.
fn rule_covers_search(disallowed: &str, search_path: &str) -> bool {
    let disallowed = disallowed.trim_end_matches('*');
    search_path.starts_with(disallowed) || disallowed.trim_end_matches('/') == search_path
}
