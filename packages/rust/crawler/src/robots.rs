//! robots.txt parsing and the permission gate consulted before discovery requests.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::fetch::Fetcher;

/// Longest crawl-delay honoured, in seconds. Larger values are clamped.
const MAX_CRAWL_DELAY_SECS: f64 = 60.0;

/// One Allow/Disallow line.
#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    matcher: Regex,
    allow: bool,
}

impl Rule {
    fn new(pattern: &str, allow: bool) -> Option<Self> {
        Some(Self {
            pattern: pattern.to_string(),
            matcher: rule_to_regex(pattern)?,
            allow,
        })
    }
}

/// `*` matches any run of characters; a trailing `$` anchors the end.
fn rule_to_regex(pattern: &str) -> Option<Regex> {
    let (body, anchored) = match pattern.strip_suffix('$') {
        Some(body) => (body, true),
        None => (pattern, false),
    };
    let escaped = regex::escape(body).replace(r"\*", ".*");
    let suffix = if anchored { "$" } else { "" };
    Regex::new(&format!("^{escaped}{suffix}")).ok()
}

/// Rules shared by one or more consecutive `User-agent` lines.
#[derive(Debug, Clone, Default)]
struct AgentGroup {
    rules: Vec<Rule>,
    crawl_delay: Option<f64>,
}

/// Parsed robots.txt.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Groups keyed by lowercase agent token.
    groups: HashMap<String, AgentGroup>,
    sitemaps: Vec<String>,
}

impl RobotsPolicy {
    /// Parse robots.txt content. Unknown directives and malformed lines are ignored.
    pub fn parse(content: &str) -> Self {
        let mut policy = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current = AgentGroup::default();
        // A User-agent line after rules starts a new group.
        let mut saw_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if saw_rules {
                        policy.flush(&mut current_agents, std::mem::take(&mut current));
                        saw_rules = false;
                    }
                    current_agents.push(value.to_ascii_lowercase());
                }
                "allow" | "disallow" => {
                    saw_rules = true;
                    // An empty Disallow allows everything.
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(rule) = Rule::new(value, directive == "allow") {
                        current.rules.push(rule);
                    }
                }
                "crawl-delay" => {
                    saw_rules = true;
                    match value.parse::<f64>() {
                        Ok(delay) if delay.is_finite() && delay >= 0.0 => {
                            if delay > MAX_CRAWL_DELAY_SECS {
                                warn!(
                                    delay,
                                    max = MAX_CRAWL_DELAY_SECS,
                                    "crawl-delay out of range, clamping"
                                );
                            }
                            current.crawl_delay = Some(delay.min(MAX_CRAWL_DELAY_SECS));
                        }
                        _ => debug!(value, "ignoring malformed crawl-delay"),
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        policy.sitemaps.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        policy.flush(&mut current_agents, current);
        policy
    }

    fn flush(&mut self, agents: &mut Vec<String>, group: AgentGroup) {
        for agent in agents.drain(..) {
            let entry = self.groups.entry(agent).or_default();
            entry.rules.extend(group.rules.iter().cloned());
            if group.crawl_delay.is_some() {
                entry.crawl_delay = group.crawl_delay;
            }
        }
    }

    /// The most specific group whose token appears in `user_agent`, else `*`.
    fn group_for(&self, user_agent: &str) -> Option<&AgentGroup> {
        let agent = user_agent.to_ascii_lowercase();
        self.groups
            .iter()
            .filter(|(token, _)| {
                !token.is_empty() && token.as_str() != "*" && agent.contains(token.as_str())
            })
            .max_by_key(|(token, _)| token.len())
            .map(|(_, group)| group)
            .or_else(|| self.groups.get("*"))
    }

    /// Whether `path` may be fetched. Longest matching rule wins; Allow wins ties.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        let mut best: Option<&Rule> = None;
        for rule in group.rules.iter().filter(|r| r.matcher.is_match(path)) {
            best = match best {
                None => Some(rule),
                Some(current) if rule.pattern.len() > current.pattern.len() => Some(rule),
                Some(current)
                    if rule.pattern.len() == current.pattern.len() && rule.allow =>
                {
                    Some(rule)
                }
                keep => keep,
            };
        }

        best.is_none_or(|r| r.allow)
    }

    /// Crawl-delay hint for `user_agent`.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent)
            .and_then(|g| g.crawl_delay)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Sitemap URLs declared anywhere in the file.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Per-site permission check. Built once per base URL.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    policy: Option<RobotsPolicy>,
    user_agent: String,
}

impl PermissionGate {
    /// A gate that permits everything.
    pub fn allow_all(user_agent: &str) -> Self {
        Self {
            policy: None,
            user_agent: user_agent.to_string(),
        }
    }

    /// Gate over an already-parsed policy.
    pub fn from_policy(policy: RobotsPolicy, user_agent: &str) -> Self {
        Self {
            policy: Some(policy),
            user_agent: user_agent.to_string(),
        }
    }

    /// Fetch `/robots.txt` for `base_url`. Any failure yields an allow-all gate.
    pub async fn fetch(fetcher: &dyn Fetcher, base_url: &Url, user_agent: &str) -> Self {
        let robots_url = match base_url.join("/robots.txt") {
            Ok(url) => url,
            Err(e) => {
                warn!(%base_url, error = %e, "cannot build robots.txt URL, allowing all");
                return Self::allow_all(user_agent);
            }
        };

        match fetcher.get(&robots_url).await {
            Ok(response) if response.is_success() => {
                debug!(url = %robots_url, "robots.txt loaded");
                Self::from_policy(RobotsPolicy::parse(&response.body), user_agent)
            }
            Ok(response) => {
                debug!(url = %robots_url, status = response.status, "no robots.txt, allowing all");
                Self::allow_all(user_agent)
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt fetch failed, allowing all");
                Self::allow_all(user_agent)
            }
        }
    }

    /// Whether `url` may be requested.
    pub fn allows(&self, url: &Url) -> bool {
        let Some(policy) = &self.policy else {
            return true;
        };
        let target = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        };
        policy.is_allowed(&self.user_agent, &target)
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        self.policy
            .as_ref()
            .and_then(|p| p.crawl_delay(&self.user_agent))
    }

    pub fn sitemaps(&self) -> &[String] {
        self.policy.as_ref().map(|p| p.sitemaps()).unwrap_or(&[])
    }
}
