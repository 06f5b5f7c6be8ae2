use std::collections::HashMap;

#[cfg(feature = "async")]
use futures_util::io::{self, AsyncRead, AsyncReadExt};
use serde_derive::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::error::Error;
use super::matcher::{format_user_agent, Rule, RuleSet};
use super::parse;
use super::pattern::normalize_encoding;

const WILDCARD_AGENT: &str = "*";

/// A parsed robots.txt file.
///
/// All the rules are read once when the file is parsed. Afterwards every
/// query is a lookup against that table, so a `Robots` can be shared between
/// threads freely as long as nobody is adding rules to it at the same time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Robots {
    base: Option<Url>,
    rules: HashMap<String, RuleSet>,
    sitemaps: Vec<String>,
    preferred_host: Option<String>,
}

impl Robots {
    /// Parse `contents`, the robots.txt file found at `url`.
    ///
    /// If `url` can't be parsed the file is still read, but no URL will ever
    /// be considered covered by it.
    pub fn new(url: &str, contents: &str) -> Self {
        let base = match Url::parse(url) {
            Ok(base) => Some(base),
            Err(err) => {
                warn!(url, %err, "robots.txt url is not valid");
                None
            }
        };

        let mut robots = Self {
            base,
            ..Self::default()
        };
        parse::parse(&mut robots, contents);
        robots
    }

    /// Read a robots.txt file from `reader` and parse it. Bytes that are not
    /// valid UTF-8 are replaced rather than rejected.
    #[cfg(feature = "async")]
    pub async fn from_reader<R: AsyncRead + Unpin>(url: &str, mut reader: R) -> io::Result<Self> {
        let mut buf = vec![];
        reader.read_to_end(&mut buf).await?;
        Ok(Self::new(url, &String::from_utf8_lossy(&buf)))
    }

    /// Add an Allow (`allow == true`) or Disallow rule for `user_agent`.
    ///
    /// Empty user agents are ignored. An empty pattern adds no rule but still
    /// gives the agent a group of its own, so it stops falling back to `*`.
    pub fn add_rule(&mut self, user_agent: &str, pattern: &str, allow: bool, line_number: usize) {
        let agent = format_user_agent(user_agent);
        if agent.is_empty() {
            return;
        }
        let rule_set = self.rules.entry(agent).or_default();
        if !pattern.is_empty() {
            rule_set.push(Rule::new(pattern, allow, line_number));
        }
    }

    /// Set the crawl delay for `user_agent`, replacing any earlier value.
    pub fn set_crawl_delay(&mut self, user_agent: &str, delay: u64) {
        let agent = format_user_agent(user_agent);
        if agent.is_empty() {
            return;
        }
        self.rules.entry(agent).or_default().set_crawl_delay(delay);
    }

    pub fn add_sitemap(&mut self, url: &str) {
        if !url.is_empty() {
            self.sitemaps.push(url.to_string());
        }
    }

    /// Record the host named by a `Host` directive. The last one wins.
    pub fn set_preferred_host(&mut self, host: &str) {
        if !host.is_empty() {
            self.preferred_host = Some(host.to_lowercase());
        }
    }

    /// Whether `user_agent` may crawl `url`.
    ///
    /// Returns `None` when `url` doesn't belong to this robots.txt (another
    /// scheme, host or port) or can't be parsed. That is not the same as
    /// being disallowed; the file simply has nothing to say about it.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> Option<bool> {
        let rule = self.matching_rule(url, user_agent).ok()?;
        Some(rule.map_or(true, Rule::allow))
    }

    /// The negation of [`is_allowed`](Self::is_allowed). `None` stays `None`.
    pub fn is_disallowed(&self, url: &str, user_agent: &str) -> Option<bool> {
        self.is_allowed(url, user_agent).map(|allowed| !allowed)
    }

    /// Whether the group naming `user_agent` itself disallows `url`. Rules
    /// under `User-agent: *` are not consulted.
    pub fn is_explicitly_disallowed(&self, url: &str, user_agent: &str) -> Option<bool> {
        let path = self.path_for(url).ok()?;
        let rule = self
            .rules
            .get(&agent_key(user_agent))
            .and_then(|rule_set| rule_set.find(&path));
        Some(rule.map_or(false, |rule| !rule.allow()))
    }

    /// The 1-based line number of the rule deciding `url`, or -1 if no rule
    /// matches or `url` doesn't belong to this robots.txt. Use
    /// [`matching_rule`](Self::matching_rule) to tell those cases apart.
    pub fn matching_line_number(&self, url: &str, user_agent: &str) -> i64 {
        match self.matching_rule(url, user_agent) {
            Ok(Some(rule)) => rule.line_number() as i64,
            _ => -1,
        }
    }

    /// The rule deciding whether `user_agent` may crawl `url`.
    ///
    /// The group for `user_agent` is used if there is one, then the `*`
    /// group. `Ok(None)` means no rule matched, which allows the URL.
    pub fn matching_rule(&self, url: &str, user_agent: &str) -> Result<Option<&Rule>, Error> {
        let path = self.path_for(url)?;
        Ok(self
            .rule_set(user_agent)
            .and_then(|rule_set| rule_set.find(&path)))
    }

    /// The crawl delay in seconds for `user_agent`, falling back to the `*`
    /// group. If the agent has its own group without a delay, the `*` delay
    /// is not used.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<u64> {
        self.rule_set(user_agent).and_then(RuleSet::crawl_delay)
    }

    pub fn preferred_host(&self) -> Option<&str> {
        self.preferred_host.as_deref()
    }

    /// Every `Sitemap` URL in file order, duplicates included.
    pub fn sitemaps(&self) -> Vec<String> {
        self.sitemaps.clone()
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// The group that applies to `user_agent`: its own if it has one, else
    /// the `*` group.
    pub fn rule_set(&self, user_agent: &str) -> Option<&RuleSet> {
        self.rules
            .get(&agent_key(user_agent))
            .or_else(|| self.rules.get(WILDCARD_AGENT))
    }

    /// Check that `url` shares this file's origin and return its path and
    /// query in the form rules are matched against.
    fn path_for(&self, url: &str) -> Result<String, Error> {
        let base = self.base.as_ref().ok_or(Error::MissingBase)?;
        let url = Url::parse(url)?;

        let same_origin = url.scheme() == base.scheme()
            && url.host_str() == base.host_str()
            && url.port_or_known_default() == base.port_or_known_default();
        if !same_origin {
            return Err(Error::OriginMismatch {
                url: url.to_string(),
            });
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query().filter(|query| !query.is_empty()) {
            path.push('?');
            path.push_str(query);
        }
        Ok(normalize_encoding(&path).into_owned())
    }
}

fn agent_key(user_agent: &str) -> String {
    let agent = format_user_agent(user_agent);
    if agent.is_empty() {
        WILDCARD_AGENT.to_string()
    } else {
        agent
    }
}
