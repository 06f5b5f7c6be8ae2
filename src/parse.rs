use tracing::debug;

use super::matcher::format_user_agent;
use super::robots::Robots;

const UA_DIRECTIVE: &str = "user-agent";
const DISALLOW_DIRECTIVE: &str = "disallow";
const ALLOW_DIRECTIVE: &str = "allow";
const DELAY_DIRECTIVE: &str = "crawl-delay";
const SITEMAP_DIRECTIVE: &str = "sitemap";
const HOST_DIRECTIVE: &str = "host";

#[derive(Debug, PartialEq, Clone, Copy)]
enum ParsedLine<'a> {
    UserAgent(&'a str),
    Allow(&'a str),
    Disallow(&'a str),
    /// `None` when the value isn't a whole number of seconds.
    Delay(Option<u64>),
    Sitemap(&'a str),
    Host(&'a str),
    /// A well-formed line with a directive we don't support. It still closes
    /// a run of user-agent lines.
    Unknown(&'a str),
    Nothing,
}

/// Whether the next `User-agent` line extends the current group or starts a
/// new one.
#[derive(Debug, PartialEq, Clone, Copy)]
enum GroupState {
    /// The previous directive was not a user agent, so the next one resets
    /// the group. This is also the state before the first directive.
    AwaitingAgents,
    /// The previous directive was a user agent; more agents join its group.
    CollectingAgents,
}

#[derive(Debug)]
struct Groups {
    state: GroupState,
    agents: Vec<String>,
}

impl Groups {
    fn new() -> Self {
        Self {
            state: GroupState::AwaitingAgents,
            agents: vec![],
        }
    }

    fn user_agent(&mut self, agent: &str) {
        if self.state == GroupState::AwaitingAgents {
            self.agents.clear();
        }
        if !agent.is_empty() {
            self.agents.push(format_user_agent(agent));
        }
        self.state = GroupState::CollectingAgents;
    }

    /// Any other directive ends the run of user agents. Blank and comment
    /// lines never reach here, so they don't split a group.
    fn other_directive(&mut self) {
        self.state = GroupState::AwaitingAgents;
    }

    fn agents(&self) -> &[String] {
        &self.agents
    }
}

/// Parse a whole robots.txt file into `robots`, one line at a time. No line
/// can make parsing fail; anything malformed is skipped.
pub(crate) fn parse(robots: &mut Robots, contents: &str) {
    let mut groups = Groups::new();

    for (idx, line) in split_lines(contents).enumerate() {
        let line_number = idx + 1;
        let parsed = parse_line(line);

        match parsed {
            ParsedLine::Nothing => continue,
            ParsedLine::UserAgent(agent) => {
                groups.user_agent(agent);
                continue;
            }
            _ => groups.other_directive(),
        }

        match parsed {
            ParsedLine::Allow(pattern) | ParsedLine::Disallow(pattern) => {
                let allow = matches!(parsed, ParsedLine::Allow(..));
                if groups.agents().is_empty() {
                    debug!(line_number, "rule outside of any user-agent group");
                }
                for agent in groups.agents() {
                    robots.add_rule(agent, pattern, allow, line_number);
                }
            }
            ParsedLine::Delay(Some(delay)) => {
                for agent in groups.agents() {
                    robots.set_crawl_delay(agent, delay);
                }
            }
            ParsedLine::Delay(None) => {
                debug!(line_number, "ignoring unparseable crawl-delay");
            }
            ParsedLine::Sitemap(url) => robots.add_sitemap(url),
            ParsedLine::Host(host) => robots.set_preferred_host(host),
            ParsedLine::Unknown(directive) => {
                debug!(line_number, directive, "ignoring unknown directive");
            }
            ParsedLine::UserAgent(..) | ParsedLine::Nothing => (),
        }
    }
}

/// Split on `\r\n`, `\r` or `\n`.
fn split_lines(contents: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(contents);
    std::iter::from_fn(move || {
        let text = rest?;
        match text.find(|c: char| c == '\r' || c == '\n') {
            Some(idx) => {
                let skip = if text[idx..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&text[idx + skip..]);
                Some(&text[..idx])
            }
            None => {
                rest = None;
                Some(text)
            }
        }
    })
}

fn parse_line(line: &str) -> ParsedLine<'_> {
    let (directive, value) = match split_directive(strip_comments(line)) {
        Some(pair) => pair,
        None => return ParsedLine::Nothing,
    };

    if directive.eq_ignore_ascii_case(DISALLOW_DIRECTIVE) {
        ParsedLine::Disallow(value)
    } else if directive.eq_ignore_ascii_case(UA_DIRECTIVE) {
        ParsedLine::UserAgent(value)
    } else if directive.eq_ignore_ascii_case(ALLOW_DIRECTIVE) {
        ParsedLine::Allow(value)
    } else if directive.eq_ignore_ascii_case(DELAY_DIRECTIVE) {
        ParsedLine::Delay(value.parse().ok())
    } else if directive.eq_ignore_ascii_case(SITEMAP_DIRECTIVE) {
        ParsedLine::Sitemap(value)
    } else if directive.eq_ignore_ascii_case(HOST_DIRECTIVE) {
        ParsedLine::Host(value)
    } else {
        ParsedLine::Unknown(directive)
    }
}

fn strip_comments(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Split at the first colon, trimming both halves. Lines without a colon or
/// without a directive name are not directives.
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(':')?;
    let directive = line[..idx].trim();
    if directive.is_empty() {
        return None;
    }
    Some((directive, line[idx + 1..].trim()))
}
