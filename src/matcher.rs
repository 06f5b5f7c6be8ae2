use serde_derive::{Deserialize, Serialize};

use super::pattern::Pattern;

/// A single Allow or Disallow line, remembered with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pattern: Pattern,
    allow: bool,
    line_number: usize,
}

impl Rule {
    pub fn new(pattern: &str, allow: bool, line_number: usize) -> Self {
        Self {
            pattern: Pattern::compile(pattern),
            allow,
            line_number,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn allow(&self) -> bool {
        self.allow
    }

    /// The 1-based line in the robots.txt file this rule was parsed from.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Everything recorded for one user agent: its rules in file order and an
/// optional crawl delay in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
    crawl_delay: Option<u64>,
}

impl RuleSet {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn crawl_delay(&self) -> Option<u64> {
        self.crawl_delay
    }

    pub(crate) fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub(crate) fn set_crawl_delay(&mut self, delay: u64) {
        self.crawl_delay = Some(delay);
    }

    /// Find the rule governing `path`. See [`find_rule`].
    pub fn find(&self, path: &str) -> Option<&Rule> {
        find_rule(path, &self.rules)
    }
}

/// Pick the rule that decides `path`, scanning `rules` in file order.
///
/// Literal prefixes and wildcard patterns are ranked differently and this
/// asymmetry must be kept as is:
///
/// * among matching literal prefixes the longest one wins, and an earlier
///   literal of equal length beats a later one;
/// * the first matching wildcard pattern wins outright, no matter how long
///   any literal matched before or after it is.
pub fn find_rule<'a>(path: &str, rules: &'a [Rule]) -> Option<&'a Rule> {
    let mut longest: Option<&Rule> = None;

    for rule in rules {
        match &rule.pattern {
            Pattern::Literal(prefix) => {
                if !path.starts_with(prefix.as_str()) {
                    continue;
                }
                let longer = longest.map_or(true, |best| prefix.len() > best.pattern.len());
                if longer {
                    longest = Some(rule);
                }
            }
            Pattern::Wildcard { regex, .. } => {
                if regex.is_match(path) {
                    return Some(rule);
                }
            }
        }
    }

    longest
}

/// Normalize a user agent for lookup: lowercase it, drop any `/version`
/// suffix and trim the result. `"Googlebot/2.1"` becomes `"googlebot"`.
pub fn format_user_agent(user_agent: &str) -> String {
    let lower = user_agent.to_lowercase();
    let name = match lower.find('/') {
        Some(idx) => &lower[..idx],
        None => &lower[..],
    };
    name.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(lines: &[(&str, bool)]) -> Vec<Rule> {
        lines
            .iter()
            .enumerate()
            .map(|(i, (pattern, allow))| Rule::new(pattern, *allow, i + 1))
            .collect()
    }

    #[test]
    fn test_format_user_agent() {
        let test_cases = vec![
            ("Googlebot", "googlebot"),
            ("Googlebot/2.1", "googlebot"),
            ("  Mozilla/5.0 (compatible)", "mozilla"),
            ("ImABot ", "imabot"),
            ("*", "*"),
            ("", ""),
        ];

        for (i, o) in test_cases {
            assert_eq!(format_user_agent(i), o);
        }
    }

    #[test]
    fn test_longest_literal_wins() {
        let forward = rules(&[("/a", false), ("/a/b", true)]);
        assert_eq!(find_rule("/a/b/c", &forward).map(Rule::line_number), Some(2));
        assert_eq!(find_rule("/a/c", &forward).map(Rule::line_number), Some(1));
        assert_eq!(find_rule("/b", &forward), None);

        // Order doesn't matter between literals.
        let reversed = rules(&[("/a/b", true), ("/a", false)]);
        assert_eq!(find_rule("/a/b/c", &reversed).map(Rule::line_number), Some(1));
    }

    #[test]
    fn test_equal_length_literals_keep_first() {
        let rules = rules(&[("/page", true), ("/page", false)]);
        let rule = find_rule("/page.html", &rules).unwrap();
        assert_eq!(rule.line_number(), 1);
        assert!(rule.allow());
    }

    #[test]
    fn test_wildcard_short_circuits() {
        let rules = rules(&[("/*.pdf$", false), ("/public/file.pdf", true)]);
        let rule = find_rule("/public/file.pdf", &rules).unwrap();
        assert_eq!(rule.line_number(), 1);
        assert!(!rule.allow());
    }

    #[test]
    fn test_wildcard_beats_earlier_longer_literal() {
        let rules = rules(&[("/public/file.pdf", true), ("/*.pdf", false)]);
        let rule = find_rule("/public/file.pdf", &rules).unwrap();
        assert_eq!(rule.line_number(), 2);
    }

    #[test]
    fn test_first_wildcard_wins() {
        let rules = rules(&[("/", true), ("/*/bar", true), ("/foo/*", false)]);
        assert_eq!(find_rule("/foo/bar", &rules).map(Rule::line_number), Some(2));
        assert_eq!(find_rule("/foo/baz", &rules).map(Rule::line_number), Some(3));
        assert_eq!(find_rule("/qux", &rules).map(Rule::line_number), Some(1));
    }

    #[test]
    fn test_google_examples() {
        // Test cases from:
        // https://developers.google.com/search/reference/robots_txt#group-member-rules
        let allowed = |pattern: &str, path: &str| {
            let rules = rules(&[("/", false), (pattern, true)]);
            find_rule(path, &rules).map_or(true, Rule::allow)
        };

        assert_eq!(true, allowed("/fish", "/fish"));
        assert_eq!(true, allowed("/fish", "/fish.html"));
        assert_eq!(true, allowed("/fish", "/fishheads/yummy.html"));
        assert_eq!(true, allowed("/fish", "/fish.php?id=anything"));
        assert_eq!(false, allowed("/fish", "/Fish.asp"));
        assert_eq!(false, allowed("/fish", "/catfish"));
        assert_eq!(false, allowed("/fish", "/?id=fish"));

        assert_eq!(true, allowed("/fish/", "/fish/?id=anything"));
        assert_eq!(false, allowed("/fish/", "/fish"));
        assert_eq!(false, allowed("/fish/", "/Fish/Salmon.asp"));

        assert_eq!(true, allowed("/*.php", "/folder/any.php.file.html"));
        assert_eq!(true, allowed("/*.php", "/filename.php/"));
        assert_eq!(false, allowed("/*.php", "/"));
        assert_eq!(false, allowed("/*.php", "/windows.PHP"));

        assert_eq!(true, allowed("/*.php$", "/folder/filename.php"));
        assert_eq!(false, allowed("/*.php$", "/filename.php?parameters"));
        assert_eq!(false, allowed("/*.php$", "/filename.php5"));
    }

    #[test]
    fn test_rule_set_delay() {
        let mut set = RuleSet::default();
        assert_eq!(set.crawl_delay(), None);
        set.set_crawl_delay(5);
        set.set_crawl_delay(10);
        assert_eq!(set.crawl_delay(), Some(10));
        assert!(set.rules().is_empty());
        assert_eq!(set.find("/"), None);
    }
}
