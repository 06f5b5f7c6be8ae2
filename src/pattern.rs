use std::borrow::Cow;
use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, trace};

const EOW_CHAR: char = '$';
const WILDCARD_CHAR: char = '*';

// Everything `encodeURI` leaves alone, plus '%' so that existing escapes
// survive and normalizing twice is a no-op.
const PATH_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#')
    .remove(b'%');

/// A compiled Allow/Disallow path pattern.
///
/// Patterns without `*` or `$` stay as plain strings and are matched by
/// prefix comparison. Anything else is turned into an anchored regex.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Pattern {
    Literal(String),
    Wildcard { source: String, regex: Regex },
}

impl Pattern {
    /// Normalize the percent-encoding of `raw` and compile it.
    pub fn compile(raw: &str) -> Self {
        let normalized = normalize_encoding(raw).into_owned();
        if !normalized.contains(WILDCARD_CHAR) && !normalized.contains(EOW_CHAR) {
            return Pattern::Literal(normalized);
        }

        let expression = wildcard_to_regex(&normalized);
        match Regex::new(&expression) {
            Ok(regex) => {
                trace!(pattern = %normalized, %expression, "compiled wildcard pattern");
                Pattern::Wildcard {
                    source: normalized,
                    regex,
                }
            }
            Err(err) => {
                // Only reachable by blowing past the regex size limit.
                debug!(pattern = %normalized, %err, "falling back to literal pattern");
                Pattern::Literal(normalized)
            }
        }
    }

    /// The normalized pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(prefix) => prefix,
            Pattern::Wildcard { source, .. } => source,
        }
    }

    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Pattern::Wildcard { .. })
    }

    /// Whether `path` is matched by this pattern. `path` should already be
    /// normalized with [`normalize_encoding`].
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Pattern::Literal(prefix) => path.starts_with(prefix.as_str()),
            Pattern::Wildcard { regex, .. } => regex.is_match(path),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_wildcard() == other.is_wildcard() && self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Pattern {
    fn from(raw: String) -> Self {
        Pattern::compile(&raw)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        match pattern {
            Pattern::Literal(prefix) => prefix,
            Pattern::Wildcard { source, .. } => source,
        }
    }
}

/// Escape every regex metacharacter, turn each run of `*` into `.*` and a
/// trailing `$` into an end anchor. A `$` anywhere else is literal.
fn wildcard_to_regex(pattern: &str) -> String {
    let (body, anchored) = match pattern.strip_suffix(EOW_CHAR) {
        Some(body) => (body, true),
        None => (pattern, false),
    };

    let mut expression = String::with_capacity(body.len() * 2 + 2);
    expression.push('^');
    let mut in_wildcard = false;
    let mut buf = [0u8; 4];
    for c in body.chars() {
        if c == WILDCARD_CHAR {
            if !in_wildcard {
                expression.push_str(".*");
            }
            in_wildcard = true;
            continue;
        }
        in_wildcard = false;
        expression.push_str(&regex::escape(c.encode_utf8(&mut buf)));
    }
    if anchored {
        expression.push('$');
    }
    expression
}

/// Percent-encode anything that is not valid in a URL path and uppercase
/// the hex digits of every escape, so `%c3%a9`, `%C3%A9` and `é` all compare
/// equal. A `%` that doesn't start an escape becomes `%25`.
pub fn normalize_encoding(pattern: &str) -> Cow<'_, str> {
    let encoded: Cow<'_, str> = utf8_percent_encode(pattern, PATH_RESERVED).into();
    match encoded {
        Cow::Borrowed(s) => normalize_escapes(s),
        Cow::Owned(s) => Cow::Owned(normalize_escapes(&s).into_owned()),
    }
}

/// Uppercase the hex digits of every `%XX` escape and escape any bare `%`.
fn normalize_escapes(path: &str) -> Cow<'_, str> {
    let bytes = path.as_bytes();
    let needs_fix = (0..bytes.len()).any(|i| bytes[i] == b'%' && !is_upper_escape(&bytes[i..]));
    if !needs_fix {
        return Cow::Borrowed(path);
    }

    let mut out = String::with_capacity(path.len() + 4);
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            // Copy up to the next '%' in one go so multi-byte chars stay intact.
            let end = path[i..].find('%').map_or(bytes.len(), |idx| i + idx);
            out.push_str(&path[i..end]);
            i = end;
        } else if is_escape(&bytes[i..]) {
            out.push('%');
            out.push(bytes[i + 1].to_ascii_uppercase() as char);
            out.push(bytes[i + 2].to_ascii_uppercase() as char);
            i += 3;
        } else {
            out.push_str("%25");
            i += 1;
        }
    }
    Cow::Owned(out)
}

fn is_escape(rest: &[u8]) -> bool {
    rest.len() >= 3 && rest[1].is_ascii_hexdigit() && rest[2].is_ascii_hexdigit()
}

fn is_upper_escape(rest: &[u8]) -> bool {
    is_escape(rest) && !rest[1].is_ascii_lowercase() && !rest[2].is_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_patterns() {
        let test_cases = vec!["/", "/fish", "/fish/salmon.html", "/a?b=c", "/%C3%A9t%C3%A9"];

        for i in test_cases {
            let pattern = Pattern::compile(i);
            assert!(!pattern.is_wildcard(), "{} should be literal", i);
            assert_eq!(pattern.as_str(), i);
        }
    }

    #[test]
    fn test_normalize_encoding() {
        let test_cases = vec![
            ("/été", "/%C3%A9t%C3%A9"),
            ("/%c3%a9t%c3%a9", "/%C3%A9t%C3%A9"),
            ("/a b", "/a%20b"),
            ("/100%", "/100%25"),
            ("/%zz", "/%25zz"),
            ("/a|b", "/a%7Cb"),
            ("/x[1]", "/x%5B1%5D"),
            ("/path;a=b?c&d", "/path;a=b?c&d"),
            ("/*.pdf$", "/*.pdf$"),
        ];

        for (i, o) in test_cases {
            assert_eq!(normalize_encoding(i), o);
            // normalizing is idempotent
            assert_eq!(normalize_encoding(o), o);
        }
    }

    #[test]
    fn test_normalize_escapes() {
        assert_eq!(normalize_escapes("/a%2fb"), "/a%2Fb");
        assert_eq!(normalize_escapes("/tail%e"), "/tail%25e");
        assert_eq!(normalize_escapes("/%%41"), "/%25%41");
        assert_eq!(normalize_escapes("/été%c3"), "/été%C3");
        assert!(matches!(normalize_escapes("/plain"), Cow::Borrowed(_)));
        assert!(matches!(normalize_escapes("/a%2Fb"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_wildcard_to_regex() {
        let test_cases = vec![
            ("/*.php", r"^/.*\.php"),
            ("/*.php$", r"^/.*\.php$"),
            ("/a***b", r"^/a.*b"),
            ("/x$y", r"^/x\$y"),
            ("/a+(b)*", r"^/a\+\(b\).*"),
        ];

        for (i, o) in test_cases {
            assert_eq!(wildcard_to_regex(i), o);
        }
    }

    #[test]
    fn test_wildcard_matches() {
        let pattern = Pattern::compile("/*.php$");
        assert!(pattern.is_wildcard());
        assert!(pattern.matches("/filename.php"));
        assert!(pattern.matches("/folder/filename.php"));
        assert!(!pattern.matches("/filename.php?parameters"));
        assert!(!pattern.matches("/filename.php5"));
        assert!(!pattern.matches("/windows.PHP"));

        let pattern = Pattern::compile("/fish*.php");
        assert!(pattern.matches("/fish.php"));
        assert!(pattern.matches("/fishheads/catfish.php?parameters"));
        assert!(!pattern.matches("/Fish.PHP"));
        assert!(!pattern.matches("/catfish.php"));
    }

    #[test]
    fn test_middle_eow_is_literal() {
        let pattern = Pattern::compile("/foo$bar");
        assert!(pattern.is_wildcard());
        assert!(pattern.matches("/foo$bar"));
        assert!(pattern.matches("/foo$bar/baz"));
        assert!(!pattern.matches("/foo"));
    }

    #[test]
    fn test_encoding_case_does_not_matter() {
        let pattern = Pattern::compile("/caf%c3%a9*");
        assert!(pattern.matches("/caf%C3%A9/menu"));

        let pattern = Pattern::compile("/café");
        assert!(pattern.matches("/caf%C3%A9/menu"));
    }

    #[test]
    fn test_pattern_serde() {
        let pattern = Pattern::compile("/*.pdf$");
        let json = serde_json::to_string(&pattern).unwrap();
        assert_eq!(json, r#""/*.pdf$""#);
        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pattern);
        assert!(back.matches("/docs/report.pdf"));
    }
}
