//! A forgiving parser and rule matcher for robots.txt files.
//!
//! A [`Robots`] is built once from the text of a robots.txt file and the URL
//! it was fetched from. It can then answer, for any URL on the same origin and
//! any user agent, whether crawling is allowed, which line decided it, and
//! what crawl delay applies. Fetching the file is left to the caller.
//!
//! ```
//! use robots_rules::Robots;
//!
//! let robots = Robots::new(
//!     "https://example.com/robots.txt",
//!     "User-agent: *\nDisallow: /private\nAllow: /private/open\nCrawl-delay: 5",
//! );
//!
//! assert_eq!(robots.is_allowed("https://example.com/private/x", "MyBot/1.0"), Some(false));
//! assert_eq!(robots.is_allowed("https://example.com/private/open", "MyBot/1.0"), Some(true));
//! assert_eq!(robots.matching_line_number("https://example.com/private/x", "MyBot"), 2);
//! assert_eq!(robots.crawl_delay("mybot"), Some(5));
//!
//! // A URL on another origin isn't covered by this file at all.
//! assert_eq!(robots.is_allowed("http://example.com/private/x", "MyBot"), None);
//! ```

mod error;
mod matcher;
mod parse;
mod pattern;
mod robots;

pub use error::Error;
pub use matcher::{find_rule, format_user_agent, Rule, RuleSet};
pub use pattern::{normalize_encoding, Pattern};
pub use robots::Robots;
