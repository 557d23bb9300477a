//! Line classification: does a line open a marker, continue one, or neither.

use regex::Regex;

use crate::error::Error;
use crate::marker::{Priority, ReportStatus};

/// Recognizes marker lines for one comment prefix and an ordered keyword list.
///
/// Keywords are tried in configuration order and the first match wins, so a
/// line matching two keyword patterns always resolves to the earlier keyword.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// One compiled pattern per keyword, in configuration order.
    patterns: Vec<KeywordPattern>,
    /// Comment token every marker line starts with.
    prefix: String,
}

/// A keyword and the opens-line pattern built for it.
#[derive(Debug, Clone)]
struct KeywordPattern {
    /// The keyword text, e.g. `FIXME`.
    keyword: String,
    /// Anchored pattern with `priority`, `id` and `title` capture groups.
    regex: Regex,
}

/// Classification of a single line.
#[derive(Debug)]
pub enum LineKind<'a> {
    /// Starts with the prefix but opens no marker. Holds the trimmed text after the prefix.
    Continues(&'a str),
    /// Starts a new marker.
    Opens(OpensLine),
    /// Does not start with the prefix.
    Unrelated,
}

/// Fields captured from a marker's title line.
#[derive(Debug, Clone)]
pub struct OpensLine {
    /// Keyword that matched.
    pub keyword: String,
    /// Pattern that matched, carried into the marker.
    pub pattern: Regex,
    /// `P<n>` value, default when absent.
    pub priority: Priority,
    /// `Reported` when the line carries `(<id>)`.
    pub status: ReportStatus,
    /// Title text, trailing whitespace removed.
    pub title: String,
}

impl Classifier {
    /// Classify one line. A trailing `\r` is ignored.
    pub fn classify<'a>(&self, raw: &'a str) -> LineKind<'a> {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let Some(rest) = line.strip_prefix(self.prefix.as_str()) else {
            return LineKind::Unrelated;
        };

        for pattern in &self.patterns {
            if let Some(opens) = match_opens_line(pattern, line) {
                return LineKind::Opens(opens);
            }
        }

        return LineKind::Continues(rest.trim());
    }

    /// Build one pattern per keyword.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidKeyword` for an empty prefix, or for a keyword
    /// that is empty or contains whitespace.
    pub fn new<S: AsRef<str>>(prefix: &str, keywords: &[S]) -> Result<Self, Error> {
        if prefix.is_empty() {
            return Err(Error::InvalidKeyword {
                keyword: prefix.to_string(),
                reason: "comment prefix must not be empty".to_string(),
            });
        }

        let mut patterns = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword = keyword.as_ref();
            if keyword.is_empty() || keyword.chars().any(char::is_whitespace) {
                return Err(Error::InvalidKeyword {
                    keyword: keyword.to_string(),
                    reason: "keywords must be non-empty and contain no whitespace".to_string(),
                });
            }
            patterns.push(KeywordPattern {
                keyword: keyword.to_string(),
                regex: build_opens_pattern(prefix, keyword)?,
            });
        }

        return Ok(Self {
            patterns,
            prefix: prefix.to_string(),
        });
    }

    /// The compiled pattern for `keyword`, if configured.
    #[cfg(test)]
    pub fn pattern_for(&self, keyword: &str) -> Option<&Regex> {
        return self
            .patterns
            .iter()
            .find(|p| return p.keyword == keyword)
            .map(|p| return &p.regex);
    }

    /// The comment prefix this classifier was built for.
    pub fn prefix(&self) -> &str {
        return &self.prefix;
    }
}

/// Compile `<prefix><keyword>[ P<n>][ (<id>)]: <title>` into an anchored regex.
///
/// # Errors
///
/// Returns `Error::InvalidKeyword` if the pattern does not compile.
fn build_opens_pattern(prefix: &str, keyword: &str) -> Result<Regex, Error> {
    let source = format!(
        r"^{}{}(?: P(?P<priority>[0-9]+))?(?: \((?P<id>[^()\s][^()]*)\))?: *(?P<title>\S(?:.*\S)?)\s*$",
        regex::escape(prefix),
        regex::escape(keyword),
    );
    return Regex::new(&source).map_err(|e| {
        return Error::InvalidKeyword {
            keyword: keyword.to_string(),
            reason: e.to_string(),
        };
    });
}

/// Try one keyword pattern against a line. A priority too large for `u32`
/// saturates; it still opens a marker.
fn match_opens_line(pattern: &KeywordPattern, line: &str) -> Option<OpensLine> {
    let caps = pattern.regex.captures(line)?;
    let priority = match caps.name("priority") {
        None => Priority::default(),
        Some(digits) => Priority(digits.as_str().parse().unwrap_or(u32::MAX)),
    };
    let status = caps.name("id").map_or(ReportStatus::Unreported, |id| {
        return ReportStatus::Reported(id.as_str().trim_end().to_string());
    });
    let title = caps.name("title")?.as_str().to_string();

    return Some(OpensLine {
        keyword: pattern.keyword.clone(),
        pattern: pattern.regex.clone(),
        priority,
        status,
        title,
    });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn classifier() -> Classifier {
        return Classifier::new("// ", &["TODO", "FIXME", "REFACTOR"]).unwrap();
    }

    fn opens(line: &str) -> OpensLine {
        match classifier().classify(line) {
            LineKind::Opens(o) => return o,
            other => panic!("expected opens line for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn bare_marker_gets_default_priority() {
        let o = opens("// TODO: fix parsing");
        assert_eq!(o.keyword, "TODO");
        assert_eq!(o.priority, Priority(0));
        assert_eq!(o.status, ReportStatus::Unreported);
        assert_eq!(o.title, "fix parsing");
    }

    #[test]
    fn priority_and_reported_id_are_captured() {
        let o = opens("// FIXME P3 (PROJ-42): handle EOF");
        assert_eq!(o.keyword, "FIXME");
        assert_eq!(o.priority, Priority(3));
        assert_eq!(o.status, ReportStatus::Reported("PROJ-42".to_string()));
        assert_eq!(o.title, "handle EOF");
    }

    #[test]
    fn oversized_priority_still_opens() {
        assert_eq!(opens("// TODO P300: keep me").priority, Priority(300));
        let o = opens("// TODO P99999999999 (PROJ-7): huge");
        assert_eq!(o.priority, Priority(u32::MAX));
        assert_eq!(o.status, ReportStatus::Reported("PROJ-7".to_string()));
    }

    #[test]
    fn title_may_contain_parens_and_colons() {
        let o = opens("// TODO: call f(x): then g()");
        assert_eq!(o.status, ReportStatus::Unreported);
        assert_eq!(o.title, "call f(x): then g()");
    }

    #[test]
    fn crlf_is_ignored() {
        let o = opens("// TODO P1: windows\r");
        assert_eq!(o.title, "windows");
    }

    #[test]
    fn prefixed_non_marker_continues() {
        let c = classifier();
        assert!(matches!(c.classify("// more context"), LineKind::Continues("more context")));
        assert!(matches!(c.classify("// TODO without colon"), LineKind::Continues(_)));
        assert!(matches!(c.classify("// TODOS: plural is not a keyword"), LineKind::Continues(_)));
        assert!(matches!(c.classify("// TODO:"), LineKind::Continues(_)));
    }

    #[test]
    fn prefix_must_start_the_line() {
        let c = classifier();
        assert!(matches!(c.classify("x := 1"), LineKind::Unrelated));
        assert!(matches!(c.classify("    // TODO: indented"), LineKind::Unrelated));
        assert!(matches!(c.classify("//TODO: no space"), LineKind::Unrelated));
        assert!(matches!(c.classify(""), LineKind::Unrelated));
    }

    #[test]
    fn first_configured_keyword_wins() {
        // `# FIX:: x` opens under both `FIX` (title `: x`) and `FIX:` (title `x`).
        let c = Classifier::new("# ", &["FIX", "FIX:"]).unwrap();
        let LineKind::Opens(o) = c.classify("# FIX:: x") else { panic!("expected opens") };
        assert_eq!((o.keyword.as_str(), o.title.as_str()), ("FIX", ": x"));

        let reversed = Classifier::new("# ", &["FIX:", "FIX"]).unwrap();
        let LineKind::Opens(o) = reversed.classify("# FIX:: x") else { panic!("expected opens") };
        assert_eq!((o.keyword.as_str(), o.title.as_str()), ("FIX:", "x"));
    }

    #[test]
    fn regex_metacharacters_in_prefix_are_literal() {
        let c = Classifier::new("-- [", &["TODO"]).unwrap();
        assert!(matches!(c.classify("-- [TODO: sql"), LineKind::Opens(_)));
        assert!(matches!(c.classify("-- xTODO: sql"), LineKind::Unrelated));
    }

    #[test]
    fn rejects_bad_keywords() {
        assert!(matches!(Classifier::new("// ", &[""]), Err(Error::InvalidKeyword { .. })));
        assert!(matches!(Classifier::new("// ", &["TO DO"]), Err(Error::InvalidKeyword { .. })));
        assert!(matches!(Classifier::new("", &["TODO"]), Err(Error::InvalidKeyword { .. })));
    }
}
