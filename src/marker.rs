//! The marker entity produced by the parser and consumed by the mutator.

use std::fmt;
use std::path::PathBuf;

use regex::Regex;

use crate::error::Error;

/// One discovered marker comment.
///
/// `line` is only meaningful against the file content the marker was parsed
/// from. Mutating the file invalidates the line numbers of every other marker
/// in it, so callers re-parse after each mutation instead of reusing siblings.
#[derive(Debug, Clone)]
pub struct Marker {
    /// Continuation lines, prefix stripped and trimmed.
    pub body: Vec<String>,
    /// File the marker was found in.
    pub file_path: PathBuf,
    /// Configured keyword, e.g. `TODO`.
    pub keyword: String,
    /// One-based line of the title line at parse time.
    pub line: u32,
    /// Compiled opens-line pattern for `keyword`.
    pub pattern: Regex,
    /// Comment token preceding the keyword, e.g. `// `.
    pub prefix: String,
    /// Priority ordinal, `P0` when the source omits it.
    pub priority: Priority,
    /// Repository the file belongs to. Informational only.
    pub remote_addr: String,
    /// Whether an issue has been created for this marker.
    pub status: ReportStatus,
    /// Text after `: ` on the title line.
    pub title: String,
}

impl Marker {
    /// Continuation lines joined with newlines, used as the issue description.
    pub fn body_text(&self) -> String {
        return self.body.join("\n");
    }

    /// Title line without the comment prefix, for listings.
    pub fn display_line(&self) -> String {
        let rendered = self.render_title_line();
        return rendered
            .strip_prefix(self.prefix.as_str())
            .map_or_else(|| rendered.clone(), ToString::to_string);
    }

    /// Record the issue key created for this marker.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyReported` if the marker already has a key. A
    /// reported marker never goes back to unreported, and never changes key.
    pub fn mark_reported(&mut self, id: impl Into<String>) -> Result<(), Error> {
        if let ReportStatus::Reported(existing) = &self.status {
            return Err(Error::AlreadyReported {
                file: self.file_path.clone(),
                id: existing.clone(),
                keyword: self.keyword.clone(),
                line: self.line,
            });
        }
        self.status = ReportStatus::Reported(id.into());
        return Ok(());
    }

    /// Whether `line` is still this marker's title line (same keyword and title).
    pub fn matches_title_line(&self, line: &str) -> bool {
        let Some(caps) = self.pattern.captures(line.trim_end_matches(['\r', '\n'])) else {
            return false;
        };
        return caps.name("title").is_some_and(|t| return t.as_str() == self.title);
    }

    /// Render the title line in the grammar the classifier accepts.
    ///
    /// Unreported: `<prefix><keyword> P<n>: <title>`.
    /// Reported: `<prefix><keyword> P<n> (<id>): <title>`.
    pub fn render_title_line(&self) -> String {
        return match &self.status {
            ReportStatus::Reported(id) => format!(
                "{}{} {} ({id}): {}",
                self.prefix, self.keyword, self.priority, self.title
            ),
            ReportStatus::Unreported => format!(
                "{}{} {}: {}",
                self.prefix, self.keyword, self.priority, self.title
            ),
        };
    }

    /// Number of lines the marker occupies on disk: the title plus its body.
    pub fn span(&self) -> usize {
        return self.body.len().saturating_add(1);
    }
}

/// Priority ordinal written as `P<n>` on the title line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(
    /// Lower is more urgent.
    pub u32,
);

impl fmt::Display for Priority {
    /// Formats as `P<n>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "P{}", self.0);
    }
}

/// Reporting state of a marker. Moves only from `Unreported` to `Reported`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    /// An issue exists; holds its key, e.g. `PROJ-42`.
    Reported(String),
    /// No issue has been created yet.
    #[default]
    Unreported,
}

impl ReportStatus {
    /// The issue key, if reported.
    pub fn id(&self) -> Option<&str> {
        return match self {
            Self::Reported(id) => Some(id.as_str()),
            Self::Unreported => None,
        };
    }

    /// Whether an issue key is recorded.
    pub const fn is_reported(&self) -> bool {
        return matches!(self, Self::Reported(_));
    }
}
