/// Crate-level error types for weasel diagnostics.
use std::fmt;
use std::path::PathBuf;

/// All errors in weasel carry enough context to locate the affected file or
/// marker without a debugger. Each variant names the file, keyword, or reason.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `mark_reported` was called on a marker that already carries an issue key.
    #[error("{keyword} at {}:{line} is already reported as {id}", file.display())]
    AlreadyReported {
        /// File containing the marker.
        file: PathBuf,
        /// Issue key the marker already carries.
        id: String,
        /// Marker keyword.
        keyword: String,
        /// One-based line of the marker title.
        line: u32,
    },

    /// An explicitly requested config file does not exist on disk.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// A keyword or prefix cannot be turned into a marker pattern.
    #[error("invalid keyword `{keyword}`: {reason}")]
    InvalidKeyword {
        /// The offending keyword (or prefix).
        keyword: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// The issue tracker refused or failed to create an issue.
    #[error("issue tracker: {reason}")]
    IssueTracker {
        /// Description of the failure (status, transport error, bad payload).
        reason: String,
    },

    /// A required credential is missing from the environment.
    #[error("missing credential: ${var} is not set")]
    MissingCredential {
        /// Environment variable name.
        var: &'static str,
    },

    /// One step of the temp-file-and-rename protocol failed. The origin file is untouched
    /// unless `stage` is `Rename`, in which case it is still either old or new, never mixed.
    #[error("cannot {stage} for {}: {source}", path.display())]
    Mutation {
        /// Origin file being rewritten.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
        /// Which step of the protocol failed.
        stage: MutationStage,
    },

    /// The line recorded for a marker no longer holds that marker.
    #[error("stale marker: {keyword} expected at {}:{line}", file.display())]
    StaleMarker {
        /// File that was re-read.
        file: PathBuf,
        /// Marker keyword.
        keyword: String,
        /// One-based line the marker was parsed at.
        line: u32,
    },

    /// `report` was requested but the config has no `jira` section.
    #[error("issue tracker not configured: add a `jira` section to the config")]
    TrackerNotConfigured,

    /// A keyword maps to an issue type the tracker does not accept.
    #[error("unknown issue type `{issue_type}` for keyword `{keyword}` (expected one of: {})", allowed.join(", "))]
    UnknownIssueType {
        /// Accepted issue type names.
        allowed: Vec<&'static str>,
        /// The rejected issue type.
        issue_type: String,
        /// Keyword the issue type was configured for.
        keyword: String,
    },

    /// `git add` or `git commit` failed. The file mutation stays applied.
    #[error("version control: {reason}")]
    VersionControl {
        /// Command output or spawn error.
        reason: String,
    },

    /// YAML deserialization failed.
    #[error("yaml: {0}")]
    Yaml(
        /// The wrapped YAML error.
        #[from]
        serde_yaml::Error,
    ),
}

/// Steps of the atomic rewrite protocol, used to tell mutation failures apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStage {
    /// Applying the origin's permission bits to the temp file.
    CopyPermissions,
    /// Creating the temp file next to the origin.
    CreateTemp,
    /// Opening or stat-ing the origin file.
    OpenOrigin,
    /// Renaming the temp file over the origin.
    Rename,
    /// Copying lines from the origin into the temp file.
    Stream,
}

impl fmt::Display for MutationStage {
    /// Human-readable verb phrase, slotted into `Error::Mutation` messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CopyPermissions => "set permissions",
            Self::CreateTemp => "create temp file",
            Self::OpenOrigin => "open file",
            Self::Rename => "rename temp file",
            Self::Stream => "copy lines",
        };
        return f.write_str(text);
    }
}
