use std::collections::HashSet;
use std::path::Path;

use crate::error::Error;

/// Issue types the tracker accepts for a keyword.
pub const ALLOWED_ISSUE_TYPES: [&str; 2] = ["Bug", "Task"];

/// Default config file name, looked up in the scan root.
pub const DEFAULT_CONFIG_FILE: &str = ".weasel.yaml";

/// Comment prefix used when the config does not set one.
const DEFAULT_PREFIX: &str = "// ";

/// Project configuration loaded from `.weasel.yaml`.
/// Include/exclude patterns are path prefixes applied to files under the root.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path prefixes to skip, relative to the root.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Path prefixes to scan, relative to the root. Empty means everything.
    #[serde(default)]
    pub include: Vec<String>,
    /// Issue tracker settings. Only `report` needs them.
    #[serde(default)]
    pub jira: Option<JiraConfig>,
    /// Keywords in priority order, each mapped to an issue type.
    #[serde(default)]
    pub keywords: Vec<KeywordConfig>,
    /// Comment token that starts every marker line.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Repository URL shown next to each marker.
    #[serde(default)]
    pub repo_url: String,
}

/// Jira project the `report` command files issues into.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JiraConfig {
    /// Site root, e.g. `https://acme.atlassian.net`.
    pub base_url: String,
    /// Project key issues are created in, e.g. `WID`.
    pub project: String,
}

/// One recognized keyword and the issue type it files as.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordConfig {
    /// Tracker issue type, one of `ALLOWED_ISSUE_TYPES`.
    pub issue_type: String,
    /// Keyword text, e.g. `TODO`.
    pub name: String,
}

impl Config {
    /// The configured issue type for `keyword`.
    pub fn issue_type_for(&self, keyword: &str) -> Option<String> {
        return self
            .keywords_or_default()
            .into_iter()
            .find(|k| return k.name == keyword)
            .map(|k| return k.issue_type);
    }

    /// Keyword names in match order. The first configured keyword wins ties.
    pub fn keyword_names(&self) -> Vec<String> {
        return self
            .keywords_or_default()
            .into_iter()
            .map(|k| return k.name)
            .collect();
    }

    /// Configured keywords, or `default_keywords()` when none are configured.
    pub fn keywords_or_default(&self) -> Vec<KeywordConfig> {
        if self.keywords.is_empty() {
            return default_keywords();
        }
        return self.keywords.clone();
    }

    /// Load and validate config.
    ///
    /// With `explicit` set, that file must exist. Otherwise `.weasel.yaml` in
    /// `root` is used if present, and built-in defaults if not. A file that
    /// exists but is malformed is always an error; defaults are never
    /// substituted for a config the user wrote.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` for a missing explicit file,
    /// `Error::Io` if reading fails, `Error::Yaml` if the YAML is malformed,
    /// or any error from `validate`.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, Error> {
        let path = explicit.map_or_else(|| return root.join(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit.is_some() {
                    return Err(Error::ConfigNotFound { path });
                }
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            },
            Err(e) => return Err(Error::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), keywords = ?config.keyword_names(), "loaded config");
        return Ok(config);
    }

    /// Parse and validate YAML config content.
    ///
    /// # Errors
    ///
    /// Returns `Error::Yaml` if the YAML is malformed, or any error from `validate`.
    pub fn parse(content: &str) -> Result<Self, Error> {
        // Empty file: all defaults.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        return Ok(config);
    }

    /// Check whether a file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }

    /// Reject configs that would misfile issues. Runs before any file is touched.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownIssueType` for an issue type outside
    /// `ALLOWED_ISSUE_TYPES`, or `Error::InvalidKeyword` for a duplicated keyword.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for keyword in &self.keywords {
            if !ALLOWED_ISSUE_TYPES.contains(&keyword.issue_type.as_str()) {
                return Err(Error::UnknownIssueType {
                    allowed: ALLOWED_ISSUE_TYPES.to_vec(),
                    issue_type: keyword.issue_type.clone(),
                    keyword: keyword.name.clone(),
                });
            }
            if !seen.insert(keyword.name.as_str()) {
                return Err(Error::InvalidKeyword {
                    keyword: keyword.name.clone(),
                    reason: "listed more than once".to_string(),
                });
            }
        }
        return Ok(());
    }
}

impl Default for Config {
    /// Scan everything with `// ` comments and the built-in keywords.
    fn default() -> Self {
        return Self {
            exclude: Vec::new(),
            include: Vec::new(),
            jira: None,
            keywords: Vec::new(),
            prefix: default_prefix(),
            repo_url: String::new(),
        };
    }
}

/// The built-in keyword set: TODO and REFACTOR file as tasks, FIXME as a bug.
pub fn default_keywords() -> Vec<KeywordConfig> {
    return [("TODO", "Task"), ("FIXME", "Bug"), ("REFACTOR", "Task")]
        .into_iter()
        .map(|(name, issue_type)| {
            return KeywordConfig {
                issue_type: issue_type.to_string(),
                name: name.to_string(),
            };
        })
        .collect();
}

/// Serde default for `prefix`.
fn default_prefix() -> String {
    return DEFAULT_PREFIX.to_string();
}
