//! Issue-tracker collaborator: turns a marker into a tracker issue key.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::JiraConfig;
use crate::error::Error;
use crate::marker::{Marker, Priority};

/// Environment variable holding the tracker user name.
pub const USERNAME_VAR: &str = "PROJECT_USERNAME";

/// Environment variable holding the tracker password or API token.
pub const PASSWORD_VAR: &str = "PROJECT_PASSWORD";

/// Request timeout for a single issue creation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can file an issue and hand back its key.
pub trait IssueTracker {
    /// Create an issue and return its key, e.g. `PROJ-42`.
    ///
    /// # Errors
    ///
    /// Returns `Error::IssueTracker` if the issue could not be created.
    fn create_issue(&self, draft: &IssueDraft) -> Result<String, Error>;
}

/// Basic-auth credentials. Opaque to everything but the HTTP client.
#[derive(Clone)]
pub struct Credentials {
    /// Password or API token.
    password: String,
    /// Account name or email.
    username: String,
}

impl Credentials {
    /// Read `PROJECT_USERNAME` and `PROJECT_PASSWORD` from the environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingCredential` naming the first unset variable.
    pub fn from_env() -> Result<Self, Error> {
        let read = |var: &'static str| {
            return std::env::var(var)
                .ok()
                .filter(|v| return !v.is_empty())
                .ok_or(Error::MissingCredential { var });
        };
        return Ok(Self::new(read(USERNAME_VAR)?, read(PASSWORD_VAR)?));
    }

    /// Build credentials from explicit values.
    pub const fn new(username: String, password: String) -> Self {
        return Self { password, username };
    }
}

impl std::fmt::Debug for Credentials {
    /// Never prints the password.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f
            .debug_struct("Credentials")
            .field("password", &"<redacted>")
            .field("username", &self.username)
            .finish();
    }
}

/// What gets sent to the tracker for one marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    /// Body text plus a pointer back to the source location.
    pub description: String,
    /// Tracker issue type, e.g. `Bug`.
    pub issue_type: String,
    /// Marker priority, carried as a label.
    pub priority: Priority,
    /// Marker title.
    pub summary: String,
}

impl IssueDraft {
    /// Build a draft from a marker and the issue type its keyword maps to.
    pub fn from_marker(marker: &Marker, issue_type: &str) -> Self {
        let mut description = marker.body_text();
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        description.push_str(&format!("Found in {}:{}", marker.file_path.display(), marker.line));
        if !marker.remote_addr.is_empty() {
            description.push_str(&format!(" ({})", marker.remote_addr));
        }

        return Self {
            description,
            issue_type: issue_type.to_string(),
            priority: marker.priority,
            summary: marker.title.clone(),
        };
    }
}

/// Jira REST client for issue creation.
#[derive(Debug)]
pub struct JiraClient {
    /// Site root without trailing slash.
    base_url: String,
    /// Blocking HTTP client, reused across issues.
    client: reqwest::blocking::Client,
    /// Basic-auth credentials.
    credentials: Credentials,
    /// Project key issues are created in.
    project: String,
}

/// `POST /rest/api/2/issue` request body.
#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    /// Issue fields.
    fields: CreateIssueFields<'a>,
}

/// Fields of a new Jira issue.
#[derive(Debug, Serialize)]
struct CreateIssueFields<'a> {
    /// Long-form text.
    description: &'a str,
    /// Issue type by name.
    #[serde(rename = "issuetype")]
    issue_type: NamedRef<'a>,
    /// Labels; carries the marker priority.
    labels: Vec<String>,
    /// Project by key.
    project: KeyRef<'a>,
    /// One-line title.
    summary: &'a str,
}

/// `{"key": ...}` reference.
#[derive(Debug, Serialize)]
struct KeyRef<'a> {
    /// Referenced key.
    key: &'a str,
}

/// `{"name": ...}` reference.
#[derive(Debug, Serialize)]
struct NamedRef<'a> {
    /// Referenced name.
    name: &'a str,
}

/// Subset of the creation response we use.
#[derive(Debug, Deserialize)]
struct CreatedIssue {
    /// New issue key.
    key: String,
}

impl JiraClient {
    /// Build a client for the configured Jira project.
    ///
    /// # Errors
    ///
    /// Returns `Error::IssueTracker` if the HTTP client cannot be built.
    pub fn new(config: &JiraConfig, credentials: Credentials) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| return Error::IssueTracker { reason: e.to_string() })?;
        return Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
            project: config.project.clone(),
        });
    }

    /// Endpoint for issue creation.
    fn issue_endpoint(&self) -> String {
        return format!("{}/rest/api/2/issue", self.base_url);
    }
}

impl IssueTracker for JiraClient {
    fn create_issue(&self, draft: &IssueDraft) -> Result<String, Error> {
        let body = CreateIssueRequest {
            fields: CreateIssueFields {
                description: &draft.description,
                issue_type: NamedRef { name: &draft.issue_type },
                labels: vec![format!("weasel-{}", draft.priority)],
                project: KeyRef { key: &self.project },
                summary: &draft.summary,
            },
        };

        let response = self
            .client
            .post(self.issue_endpoint())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .json(&body)
            .send()
            .map_err(|e| return Error::IssueTracker { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::IssueTracker {
                reason: format!("{status}: {}", text.trim()),
            });
        }

        let created: CreatedIssue = response.json().map_err(|e| {
            return Error::IssueTracker {
                reason: format!("unexpected response: {e}"),
            };
        })?;
        tracing::info!(key = %created.key, summary = %draft.summary, "created issue");
        return Ok(created.key);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::classifier::Classifier;
    use crate::marker::ReportStatus;

    fn marker(body: &[&str]) -> Marker {
        let classifier = Classifier::new("// ", &["FIXME"]).unwrap();
        return Marker {
            body: body.iter().map(ToString::to_string).collect(),
            file_path: PathBuf::from("src/io.go"),
            keyword: "FIXME".to_string(),
            line: 12,
            pattern: classifier.pattern_for("FIXME").unwrap().clone(),
            prefix: "// ".to_string(),
            priority: Priority(1),
            remote_addr: "https://github.com/acme/widgets".to_string(),
            status: ReportStatus::Unreported,
            title: "handle short reads".to_string(),
        };
    }

    #[test]
    fn draft_carries_body_and_location() {
        let draft = IssueDraft::from_marker(&marker(&["read may return early", "loop until n"]), "Bug");
        assert_eq!(draft.summary, "handle short reads");
        assert_eq!(draft.issue_type, "Bug");
        assert_eq!(draft.priority, Priority(1));
        assert_eq!(
            draft.description,
            "read may return early\nloop until n\n\nFound in src/io.go:12 (https://github.com/acme/widgets)"
        );
    }

    #[test]
    fn draft_without_body_is_just_location() {
        let draft = IssueDraft::from_marker(&marker(&[]), "Task");
        assert_eq!(draft.description, "Found in src/io.go:12 (https://github.com/acme/widgets)");
    }

    #[test]
    fn request_body_matches_jira_shape() {
        let body = CreateIssueRequest {
            fields: CreateIssueFields {
                description: "d",
                issue_type: NamedRef { name: "Bug" },
                labels: vec!["weasel-P1".to_string()],
                project: KeyRef { key: "WID" },
                summary: "s",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fields": {
                    "description": "d",
                    "issuetype": {"name": "Bug"},
                    "labels": ["weasel-P1"],
                    "project": {"key": "WID"},
                    "summary": "s",
                }
            })
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("me".to_string(), "hunter2".to_string());
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
