use std::fmt::Write as _;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::error::{Error, MutationStage};
use crate::tracker::{PASSWORD_VAR, USERNAME_VAR};

/// ANSI bold, used for markdown headings.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => format!("\
# Error: Config Not Found

`{}` does not exist.

## Fix

Pass an existing file to `--config`, or drop the flag to use `{DEFAULT_CONFIG_FILE}` (or built-in defaults).
", path.display()),
        Error::MissingCredential { var } => render_missing_credential(var),
        Error::Mutation { path, source, stage } => render_mutation(&path.display().to_string(), *stage, source),
        Error::TrackerNotConfigured => render_tracker_not_configured(),
        Error::UnknownIssueType { allowed, issue_type, keyword } => {
            render_unknown_issue_type(keyword, issue_type, allowed)
        },
        Error::Yaml(err) => format!("\
# Error: Invalid Config

{err}
"),
        _ => format!("\
# Error

{e}
"),
    };
}

/// Name the unset variable and show how to export both.
fn render_missing_credential(var: &str) -> String {
    return format!("\
# Error: Missing Credential

`${var}` is not set.

## Fix

Export both tracker credentials before running `weasel report`:

    export {USERNAME_VAR}=you@example.com
    export {PASSWORD_VAR}=<api token>
");
}

/// Name the failed step and say what state the file was left in.
fn render_mutation(path: &str, stage: MutationStage, source: &std::io::Error) -> String {
    let mut out = format!("\
# Error: Rewrite Failed

Could not {stage} for `{path}`: {source}
");
    if stage == MutationStage::Rename {
        out.push_str("\nThe file holds either its old or its new content, never a mix.\n");
    } else {
        out.push_str("\nThe file was not modified.\n");
    }
    return out;
}

/// Show the `jira` section `report` needs.
fn render_tracker_not_configured() -> String {
    return format!("\
# Error: Issue Tracker Not Configured

`weasel report` needs a `jira` section in `{DEFAULT_CONFIG_FILE}`.

## Fix

    jira:
      base_url: https://your-site.atlassian.net
      project: KEY
");
}

/// List the issue types the tracker accepts.
fn render_unknown_issue_type(keyword: &str, issue_type: &str, allowed: &[&str]) -> String {
    let mut out = format!("\
# Error: Unknown Issue Type

Keyword `{keyword}` maps to `{issue_type}`, which the tracker does not accept.

## Accepted issue types

");
    for t in allowed {
        let _ = writeln!(out, "- `{t}`");
    }
    return out;
}
