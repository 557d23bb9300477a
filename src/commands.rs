//! CLI commands for weasel: list, report, purge.
//!
//! Files are processed one at a time. After every mutation the file is parsed
//! again, so no marker is ever rewritten using a line number that an earlier
//! rewrite of the same file made stale.

use std::collections::BTreeSet;
use std::io::IsTerminal as _;
use std::path::Path;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::Error;
use crate::marker::Marker;
use crate::mutator::{self, Operation};
use crate::scanner;
use crate::tracker::{IssueDraft, IssueTracker};
use crate::vcs::Committer;

const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const MAGENTA: &str = "\x1b[35m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Outcome of a marker whose file was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewritten {
    /// The rewrite stays on disk but the commit failed.
    CommitFailed,
    /// The commit collaborator recorded the change.
    Committed,
}

/// Tally of a `report` or `purge` run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Markers rewritten on disk whose commit then failed.
    pub commit_failures: usize,
    /// Markers skipped because of an error; their files are untouched.
    pub failed: usize,
    /// Requested issue keys no marker carries (`purge` only).
    pub missing: Vec<String>,
    /// Markers rewritten on disk.
    pub rewritten: usize,
}

impl Summary {
    /// Whether every selected marker was rewritten and committed.
    pub fn is_clean(&self) -> bool {
        return self.failed == 0 && self.commit_failures == 0 && self.missing.is_empty();
    }

    /// Count a marker skipped because of an error.
    fn record_failure(&mut self) {
        self.failed = self.failed.saturating_add(1);
    }

    /// Count a marker rewritten on disk.
    fn record_rewrite(&mut self, rewritten: Rewritten) {
        self.rewritten = self.rewritten.saturating_add(1);
        if rewritten == Rewritten::CommitFailed {
            self.commit_failures = self.commit_failures.saturating_add(1);
        }
    }
}

/// Build the classifier for a validated config.
///
/// # Errors
///
/// Returns `Error::InvalidKeyword` if the prefix or a keyword is unusable.
pub fn classifier_for(config: &Config) -> Result<Classifier, Error> {
    return Classifier::new(&config.prefix, &config.keyword_names());
}

/// Hand a rewritten file to the committer. Failure is printed, never propagated.
fn commit_rewrite(committer: &dyn Committer, root: &Path, marker: &Marker, message: &str) -> Rewritten {
    return match committer.stage_and_commit(&marker.file_path, message) {
        Ok(()) => Rewritten::Committed,
        Err(e) => {
            tracing::warn!(path = %marker.file_path.display(), error = %e, "commit failed");
            eprintln!(
                "warning: {}:{}: {}: rewritten but not committed: {e}",
                display_path(root, &marker.file_path),
                marker.line,
                marker.keyword,
            );
            Rewritten::CommitFailed
        },
    };
}

/// Path relative to `root` for output, falling back to the path as given.
fn display_path(root: &Path, path: &Path) -> String {
    return path.strip_prefix(root).unwrap_or(path).display().to_string();
}

/// Print every marker under `root` with its reporting status.
///
/// # Errors
///
/// Returns errors from classifier construction or file reading.
pub fn list(root: &Path, config: &Config) -> Result<(), Error> {
    let classifier = classifier_for(config)?;
    let grouped = scanner::scan(root, config, &classifier)?;
    let color = std::io::stdout().is_terminal();

    let mut total = 0_usize;
    let mut unreported = 0_usize;
    for marker in grouped.values().flatten() {
        total = total.saturating_add(1);
        if !marker.status.is_reported() {
            unreported = unreported.saturating_add(1);
        }
        print!("{}", render_status(root, marker, color));
    }

    println!("{total} markers, {unreported} unreported");
    return Ok(());
}

/// Wrap `text` in an ANSI color when `enabled`.
fn paint(code: &str, text: &str, enabled: bool) -> String {
    if enabled {
        return format!("{code}{text}{RESET}");
    }
    return text.to_string();
}

/// Run `action` on every marker in `path` that `select` picks.
///
/// The file is re-parsed before each marker. A marker whose action succeeds
/// no longer matches `select` (it is now reported, or gone); one whose action
/// fails is skipped on the next pass. Each initially selected marker is
/// attempted exactly once.
///
/// A file that cannot be read counts as one failure and the run moves on to
/// the next file.
fn process_file<S, A>(
    root: &Path,
    path: &Path,
    classifier: &Classifier,
    config: &Config,
    select: S,
    mut action: A,
    summary: &mut Summary,
) where
    S: Fn(&Marker) -> bool,
    A: FnMut(Marker) -> Result<Rewritten, Error>,
{
    let rescan = |summary: &mut Summary| {
        return scanner::scan_file(path, classifier, &config.repo_url).map_err(|e| {
            let location = display_path(root, path);
            tracing::warn!(%location, error = %e, "file skipped");
            eprintln!("error: {location}: {e}");
            summary.record_failure();
        });
    };

    let Ok(initial) = rescan(summary) else {
        return;
    };
    let attempts = initial.iter().filter(|&m| return select(m)).count();
    let mut skip = 0_usize;

    for _ in 0..attempts {
        let Ok(markers) = rescan(summary) else {
            return;
        };
        let Some(marker) = markers.into_iter().filter(|m| return select(m)).nth(skip) else {
            break;
        };

        let location = format!("{}:{}", display_path(root, path), marker.line);
        let keyword = marker.keyword.clone();
        match action(marker) {
            Ok(rewritten) => summary.record_rewrite(rewritten),
            Err(e) => {
                tracing::warn!(%location, %keyword, error = %e, "marker skipped");
                eprintln!("error: {location}: {keyword}: {e}");
                skip = skip.saturating_add(1);
                summary.record_failure();
            },
        }
    }
}

/// Remove every marker reported under one of `ids`, title and body.
///
/// # Errors
///
/// Returns errors from classifier construction or file reading. Per-marker
/// failures are printed and counted in the summary instead.
pub fn purge(
    root: &Path,
    config: &Config,
    ids: &[String],
    committer: &dyn Committer,
) -> Result<Summary, Error> {
    let classifier = classifier_for(config)?;
    let wanted: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
    let selected = |m: &Marker| return m.status.id().is_some_and(|id| return wanted.contains(id));

    let grouped = scanner::scan(root, config, &classifier)?;
    let found: BTreeSet<&str> = grouped
        .values()
        .flatten()
        .filter_map(|m| return m.status.id())
        .filter(|id| return wanted.contains(id))
        .collect();

    let mut summary = Summary {
        missing: wanted
            .difference(&found)
            .map(ToString::to_string)
            .collect(),
        ..Summary::default()
    };
    for id in &summary.missing {
        eprintln!("warning: no marker is reported as {id}");
    }

    for path in grouped.keys() {
        process_file(
            root,
            path,
            &classifier,
            config,
            selected,
            |marker| return purge_marker(root, &marker, committer),
            &mut summary,
        );
    }

    return Ok(summary);
}

/// Purge one reported marker and commit the result.
///
/// # Errors
///
/// Returns mutation errors; the file is untouched in that case.
fn purge_marker(root: &Path, marker: &Marker, committer: &dyn Committer) -> Result<Rewritten, Error> {
    let id = marker.status.id().unwrap_or_default();
    mutator::apply(marker, Operation::Purge)?;
    tracing::info!(path = %marker.file_path.display(), line = marker.line, id, "purged marker");
    println!(
        "purged {} {id} from {}:{}",
        marker.keyword,
        display_path(root, &marker.file_path),
        marker.line
    );

    let message = format!("Purge {} {id}: {}", marker.keyword, marker.title);
    return Ok(commit_rewrite(committer, root, marker, &message));
}

/// Render the two-line status block `list` prints for one marker.
fn render_status(root: &Path, marker: &Marker, color: bool) -> String {
    let tag = match marker.status.id() {
        Some(id) => paint(GREEN, id, color),
        None => paint(RED, "UNREPORTED", color),
    };
    let location = format!("{}:{}", display_path(root, &marker.file_path), marker.line);
    let mut out = format!(" [{tag}] {}\n [{}]", marker.display_line(), paint(CYAN, &location, color));
    if !marker.remote_addr.is_empty() {
        out.push_str(&format!(" [{}]", paint(MAGENTA, &marker.remote_addr, color)));
    }
    out.push_str("\n\n");
    return out;
}

/// File an issue for every unreported marker, embed the key, and commit.
///
/// # Errors
///
/// Returns errors from classifier construction or file reading. Tracker,
/// mutation and commit failures are per marker: printed, counted, and
/// processing continues.
pub fn report(
    root: &Path,
    config: &Config,
    tracker: &dyn IssueTracker,
    committer: &dyn Committer,
) -> Result<Summary, Error> {
    let classifier = classifier_for(config)?;
    let mut summary = Summary::default();
    let unreported = |m: &Marker| return !m.status.is_reported();

    for path in scanner::scan(root, config, &classifier)?.keys() {
        process_file(
            root,
            path,
            &classifier,
            config,
            unreported,
            |marker| return report_marker(root, config, marker, tracker, committer),
            &mut summary,
        );
    }

    return Ok(summary);
}

/// Create the issue for one marker, write its key into the file, commit.
///
/// # Errors
///
/// Returns `Error::IssueTracker` if no issue was created, or a mutation error
/// if the issue exists but the file could not be rewritten.
fn report_marker(
    root: &Path,
    config: &Config,
    mut marker: Marker,
    tracker: &dyn IssueTracker,
    committer: &dyn Committer,
) -> Result<Rewritten, Error> {
    let issue_type = config.issue_type_for(&marker.keyword).ok_or_else(|| {
        return Error::InvalidKeyword {
            keyword: marker.keyword.clone(),
            reason: "no issue type configured".to_string(),
        };
    })?;
    let draft = IssueDraft::from_marker(&marker, &issue_type);
    let key = tracker.create_issue(&draft)?;
    marker.mark_reported(key.as_str())?;

    if let Err(e) = mutator::apply(&marker, Operation::UpdateInPlace) {
        eprintln!("note: issue {key} was created; add it to the marker by hand");
        return Err(e);
    }
    print!("{}", render_status(root, &marker, std::io::stdout().is_terminal()));

    let message = format!("Report {} as {key}: {}", marker.keyword, marker.title);
    return Ok(commit_rewrite(committer, root, &marker, &message));
}
