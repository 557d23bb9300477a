//! Version-control collaborator: stage and commit a rewritten file.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::Error;

/// Anything that can record a rewritten file in version control.
pub trait Committer {
    /// Stage `path` and commit it alone with `message`.
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionControl` if staging or committing fails. The
    /// file on disk is left as it is either way.
    fn stage_and_commit(&self, path: &Path, message: &str) -> Result<(), Error>;
}

/// Commits through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCommitter {
    /// Directory git runs in.
    workdir: PathBuf,
}

impl GitCommitter {
    /// Commit inside the repository containing `workdir`.
    pub fn new(workdir: &Path) -> Self {
        return Self {
            workdir: workdir.to_path_buf(),
        };
    }

    /// Run one git subcommand and fail with its stderr on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionControl` if git cannot be spawned or exits non-zero.
    fn run(&self, args: &[&std::ffi::OsStr]) -> Result<(), Error> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| {
                return Error::VersionControl {
                    reason: format!("failed to run git: {e}"),
                };
            })?;

        if !output.status.success() {
            let verb = args.first().map(|a| return a.to_string_lossy()).unwrap_or_default();
            return Err(Error::VersionControl {
                reason: format!(
                    "git {verb} failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        return Ok(());
    }
}

impl Committer for GitCommitter {
    fn stage_and_commit(&self, path: &Path, message: &str) -> Result<(), Error> {
        let path = path.as_os_str();
        self.run(&["add".as_ref(), "--".as_ref(), path])?;
        self.run(&["commit".as_ref(), "-m".as_ref(), message.as_ref(), "--".as_ref(), path])?;
        tracing::info!(path = %Path::new(path).display(), commit_message = message, "committed");
        return Ok(());
    }
}

/// Leaves rewritten files uncommitted (`--no-commit`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommit;

impl Committer for NoCommit {
    fn stage_and_commit(&self, path: &Path, _message: &str) -> Result<(), Error> {
        tracing::debug!(path = %path.display(), "commit skipped");
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_failure_is_a_version_control_error() {
        // `git add` of a missing path fails inside or outside a repository.
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing.txt");

        let err = GitCommitter::new(dir.path())
            .stage_and_commit(&file, "msg")
            .unwrap_err();
        assert!(matches!(err, Error::VersionControl { .. }));
    }

    #[test]
    fn no_commit_always_succeeds() {
        assert!(NoCommit.stage_and_commit(Path::new("missing"), "msg").is_ok());
    }
}
