//! Atomic in-place rewriting of a marker's origin file.
//!
//! The origin is streamed into a temp file in the same directory, the
//! origin's permission bits are copied over, and the temp file is renamed on
//! top of the origin. A failure before the rename drops the temp file and
//! leaves the origin untouched.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, MutationStage};
use crate::marker::Marker;

/// What to do with the marker's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Drop the title line and every body line.
    Purge,
    /// Replace the title line with its rendered form; keep the body.
    UpdateInPlace,
}

/// A fully written temp file waiting to be renamed over its origin.
/// Dropping it without calling `commit` discards the rewrite.
#[derive(Debug)]
pub struct StagedRewrite {
    /// Resolved path of the file being replaced.
    origin: PathBuf,
    /// Rewritten content with the origin's permissions applied.
    temp: NamedTempFile,
}

impl StagedRewrite {
    /// Rename the temp file over the origin. The rename is a single
    /// filesystem operation, so the origin is either old or new afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Error::Mutation` with `MutationStage::Rename` if the rename fails.
    pub fn commit(self) -> Result<(), Error> {
        tracing::debug!(temp = %self.temp_path().display(), "renaming over origin");
        let Self { origin, temp } = self;
        temp.persist(&origin).map_err(|e| {
            return Error::Mutation {
                path: origin.clone(),
                source: e.error,
                stage: MutationStage::Rename,
            };
        })?;
        tracing::debug!(path = %origin.display(), "rewrite committed");
        return Ok(());
    }

    /// Path of the staged temp file.
    pub fn temp_path(&self) -> &Path {
        return self.temp.path();
    }
}

/// Stage and commit in one step.
///
/// # Errors
///
/// Returns `Error::StaleMarker` if the file no longer holds the marker at its
/// recorded line, or `Error::Mutation` naming the protocol step that failed.
pub fn apply(marker: &Marker, op: Operation) -> Result<(), Error> {
    return stage(marker, op)?.commit();
}

/// Whether a line on disk is still body line `index` of `marker`.
fn body_line_matches(marker: &Marker, index: usize, line: &str) -> bool {
    let Some(expected) = marker.body.get(index) else {
        return false;
    };
    let line = line.trim_end_matches(['\r', '\n']);
    return line
        .strip_prefix(marker.prefix.as_str())
        .is_some_and(|rest| return rest.trim() == expected);
}

/// The terminator `line` ends with: `\r\n`, `\n`, or nothing on a final unterminated line.
fn line_ending(line: &[u8]) -> &'static [u8] {
    if line.ends_with(b"\r\n") {
        return b"\r\n";
    }
    if line.ends_with(b"\n") {
        return b"\n";
    }
    return b"";
}

/// Build an `Error::Mutation` for `path` at `stage`.
fn mutation_error(path: &Path, stage: MutationStage) -> impl FnOnce(std::io::Error) -> Error + '_ {
    return move |source| {
        return Error::Mutation {
            path: path.to_path_buf(),
            source,
            stage,
        };
    };
}

/// Copy `reader` to `writer` byte for byte, except for the marker's lines.
///
/// # Errors
///
/// Returns `Error::StaleMarker` if the marker's lines are not where the marker
/// says they are, or `Error::Mutation` (`Stream`) on read/write failure.
fn rewrite_lines<R: BufRead, W: Write>(
    marker: &Marker,
    op: Operation,
    path: &Path,
    mut reader: R,
    mut writer: W,
) -> Result<(), Error> {
    let stale = || {
        return Error::StaleMarker {
            file: marker.file_path.clone(),
            keyword: marker.keyword.clone(),
            line: marker.line,
        };
    };
    let title_line = usize::try_from(marker.line).map_err(|_err| return stale())?;
    let last_body_line = title_line.saturating_add(marker.span()).saturating_sub(1);

    let mut buf = Vec::new();
    let mut line_no = 0_usize;
    let mut saw_title = false;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(mutation_error(path, MutationStage::Stream))?;
        if read == 0 {
            break;
        }
        line_no = line_no.saturating_add(1);

        if line_no == title_line {
            if !marker.matches_title_line(&String::from_utf8_lossy(&buf)) {
                return Err(stale());
            }
            saw_title = true;
            if op == Operation::UpdateInPlace {
                writer
                    .write_all(marker.render_title_line().as_bytes())
                    .and_then(|()| return writer.write_all(line_ending(&buf)))
                    .map_err(mutation_error(path, MutationStage::Stream))?;
            }
            continue;
        }

        if op == Operation::Purge && line_no > title_line && line_no <= last_body_line {
            let index = line_no.saturating_sub(title_line).saturating_sub(1);
            if !body_line_matches(marker, index, &String::from_utf8_lossy(&buf)) {
                return Err(stale());
            }
            continue;
        }

        writer
            .write_all(&buf)
            .map_err(mutation_error(path, MutationStage::Stream))?;
    }

    if !saw_title || (op == Operation::Purge && line_no < last_body_line) {
        return Err(stale());
    }

    writer.flush().map_err(mutation_error(path, MutationStage::Stream))?;
    return Ok(());
}

/// Write the rewritten file to a temp file beside the origin, with the
/// origin's permissions, without touching the origin.
///
/// Update replaces line `marker.line` with `marker.render_title_line()`,
/// keeping that line's terminator. Purge drops lines
/// `marker.line ..= marker.line + marker.body.len()`.
///
/// # Errors
///
/// Returns `Error::StaleMarker` if the marker's lines changed since parsing,
/// or `Error::Mutation` with the failing `MutationStage`.
pub fn stage(marker: &Marker, op: Operation) -> Result<StagedRewrite, Error> {
    let origin = fs::canonicalize(&marker.file_path)
        .map_err(mutation_error(&marker.file_path, MutationStage::OpenOrigin))?;
    let permissions = fs::metadata(&origin)
        .map_err(mutation_error(&origin, MutationStage::OpenOrigin))?
        .permissions();
    let source = File::open(&origin).map_err(mutation_error(&origin, MutationStage::OpenOrigin))?;

    let dir = origin.parent().unwrap_or_else(|| return Path::new("/"));
    let mut temp = tempfile::Builder::new()
        .prefix(".weasel-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(mutation_error(&origin, MutationStage::CreateTemp))?;
    tracing::debug!(
        path = %origin.display(),
        temp = %temp.path().display(),
        line = marker.line,
        ?op,
        "staging rewrite"
    );

    rewrite_lines(
        marker,
        op,
        &origin,
        BufReader::new(source),
        BufWriter::new(temp.as_file_mut()),
    )?;

    temp.as_file()
        .sync_all()
        .map_err(mutation_error(&origin, MutationStage::Stream))?;
    temp.as_file()
        .set_permissions(permissions)
        .map_err(mutation_error(&origin, MutationStage::CopyPermissions))?;

    return Ok(StagedRewrite { origin, temp });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::classifier::Classifier;
    use crate::parser;

    fn write_fixture(dir: &Path, content: &[u8]) -> PathBuf {
        let path = dir.join("main.go");
        fs::write(&path, content).unwrap();
        return path;
    }

    fn markers_in(path: &Path) -> Vec<Marker> {
        let classifier = Classifier::new("// ", &["TODO", "FIXME"]).unwrap();
        let content = fs::read_to_string(path).unwrap();
        return parser::parse(&content, path, &classifier, "");
    }

    #[test]
    fn update_embeds_issue_key_and_keeps_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), b"// TODO: fix parsing\n// more context\nx := 1\n");

        let mut marker = markers_in(&path).remove(0);
        marker.mark_reported("PROJ-42").unwrap();
        apply(&marker, Operation::UpdateInPlace).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "// TODO P0 (PROJ-42): fix parsing\n// more context\nx := 1\n"
        );
    }

    #[test]
    fn purge_removes_title_and_body_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), b"// TODO: fix parsing\n// more context\nx := 1\n");

        let marker = markers_in(&path).remove(0);
        apply(&marker, Operation::Purge).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "x := 1\n");
    }

    #[test]
    fn purge_keeps_neighbours_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            b"package main\n// FIXME P1: a\n// b\n// c\nfunc f() {}\n// TODO: keep me\n",
        );

        let marker = markers_in(&path).remove(0);
        assert_eq!(marker.span(), 3);
        apply(&marker, Operation::Purge).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "package main\nfunc f() {}\n// TODO: keep me\n"
        );
    }

    #[test]
    fn update_without_key_rewrites_to_canonical_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), b"// TODO: a\n");

        let marker = markers_in(&path).remove(0);
        apply(&marker, Operation::UpdateInPlace).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "// TODO P0: a\n");
    }

    #[test]
    fn line_endings_and_non_ascii_text_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "s := \"caf\u{e9} \u{1f980}\"\r\n// TODO: crlf\r\n// body \u{2014} d\u{e9}tail\r\nend".as_bytes(),
        );

        let mut marker = markers_in(&path).remove(0);
        marker.mark_reported("X-1").unwrap();
        apply(&marker, Operation::UpdateInPlace).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "s := \"caf\u{e9} \u{1f980}\"\r\n// TODO P0 (X-1): crlf\r\n// body \u{2014} d\u{e9}tail\r\nend"
        );
    }

    #[test]
    fn dropped_stage_leaves_origin_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let original = b"// TODO: fix parsing\n// more context\nx := 1\n";
        let path = write_fixture(dir.path(), original);

        let marker = markers_in(&path).remove(0);
        let staged = stage(&marker, Operation::Purge).unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        assert!(temp_path.exists());
        assert_eq!(temp_path.parent(), fs::canonicalize(dir.path()).ok().as_deref());

        // Simulates the process dying between write and rename.
        drop(staged);

        assert_eq!(fs::read(&path).unwrap(), original);
        assert!(!temp_path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn stale_title_line_aborts_without_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), b"// TODO: a\n// TODO: b\n");

        let markers = markers_in(&path);
        apply(&markers[0], Operation::Purge).unwrap();
        let after_first = fs::read(&path).unwrap();

        // markers[1] still points at line 2, which no longer exists.
        let err = apply(&markers[1], Operation::Purge).unwrap_err();
        assert!(matches!(err, Error::StaleMarker { line: 2, .. }));
        assert_eq!(fs::read(&path).unwrap(), after_first);
    }

    #[test]
    fn stale_body_aborts_purge() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), b"// TODO: a\n// old body\nx\n");
        let marker = markers_in(&path).remove(0);

        fs::write(&path, b"// TODO: a\n// new body\nx\n").unwrap();
        let err = apply(&marker, Operation::Purge).unwrap_err();
        assert!(matches!(err, Error::StaleMarker { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"// TODO: a\n// new body\nx\n");
    }

    #[test]
    fn missing_origin_is_an_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), b"// TODO: a\n");
        let marker = markers_in(&path).remove(0);
        fs::remove_file(&path).unwrap();

        let err = apply(&marker, Operation::UpdateInPlace).unwrap_err();
        assert!(matches!(
            err,
            Error::Mutation {
                stage: MutationStage::OpenOrigin,
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn permission_bits_are_preserved() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), b"#!/bin/sh\n// TODO: a\n");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o754)).unwrap();

        let mut marker = markers_in(&path).remove(0);
        marker.mark_reported("OPS-9").unwrap();
        apply(&marker, Operation::UpdateInPlace).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o754);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\n// TODO P0 (OPS-9): a\n");
    }
}
