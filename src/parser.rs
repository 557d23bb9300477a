//! Single-pass marker parser over one file's lines.

use std::path::Path;

use crate::classifier::{Classifier, LineKind, OpensLine};
use crate::marker::Marker;

/// Parser state between lines.
enum State {
    /// Inside a marker; continuation lines extend its body.
    InBody(Marker),
    /// Outside any marker.
    Scanning,
}

/// Extract every marker from `content`, in file order.
///
/// One forward pass, no backtracking. Nothing is carried between calls, so
/// the same classifier can be reused across files.
pub fn parse(
    content: &str,
    file_path: &Path,
    classifier: &Classifier,
    remote_addr: &str,
) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut state = State::Scanning;
    let mut line_no = 0_u32;

    for line in content.lines() {
        line_no = line_no.saturating_add(1);
        let kind = classifier.classify(line);

        state = match (state, kind) {
            (State::InBody(mut marker), LineKind::Continues(text)) => {
                marker.body.push(text.to_string());
                State::InBody(marker)
            },
            (State::InBody(marker), LineKind::Opens(opens)) => {
                markers.push(marker);
                State::InBody(start_marker(opens, file_path, line_no, classifier, remote_addr))
            },
            (State::InBody(marker), LineKind::Unrelated) => {
                markers.push(marker);
                State::Scanning
            },
            (State::Scanning, LineKind::Opens(opens)) => {
                State::InBody(start_marker(opens, file_path, line_no, classifier, remote_addr))
            },
            (State::Scanning, LineKind::Continues(_) | LineKind::Unrelated) => State::Scanning,
        };
    }

    if let State::InBody(marker) = state {
        markers.push(marker);
    }

    return markers;
}

/// Turn a matched title line into a marker with an empty body.
fn start_marker(
    opens: OpensLine,
    file_path: &Path,
    line: u32,
    classifier: &Classifier,
    remote_addr: &str,
) -> Marker {
    return Marker {
        body: Vec::new(),
        file_path: file_path.to_path_buf(),
        keyword: opens.keyword,
        line,
        pattern: opens.pattern,
        prefix: classifier.prefix().to_string(),
        priority: opens.priority,
        remote_addr: remote_addr.to_string(),
        status: opens.status,
        title: opens.title,
    };
}
