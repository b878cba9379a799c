//! Reconstruction of call stacks from free-form log text.
//!
//! The supported host loggers flatten call-stack information into the
//! message text itself, either as a `Stack trace:` block of numbered frames
//! or as a trailing `in /file:line` suffix. This module recovers structured
//! frames from those strings; it never inspects a live call stack.

use once_cell::sync::Lazy;
use regex::Regex;
use sentry_core::protocol::{Frame, Stacktrace};

/// File name recorded for matched frames without a usable location.
const INTERNAL_FRAME_FILENAME: &str = "[internal]";

static FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
          in\ (?P<file1>.+):(?P<line1>\d+)           # in /file.php:123
        | \((?P<file2>.+):(?P<line2>\d+)\)           # (/file.php:123)
        | in\ (?P<file3>[^(\n]+)\((?P<line3>\d+)\)   # in /file.php (123)
          # 0 /file.php(123): Class->method()
        | (?P<frameno>\d+)\ (?P<file4>[^(\n]+)\((?P<line4>\d+)\):\ (?P<class>[^\-\n]+)(?:->|::)(?P<function>[^(\n]+)
    ",
    )
    .unwrap()
});

static CALL_SITE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(in |\().*?:\d+\)?").unwrap());

/// Parses call-stack information out of free-form log text.
///
/// The text is only inspected when it contains the literal `Stack trace:`
/// marker or the substring `in /`; everything else returns `None` without
/// scanning. Four call-site shapes are recognized:
///
/// ```text
/// in /srv/app.php:42
/// (/srv/app.php:42)
/// in /srv/app.php (42)
/// #0 /srv/app.php(42): Controller->run()
/// ```
///
/// The supported loggers print the innermost call site first, so matches are
/// reversed to produce the oldest-first frame order events expect. Returns
/// `None` when the marker is present but no call site matches.
pub fn parse_stacktrace(text: &str) -> Option<Stacktrace> {
    if !text.contains("Stack trace:") && !text.contains("in /") {
        return None;
    }

    let mut frames = Vec::new();
    for captures in FRAME_RE.captures_iter(text) {
        let file = captures
            .name("file1")
            .or_else(|| captures.name("file2"))
            .or_else(|| captures.name("file3"))
            .or_else(|| captures.name("file4"))
            .map(|capture| capture.as_str().trim());
        let lineno = captures
            .name("line1")
            .or_else(|| captures.name("line2"))
            .or_else(|| captures.name("line3"))
            .or_else(|| captures.name("line4"))
            .and_then(|capture| capture.as_str().parse().ok())
            .unwrap_or(0);
        let abs_path = file.unwrap_or(INTERNAL_FRAME_FILENAME);

        frames.push(Frame {
            function: trimmed(captures.name("function")),
            module: trimmed(captures.name("class")),
            filename: Some(filename(abs_path).into()),
            abs_path: Some(abs_path.into()),
            lineno: Some(lineno),
            ..Default::default()
        });
    }

    Stacktrace::from_frames_reversed(frames)
}

/// Removes inline call-site suffixes from a single message line.
pub(crate) fn strip_call_sites(line: &str) -> String {
    CALL_SITE_RE.replace_all(line, "").trim_end().to_owned()
}

fn trimmed(capture: Option<regex::Match<'_>>) -> Option<String> {
    capture
        .map(|capture| capture.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(Into::into)
}

fn filename(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap()
}
