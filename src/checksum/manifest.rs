// SPDX-License-Identifier: GPL-3.0-only
use regex::Regex;
use std::io::BufRead;
use std::sync::LazyLock;

/// One `filename -> checksum` pair recognized on a manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry<'a> {
    pub filename: &'a str,
    pub checksum: &'a str,
}

/// A single manifest dialect. Returns `None` when the line is not written in it.
pub type LineMatcher = fn(&str) -> Option<ManifestEntry<'_>>;

// "CHECKSUM filename", "CHECKSUM *filename"
static BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<checksum>[A-Fa-f0-9]+)\s+\*?(?P<filename>.+?)\s*$")
        .expect("static regex")
});

// "algo: CHECKSUM filename"
static LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\w+:?\s*(?P<checksum>[A-Fa-f0-9]+)\s+\*?(?P<filename>.+?)\s*$")
        .expect("static regex")
});

// "ALGO(filename) = CHECKSUM", "ALGO (filename) = CHECKSUM"
static BSD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\w+\s*\(\s*(?P<filename>.+?)\s*\)\s*=\s*(?P<checksum>[A-Fa-f0-9]+)\s*$")
        .expect("static regex")
});

/// Dialects in the order they are tried on every line.
pub const MATCHERS: [LineMatcher; 3] = [match_bare, match_labelled, match_bsd];

fn capture<'a>(re: &Regex, line: &'a str) -> Option<ManifestEntry<'a>> {
    let caps = re.captures(line)?;
    Some(ManifestEntry {
        filename: caps.name("filename")?.as_str(),
        checksum: caps.name("checksum")?.as_str(),
    })
}

/// `sha256sum` style output
pub fn match_bare(line: &str) -> Option<ManifestEntry<'_>> {
    capture(&BARE, line)
}

/// Bare form with a leading label such as `md5:`
pub fn match_labelled(line: &str) -> Option<ManifestEntry<'_>> {
    capture(&LABELLED, line)
}

/// BSD `digest` / `sha256 -r` style output
pub fn match_bsd(line: &str) -> Option<ManifestEntry<'_>> {
    capture(&BSD, line)
}

/// Find the checksum recorded for `filename` in a single line, trying each dialect in order.
pub fn match_line<'a>(line: &'a str, filename: &str) -> Option<&'a str> {
    MATCHERS
        .iter()
        .filter_map(|matcher| matcher(line))
        .find(|entry| entry.filename == filename && !entry.checksum.is_empty())
        .map(|entry| entry.checksum)
}

/// Scan a checksum manifest for the entry belonging to `filename`.
///
/// Lines that do not follow any known dialect are skipped. `Ok(None)` means the
/// manifest was read completely without finding the file; only read errors are
/// reported as `Err`.
pub fn resolve<R: BufRead>(manifest: R, filename: &str) -> std::io::Result<Option<String>> {
    for line in manifest.lines() {
        let line = line?;
        if let Some(checksum) = match_line(&line, filename) {
            return Ok(Some(checksum.to_string()));
        }
    }

    Ok(None)
}
