//! Inline markers recognised inside book content.

use once_cell::sync::Lazy;
use regex::Regex;

pub const SYNOPSIS_TAG: &str = "【あらすじ】";
pub const TABLE_OF_CONTENTS_TAG: &str = "【目次】";
pub const MISSING_ILLUSTRATION_LABEL: &str = "[挿絵なし]";

static RE_ILLUSTRATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:挿絵|illustration)[:：]\s*([^\]\s][^\]\n]*?)\s*\]").unwrap());
static RE_ILLUSTRATION_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n*[ \t\x{3000}]*\[(?:挿絵|illustration)[:：][^\]\n]*\][ \t\x{3000}]*\n*").unwrap()
});

/// One illustration marker found in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch<'a> {
    pub id: &'a str,
    pub start: usize,
    pub end: usize,
}

pub fn find_illustration_markers(line: &str) -> Vec<MarkerMatch<'_>> {
    RE_ILLUSTRATION
        .captures_iter(line)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = caps.get(1)?;
            Some(MarkerMatch {
                id: id.as_str(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

pub fn contains_illustration_marker(line: &str) -> bool {
    RE_ILLUSTRATION.is_match(line)
}

/// The canonical marker written into content for an illustration id.
pub fn illustration_marker(id: &str) -> String {
    format!("[挿絵:{id}]")
}

/// Marker surrounded by blank lines, as appended after generation.
pub fn illustration_block(id: &str) -> String {
    format!("\n\n{}\n\n", illustration_marker(id))
}

/// Remove every illustration marker along with the blank lines around it.
pub fn strip_illustration_markers(content: &str) -> String {
    RE_ILLUSTRATION_BLOCK.replace_all(content, "\n").into_owned()
}
