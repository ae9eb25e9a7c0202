//! Chapter anchors.
//!
//! Headers and table-of-contents entries are linked purely by text: both run
//! through [`anchor_id`], so an entry whose bullet-stripped text equals a
//! header's text always targets that header. Collisions between identical
//! headers are accepted; the first one in document order wins a lookup.
//!
//! [`AnchorIndex`] adds the mapping between byte offsets in the raw content
//! and the chapter anchors that cover them.

use crate::structure::{ParsedDocument, Segment};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use ts_rs::TS;

pub const ANCHOR_PREFIX: &str = "ch-";

static RE_NON_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9_\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}]+").unwrap()
});
static RE_TOC_BULLETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[・●\s]+").unwrap());

/// Anchor identifier for a chapter header's text.
///
/// Every run of characters outside ASCII word characters, hiragana, katakana
/// and the CJK unified block collapses to a single `-`. No case folding.
pub fn anchor_id(text: &str) -> String {
    let body = RE_NON_ANCHOR.replace_all(text, "-");
    format!("{ANCHOR_PREFIX}{body}")
}

pub fn strip_toc_bullets(text: &str) -> &str {
    match RE_TOC_BULLETS.find(text) {
        Some(found) => &text[found.end()..],
        None => text,
    }
}

/// Anchor targeted by a table-of-contents line.
pub fn toc_target(text: &str) -> String {
    anchor_id(strip_toc_bullets(text.trim_end()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AnchorEntry {
    pub anchor_id: String,
    pub text: String,
    /// Zero-based line in the content.
    pub line: usize,
    /// Byte offset of the header line's first byte.
    pub byte_offset: usize,
    pub segment_index: usize,
}

/// Chapter anchors of one document in content order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorIndex {
    entries: Vec<AnchorEntry>,
}

impl AnchorIndex {
    pub fn build(document: &ParsedDocument) -> Self {
        let entries = document
            .segments
            .iter()
            .zip(document.spans.iter())
            .enumerate()
            .filter_map(|(segment_index, (segment, span))| match segment {
                Segment::ChapterHeader { text, anchor_id } => Some(AnchorEntry {
                    anchor_id: anchor_id.clone(),
                    text: text.clone(),
                    line: span.line,
                    byte_offset: span.start,
                    segment_index,
                }),
                _ => None,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[AnchorEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First header carrying `anchor_id`.
    pub fn locate(&self, anchor_id: &str) -> Option<&AnchorEntry> {
        self.entries.iter().find(|entry| entry.anchor_id == anchor_id)
    }

    /// Chapter whose header precedes `offset`; `None` before the first header.
    pub fn chapter_at(&self, offset: usize) -> Option<&AnchorEntry> {
        let idx = self
            .entries
            .partition_point(|entry| entry.byte_offset <= offset);
        idx.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// Byte range covered by the chapter, ending at the next header or `content_len`.
    pub fn chapter_range(&self, anchor_id: &str, content_len: usize) -> Option<(usize, usize)> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.anchor_id == anchor_id)?;
        let start = self.entries[pos].byte_offset;
        let end = self
            .entries
            .get(pos + 1)
            .map(|next| next.byte_offset)
            .unwrap_or(content_len);
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::parse_document;

    #[test]
    fn header_text_maps_to_dashed_anchor() {
        assert_eq!(anchor_id("第1話 出発"), "ch-第1話-出発");
    }

    #[test]
    fn runs_of_punctuation_collapse_to_one_dash() {
        assert_eq!(anchor_id("第2話　「夜」と、朝"), "ch-第2話-夜-と-朝");
        assert_eq!(anchor_id("Chapter 3: The End"), "ch-Chapter-3-The-End");
    }

    #[test]
    fn full_width_digits_are_not_word_characters() {
        assert_eq!(anchor_id("第１話"), "ch-第-話");
    }

    #[test]
    fn anchors_are_case_sensitive() {
        assert_ne!(anchor_id("Prologue"), anchor_id("prologue"));
    }

    #[test]
    fn toc_bullets_are_stripped_before_anchoring() {
        assert_eq!(toc_target("・第1話 出発"), anchor_id("第1話 出発"));
        assert_eq!(toc_target("● 　第1話 出発"), anchor_id("第1話 出発"));
        assert_eq!(strip_toc_bullets("第1話"), "第1話");
    }

    #[test]
    fn offsets_resolve_to_enclosing_chapter() {
        let content = "前書き\n第1話 出発\n少年は旅に出た。\n第2話 帰還\n家に着いた。";
        let doc = parse_document(content, &[]);
        let index = AnchorIndex::build(&doc);
        assert_eq!(index.entries().len(), 2);

        assert!(index.chapter_at(0).is_none());
        let inside_first = content.find("少年").unwrap();
        assert_eq!(
            index.chapter_at(inside_first).map(|e| e.anchor_id.as_str()),
            Some("ch-第1話-出発")
        );
        let inside_second = content.find("家に").unwrap();
        assert_eq!(
            index.chapter_at(inside_second).map(|e| e.anchor_id.as_str()),
            Some("ch-第2話-帰還")
        );
    }

    #[test]
    fn anchors_resolve_back_to_their_offsets() {
        let content = "第1話 出発\n本文\n第2話 帰還\n終わり";
        let doc = parse_document(content, &[]);
        let index = AnchorIndex::build(&doc);

        let second = index.locate("ch-第2話-帰還").unwrap();
        assert_eq!(second.line, 2);
        assert_eq!(&content[second.byte_offset..], "第2話 帰還\n終わり");
        assert_eq!(
            index.chapter_at(second.byte_offset).map(|e| e.line),
            Some(2)
        );
        assert_eq!(
            index.chapter_range("ch-第1話-出発", content.len()),
            Some((0, second.byte_offset))
        );
        assert_eq!(
            index.chapter_range("ch-第2話-帰還", content.len()),
            Some((second.byte_offset, content.len()))
        );
    }

    #[test]
    fn duplicate_headers_resolve_to_the_first() {
        let doc = parse_document("第1話 再会\nA\n第1話 再会\nB", &[]);
        let index = AnchorIndex::build(&doc);
        assert_eq!(index.locate("ch-第1話-再会").map(|e| e.line), Some(0));
    }
}
