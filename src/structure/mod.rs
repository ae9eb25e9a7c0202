//! Structural parsing of book content.
//!
//! Content is read line by line with a single piece of state, the current
//! [`Zone`]. A synopsis or table-of-contents tag opens its zone, and only a
//! chapter header (or the end of the content) returns to the body. Parsing
//! never fails: text that fits no rule degrades to a paragraph.

mod classify;
pub mod markers;

pub use classify::{Classified, MAX_HEADER_CHARS, classify_line, is_chapter_header, is_dialogue};

use crate::model::{Book, Illustration};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum Zone {
    #[default]
    Body,
    Synopsis,
    TableOfContents,
}

/// A typed piece of content, derived on every parse and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[ts(export)]
pub enum Segment {
    #[serde(rename_all = "camelCase")]
    Paragraph {
        text: String,
        zone: Zone,
        dialogue: bool,
    },
    #[serde(rename_all = "camelCase")]
    ChapterHeader { text: String, anchor_id: String },
    #[serde(rename_all = "camelCase")]
    SectionHeader { zone: Zone },
    #[serde(rename_all = "camelCase")]
    TocEntry {
        text: String,
        target_anchor_id: String,
    },
    #[serde(rename_all = "camelCase")]
    IllustrationRef { illustration_id: String },
    /// Marker whose illustration is not in the book.
    #[serde(rename_all = "camelCase")]
    MissingIllustration { illustration_id: String },
    Spacer,
}

impl Segment {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Paragraph { .. } => "paragraph",
            Self::ChapterHeader { .. } => "chapterHeader",
            Self::SectionHeader { .. } => "sectionHeader",
            Self::TocEntry { .. } => "tocEntry",
            Self::IllustrationRef { .. } => "illustrationRef",
            Self::MissingIllustration { .. } => "missingIllustration",
            Self::Spacer => "spacer",
        }
    }

    /// Readable text carried by the segment, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Paragraph { text, .. }
            | Self::ChapterHeader { text, .. }
            | Self::TocEntry { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Source line a segment was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub line: usize,
    /// Byte range of the line in the content, line terminator (`\n` or
    /// `\r\n`) excluded.
    pub start: usize,
    pub end: usize,
}

/// Segments paired one-to-one with the line each came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub segments: Vec<Segment>,
    pub spans: Vec<LineSpan>,
    pub line_count: usize,
}

impl ParsedDocument {
    pub fn chapter_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::ChapterHeader { text, anchor_id } => Some((text.as_str(), anchor_id.as_str())),
            _ => None,
        })
    }

    pub fn toc_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::TocEntry {
                text,
                target_anchor_id,
            } => Some((text.as_str(), target_anchor_id.as_str())),
            _ => None,
        })
    }
}

/// Parse content, resolving illustration markers against `illustrations`.
pub fn parse_document(content: &str, illustrations: &[Illustration]) -> ParsedDocument {
    let known: HashSet<&str> = illustrations.iter().map(|ill| ill.id.as_str()).collect();
    let mut document = ParsedDocument::default();
    let mut zone = Zone::Body;
    let mut start = 0usize;

    for (line_idx, line) in content.split('\n').enumerate() {
        let text = line.strip_suffix('\r').unwrap_or(line);
        let span = LineSpan {
            line: line_idx,
            start,
            end: start + text.len(),
        };
        start += line.len() + 1;

        let classified = classify_line(line, zone);
        zone = classified.next_zone;
        for segment in classified.segments {
            document.segments.push(resolve_illustration(segment, &known));
            document.spans.push(span);
        }
        document.line_count = line_idx + 1;
    }

    debug!(
        lines = document.line_count,
        segments = document.segments.len(),
        "Parsed content"
    );
    document
}

pub fn parse_content(content: &str, illustrations: &[Illustration]) -> Vec<Segment> {
    parse_document(content, illustrations).segments
}

pub fn parse_book(book: &Book) -> ParsedDocument {
    parse_document(&book.content, &book.illustrations)
}

fn resolve_illustration(segment: Segment, known: &HashSet<&str>) -> Segment {
    match segment {
        Segment::IllustrationRef { illustration_id }
            if !known.contains(illustration_id.as_str()) =>
        {
            Segment::MissingIllustration { illustration_id }
        }
        other => other,
    }
}
