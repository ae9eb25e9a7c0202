//! Per-line classification.

use super::markers::{self, SYNOPSIS_TAG, TABLE_OF_CONTENTS_TAG};
use super::{Segment, Zone};
use crate::anchor;
use once_cell::sync::Lazy;
use regex::Regex;

/// Chapter headers are short lines; anything this long is prose.
pub const MAX_HEADER_CHARS: usize = 40;

const DIALOGUE_OPENERS: [char; 4] = ['「', '『', '（', '【'];

static RE_CHAPTER_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"第[0-9０-９〇零一二三四五六七八九十百千]+[話章]",
        r"|タイトル",
        r"|Title\s*[:：]",
        r"|[0-9]+[話章.]",
        r"|(?i:chapter)\s+[0-9]+",
        r")"
    ))
    .unwrap()
});

/// Segments produced by one line and the zone the next line starts in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub segments: Vec<Segment>,
    pub next_zone: Zone,
}

impl Classified {
    fn single(segment: Segment, next_zone: Zone) -> Self {
        Self {
            segments: vec![segment],
            next_zone,
        }
    }
}

/// Classify one raw line given the zone it is read in.
///
/// Rules apply in priority order: blank, illustration marker, synopsis tag,
/// table-of-contents tag, chapter header, then a zone-dependent fallback.
/// Illustration markers always come back as [`Segment::IllustrationRef`];
/// whether the id exists is decided by the caller that knows the book.
/// Never fails and always yields at least one segment.
pub fn classify_line(line: &str, zone: Zone) -> Classified {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Classified::single(Segment::Spacer, zone);
    }

    let found = markers::find_illustration_markers(trimmed);
    if !found.is_empty() {
        let mut segments = Vec::with_capacity(found.len() * 2 + 1);
        let mut cursor = 0;
        for marker in found {
            push_fragment(&mut segments, &trimmed[cursor..marker.start], zone);
            segments.push(Segment::IllustrationRef {
                illustration_id: marker.id.to_string(),
            });
            cursor = marker.end;
        }
        push_fragment(&mut segments, &trimmed[cursor..], zone);
        return Classified { segments, next_zone: zone };
    }

    if trimmed.contains(SYNOPSIS_TAG) {
        return Classified::single(
            Segment::SectionHeader {
                zone: Zone::Synopsis,
            },
            Zone::Synopsis,
        );
    }
    if trimmed.contains(TABLE_OF_CONTENTS_TAG) {
        return Classified::single(
            Segment::SectionHeader {
                zone: Zone::TableOfContents,
            },
            Zone::TableOfContents,
        );
    }

    if is_chapter_header(trimmed) {
        return Classified::single(
            Segment::ChapterHeader {
                text: trimmed.to_string(),
                anchor_id: anchor::anchor_id(trimmed),
            },
            Zone::Body,
        );
    }

    Classified::single(fallback(trimmed, zone), zone)
}

pub fn is_chapter_header(trimmed: &str) -> bool {
    trimmed.chars().count() < MAX_HEADER_CHARS && RE_CHAPTER_HEADER.is_match(trimmed)
}

pub fn is_dialogue(trimmed: &str) -> bool {
    trimmed
        .chars()
        .next()
        .is_some_and(|first| DIALOGUE_OPENERS.contains(&first))
}

fn push_fragment(segments: &mut Vec<Segment>, fragment: &str, zone: Zone) {
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        segments.push(fallback(fragment, zone));
    }
}

fn fallback(text: &str, zone: Zone) -> Segment {
    match zone {
        Zone::TableOfContents => Segment::TocEntry {
            text: text.to_string(),
            target_anchor_id: anchor::toc_target(text),
        },
        Zone::Synopsis => Segment::Paragraph {
            text: text.to_string(),
            zone: Zone::Synopsis,
            dialogue: false,
        },
        Zone::Body => Segment::Paragraph {
            text: text.to_string(),
            zone: Zone::Body,
            dialogue: is_dialogue(text),
        },
    }
}
