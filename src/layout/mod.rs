//! Vertical (tategaki) presentation of parsed content.
//!
//! [`render`] turns segments into a toolkit-neutral tree: text flows top to
//! bottom inside a column and columns advance from right to left. Stamps are
//! kept apart in an overlay that never takes part in reflow.

mod columns;
pub mod geometry;

pub use columns::{ColumnMetrics, ColumnPlan, PageSpan, plan_columns};
pub use geometry::FittedSize;

use crate::model::{Book, Illustration, Stamp};
use crate::structure::{self, Segment, Zone, markers};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};
use ts_rs::TS;

pub const EMPTY_PAGE_NOTICE: &str = "白紙です";
pub const STAMP_ROTATION_DEG: f32 = -12.0;

/// Viewport and typography the presentation is laid out for.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    /// Font size in px.
    pub font_size: f32,
    /// Column pitch as a multiple of the font size.
    pub line_spacing: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub illustration_max_width_ratio: f32,
    pub illustration_max_height_ratio: f32,
    pub spacer_width_em: f32,
    pub narration_indent_em: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            font_size: 18.0,
            line_spacing: 2.0,
            viewport_width: 1280.0,
            viewport_height: 800.0,
            illustration_max_width_ratio: 0.65,
            illustration_max_height_ratio: 0.5,
            spacer_width_em: 1.5,
            narration_indent_em: 1.0,
        }
    }
}

impl LayoutOptions {
    pub fn illustration_box(&self) -> (f32, f32) {
        (
            self.viewport_width * self.illustration_max_width_ratio,
            self.viewport_height * self.illustration_max_height_ratio,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum WritingMode {
    VerticalRl,
    HorizontalTb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ParagraphStyle {
    Narration,
    Dialogue,
    Synopsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ScrollAlign {
    Start,
    Center,
    End,
    Nearest,
}

/// Where activating a table-of-contents link scrolls to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScrollTarget {
    pub anchor_id: String,
    pub behavior: ScrollBehavior,
    pub inline: ScrollAlign,
}

impl ScrollTarget {
    pub fn chapter(anchor_id: impl Into<String>) -> Self {
        Self {
            anchor_id: anchor_id.into(),
            behavior: ScrollBehavior::Smooth,
            inline: ScrollAlign::Start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum Block {
    #[serde(rename_all = "camelCase")]
    Title { text: String },
    #[serde(rename_all = "camelCase")]
    Paragraph {
        text: String,
        style: ParagraphStyle,
        indent_em: f32,
        justified: bool,
    },
    #[serde(rename_all = "camelCase")]
    Heading { text: String, anchor_id: String },
    #[serde(rename_all = "camelCase")]
    SectionTitle { zone: Zone, label: String },
    #[serde(rename_all = "camelCase")]
    TocLink { text: String, target: ScrollTarget },
    /// Inline illustration; activating it opens the full-screen preview.
    #[serde(rename_all = "camelCase")]
    Figure {
        illustration_id: String,
        source: String,
        writing_mode: WritingMode,
        max_width: f32,
        max_height: f32,
        size: Option<FittedSize>,
    },
    #[serde(rename_all = "camelCase")]
    Placeholder {
        illustration_id: String,
        label: String,
    },
    #[serde(rename_all = "camelCase")]
    Spacer { width_em: f32 },
}

impl Block {
    pub fn anchor_id(&self) -> Option<&str> {
        match self {
            Block::Heading { anchor_id, .. } => Some(anchor_id),
            _ => None,
        }
    }
}

/// A stamp placed over the page, independent of the text flow.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StampOverlay {
    pub text: String,
    pub left: String,
    pub top: String,
    pub writing_mode: WritingMode,
    pub rotation_deg: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Presentation {
    pub title: String,
    pub writing_mode: WritingMode,
    pub blocks: Vec<Block>,
    pub overlay: Vec<StampOverlay>,
    #[ts(optional)]
    pub empty_notice: Option<String>,
}

impl Presentation {
    /// Index of the first block exposing `anchor_id`.
    pub fn block_of_anchor(&self, anchor_id: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| block.anchor_id() == Some(anchor_id))
    }
}

pub fn render_book(book: &Book, options: &LayoutOptions) -> Presentation {
    let document = structure::parse_book(book);
    render(
        &book.title,
        &document.segments,
        &book.illustrations,
        &book.stamps,
        options,
    )
}

/// Lay out segments for vertical reading. Pure: the same input always gives
/// the same tree.
pub fn render(
    title: &str,
    segments: &[Segment],
    illustrations: &[Illustration],
    stamps: &[Stamp],
    options: &LayoutOptions,
) -> Presentation {
    let images: HashMap<&str, &Illustration> = illustrations
        .iter()
        .map(|ill| (ill.id.as_str(), ill))
        .collect();
    let (max_width, max_height) = options.illustration_box();

    let mut blocks = Vec::with_capacity(segments.len() + 1);
    blocks.push(Block::Title {
        text: title.to_string(),
    });

    for segment in segments {
        let block = match segment {
            Segment::Paragraph {
                text,
                zone,
                dialogue,
            } => paragraph_block(text, *zone, *dialogue, options),
            Segment::ChapterHeader { text, anchor_id } => Block::Heading {
                text: text.clone(),
                anchor_id: anchor_id.clone(),
            },
            Segment::SectionHeader { zone } => Block::SectionTitle {
                zone: *zone,
                label: section_label(*zone).to_string(),
            },
            Segment::TocEntry {
                text,
                target_anchor_id,
            } => Block::TocLink {
                text: text.clone(),
                target: ScrollTarget::chapter(target_anchor_id.clone()),
            },
            Segment::IllustrationRef { illustration_id } => {
                match images.get(illustration_id.as_str()) {
                    Some(ill) => figure_block(ill, max_width, max_height),
                    None => placeholder_block(illustration_id),
                }
            }
            Segment::MissingIllustration { illustration_id } => {
                placeholder_block(illustration_id)
            }
            Segment::Spacer => Block::Spacer {
                width_em: options.spacer_width_em,
            },
        };
        trace!(kind = segment.kind(), "Laid out segment");
        blocks.push(block);
    }

    let empty_notice = segments
        .iter()
        .all(|segment| matches!(segment, Segment::Spacer))
        .then(|| EMPTY_PAGE_NOTICE.to_string());

    let overlay = stamps.iter().map(stamp_overlay).collect();

    debug!(blocks = blocks.len(), stamps = stamps.len(), "Rendered presentation");
    Presentation {
        title: title.to_string(),
        writing_mode: WritingMode::VerticalRl,
        blocks,
        overlay,
        empty_notice,
    }
}

fn paragraph_block(text: &str, zone: Zone, dialogue: bool, options: &LayoutOptions) -> Block {
    let (style, indent_em) = match (zone, dialogue) {
        (Zone::Synopsis, _) => (ParagraphStyle::Synopsis, 0.0),
        (_, true) => (ParagraphStyle::Dialogue, 0.0),
        (_, false) => (ParagraphStyle::Narration, options.narration_indent_em),
    };
    Block::Paragraph {
        text: text.to_string(),
        style,
        indent_em,
        justified: true,
    }
}

fn figure_block(ill: &Illustration, max_width: f32, max_height: f32) -> Block {
    let size = geometry::probe_dimensions(&ill.image_data)
        .and_then(|dims| geometry::fit_within(dims, max_width, max_height));
    Block::Figure {
        illustration_id: ill.id.clone(),
        source: ill.image_data.clone(),
        writing_mode: WritingMode::HorizontalTb,
        max_width,
        max_height,
        size,
    }
}

fn placeholder_block(illustration_id: &str) -> Block {
    Block::Placeholder {
        illustration_id: illustration_id.to_string(),
        label: markers::MISSING_ILLUSTRATION_LABEL.to_string(),
    }
}

fn section_label(zone: Zone) -> &'static str {
    match zone {
        Zone::Synopsis => markers::SYNOPSIS_TAG,
        Zone::TableOfContents => markers::TABLE_OF_CONTENTS_TAG,
        Zone::Body => "",
    }
}

fn stamp_overlay(stamp: &Stamp) -> StampOverlay {
    StampOverlay {
        text: stamp.text.clone(),
        left: stamp.x.css(),
        top: stamp.y.css(),
        writing_mode: WritingMode::HorizontalTb,
        rotation_deg: STAMP_ROTATION_DEG,
    }
}
