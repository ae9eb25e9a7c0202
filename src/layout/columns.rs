//! Column pagination for the vertical flow.
//!
//! The estimate is deliberately simple: a column holds a fixed number of
//! characters derived from the font size and viewport height, and a page is
//! as many columns as fit across the viewport. Blocks are never split; one
//! wider than a page gets a page of its own. Pages are numbered from the
//! right edge, where reading starts.

use super::{Block, LayoutOptions, Presentation};
use tracing::debug;

/// Share of the viewport height text may occupy in a column.
const COLUMN_FILL: f32 = 0.85;
const MIN_CHARS_PER_COLUMN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnMetrics {
    pub chars_per_column: usize,
    /// Horizontal advance of one column in px.
    pub column_pitch: f32,
    pub page_width: f32,
}

impl ColumnMetrics {
    pub fn from_options(options: &LayoutOptions) -> Self {
        let font_size = options.font_size.max(1.0);
        let chars_per_column = ((options.viewport_height * COLUMN_FILL) / font_size)
            .floor()
            .max(MIN_CHARS_PER_COLUMN as f32) as usize;
        let column_pitch = font_size * options.line_spacing.max(1.0);
        Self {
            chars_per_column,
            column_pitch,
            page_width: options.viewport_width.max(column_pitch),
        }
    }

    fn text_width(&self, chars: usize) -> f32 {
        let columns = chars.div_ceil(self.chars_per_column).max(1);
        columns as f32 * self.column_pitch
    }

    /// Horizontal extent of a block in px.
    pub fn block_width(&self, block: &Block, font_size: f32) -> f32 {
        match block {
            Block::Title { text } => self.text_width(text.chars().count()) + self.column_pitch,
            Block::Paragraph {
                text, indent_em, ..
            } => {
                let indent = indent_em.ceil().max(0.0) as usize;
                self.text_width(text.chars().count() + indent)
            }
            Block::Heading { text, .. } => self.text_width(text.chars().count()) + self.column_pitch,
            Block::SectionTitle { label, .. } => self.text_width(label.chars().count()),
            Block::TocLink { text, .. } => self.text_width(text.chars().count()),
            Block::Figure {
                size, max_width, ..
            } => size.map(|s| s.width).unwrap_or(*max_width) + self.column_pitch,
            Block::Placeholder { label, .. } => self.text_width(label.chars().count()),
            Block::Spacer { width_em } => width_em * font_size,
        }
    }
}

/// A run of blocks shown together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSpan {
    pub first_block: usize,
    /// One past the last block on the page.
    pub end_block: usize,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    pub metrics: ColumnMetrics,
    pub pages: Vec<PageSpan>,
    block_pages: Vec<usize>,
    /// Distance of each block's right edge from the start of the flow, in px.
    block_offsets: Vec<f32>,
}

impl ColumnPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_of_block(&self, block: usize) -> Option<usize> {
        self.block_pages.get(block).copied()
    }

    pub fn scroll_offset_of_block(&self, block: usize) -> Option<f32> {
        self.block_offsets.get(block).copied()
    }

    pub fn page_of_anchor(&self, presentation: &Presentation, anchor_id: &str) -> Option<usize> {
        presentation
            .block_of_anchor(anchor_id)
            .and_then(|block| self.page_of_block(block))
    }
}

pub fn plan_columns(presentation: &Presentation, options: &LayoutOptions) -> ColumnPlan {
    let metrics = ColumnMetrics::from_options(options);
    let mut pages = Vec::new();
    let mut block_pages = Vec::with_capacity(presentation.blocks.len());
    let mut block_offsets = Vec::with_capacity(presentation.blocks.len());

    let mut page_start = 0usize;
    let mut page_width = 0.0f32;
    let mut flow_offset = 0.0f32;

    for (idx, block) in presentation.blocks.iter().enumerate() {
        let width = metrics.block_width(block, options.font_size);
        if idx > page_start && page_width + width > metrics.page_width {
            pages.push(PageSpan {
                first_block: page_start,
                end_block: idx,
                width: page_width,
            });
            page_start = idx;
            page_width = 0.0;
        }
        block_pages.push(pages.len());
        block_offsets.push(flow_offset);
        page_width += width;
        flow_offset += width;
    }

    if page_start < presentation.blocks.len() || pages.is_empty() {
        pages.push(PageSpan {
            first_block: page_start,
            end_block: presentation.blocks.len(),
            width: page_width,
        });
    }

    debug!(
        pages = pages.len(),
        chars_per_column = metrics.chars_per_column,
        "Planned vertical columns"
    );
    ColumnPlan {
        metrics,
        pages,
        block_pages,
        block_offsets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::render;
    use crate::structure::parse_content;

    fn options() -> LayoutOptions {
        LayoutOptions {
            font_size: 20.0,
            line_spacing: 2.0,
            viewport_width: 400.0,
            viewport_height: 200.0,
            ..LayoutOptions::default()
        }
    }

    #[test]
    fn metrics_follow_font_and_viewport() {
        let metrics = ColumnMetrics::from_options(&options());
        assert_eq!(metrics.chars_per_column, 8);
        assert_eq!(metrics.column_pitch, 40.0);
        assert_eq!(metrics.page_width, 400.0);
    }

    #[test]
    fn long_paragraphs_span_several_columns() {
        let metrics = ColumnMetrics::from_options(&options());
        let block = Block::Paragraph {
            text: "あ".repeat(20),
            style: crate::layout::ParagraphStyle::Narration,
            indent_em: 1.0,
            justified: true,
        };
        // 21 chars over 8 per column.
        assert_eq!(metrics.block_width(&block, 20.0), 120.0);
    }

    #[test]
    fn blocks_fill_pages_in_order_and_stay_whole() {
        let content = (1..=6)
            .map(|n| "本".repeat(n * 7))
            .collect::<Vec<_>>()
            .join("\n");
        let segments = parse_content(&content, &[]);
        let presentation = render("題", &segments, &[], &[], &options());
        let plan = plan_columns(&presentation, &options());

        assert!(plan.page_count() > 1);
        let mut expected_start = 0;
        for page in &plan.pages {
            assert_eq!(page.first_block, expected_start);
            assert!(page.end_block > page.first_block);
            expected_start = page.end_block;
        }
        assert_eq!(expected_start, presentation.blocks.len());
        for page in &plan.pages {
            assert!(page.width <= 400.0 || page.end_block - page.first_block == 1);
        }
    }

    #[test]
    fn anchors_resolve_to_their_page() {
        let mut content = String::from("【目次】\n・第2話 終\n第1話 始\n");
        for _ in 0..30 {
            content.push_str("長い夜が続いた。長い夜が続いた。\n");
        }
        content.push_str("第2話 終\n朝。");
        let segments = parse_content(&content, &[]);
        let presentation = render("題", &segments, &[], &[], &options());
        let plan = plan_columns(&presentation, &options());

        let page = plan.page_of_anchor(&presentation, "ch-第2話-終").unwrap();
        assert_eq!(page, plan.page_count() - 1);
        assert!(page > 0);
        assert!(plan.page_of_anchor(&presentation, "ch-none").is_none());
    }

    #[test]
    fn empty_presentation_still_has_one_page() {
        let presentation = Presentation {
            title: String::new(),
            writing_mode: crate::layout::WritingMode::VerticalRl,
            blocks: Vec::new(),
            overlay: Vec::new(),
            empty_notice: None,
        };
        let plan = plan_columns(&presentation, &options());
        assert_eq!(plan.page_count(), 1);
        assert_eq!(plan.pages[0].end_block, 0);
    }
}
