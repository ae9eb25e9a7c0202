use crate::anchor::AnchorIndex;
use crate::layout::{self, Block, ColumnPlan, LayoutOptions, Presentation, ScrollTarget};
use crate::model::Book;
use crate::structure;
use serde::Serialize;
use tracing::{debug, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PreviewView {
    pub illustration_id: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReaderSnapshot {
    pub book_id: String,
    pub presentation: Presentation,
    pub current_page: usize,
    pub total_pages: usize,
    /// Blocks `first_block..end_block` are on the current page.
    pub first_block: usize,
    pub end_block: usize,
    /// Offset of the current page from the right edge of the flow, in px.
    pub scroll_offset: f32,
    #[ts(optional)]
    pub chapter_anchor_id: Option<String>,
    #[ts(optional)]
    pub pending_scroll: Option<ScrollTarget>,
    #[ts(optional)]
    pub preview: Option<PreviewView>,
}

#[derive(Debug, Clone)]
pub enum ReaderCommand {
    GetSnapshot,
    NextPage,
    PrevPage,
    SetPage { page: usize },
    FollowLink { anchor_id: String },
    OpenPreview { illustration_id: String },
    ClosePreview,
    Reload { book: Box<Book> },
}

impl ReaderCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "reader_get_snapshot",
            Self::NextPage => "reader_next_page",
            Self::PrevPage => "reader_prev_page",
            Self::SetPage { .. } => "reader_set_page",
            Self::FollowLink { .. } => "reader_follow_link",
            Self::OpenPreview { .. } => "reader_open_preview",
            Self::ClosePreview => "reader_close_preview",
            Self::Reload { .. } => "reader_reload",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReaderEvent {
    pub action: &'static str,
    pub snapshot: ReaderSnapshot,
}

/// Reading view over one book.
///
/// Derived state (segments, presentation, anchors, columns) is rebuilt from
/// the book's content on every reload; nothing derived is stored back.
#[derive(Debug, Clone)]
pub struct ReaderSession {
    book: Book,
    options: LayoutOptions,
    presentation: Presentation,
    anchors: AnchorIndex,
    plan: ColumnPlan,
    pub current_page: usize,
    pending_scroll: Option<ScrollTarget>,
    preview: Option<PreviewView>,
}

impl ReaderSession {
    pub fn open(book: Book, options: LayoutOptions) -> Self {
        let document = structure::parse_book(&book);
        let anchors = AnchorIndex::build(&document);
        let presentation = layout::render(
            &book.title,
            &document.segments,
            &book.illustrations,
            &book.stamps,
            &options,
        );
        let plan = layout::plan_columns(&presentation, &options);
        debug!(
            book = %book.id,
            blocks = presentation.blocks.len(),
            chapters = anchors.entries().len(),
            pages = plan.page_count(),
            "Opened reader"
        );
        Self {
            book,
            options,
            presentation,
            anchors,
            plan,
            current_page: 0,
            pending_scroll: None,
            preview: None,
        }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn anchors(&self) -> &AnchorIndex {
        &self.anchors
    }

    pub fn plan(&self) -> &ColumnPlan {
        &self.plan
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        let span = self.plan.pages.get(self.current_page).copied();
        let first_block = span.map(|s| s.first_block).unwrap_or(0);
        ReaderSnapshot {
            book_id: self.book.id.clone(),
            presentation: self.presentation.clone(),
            current_page: self.current_page,
            total_pages: self.plan.page_count(),
            first_block,
            end_block: span.map(|s| s.end_block).unwrap_or(0),
            scroll_offset: self.plan.scroll_offset_of_block(first_block).unwrap_or(0.0),
            chapter_anchor_id: self.chapter_on_page(),
            pending_scroll: self.pending_scroll.clone(),
            preview: self.preview.clone(),
        }
    }

    pub fn apply_command(&mut self, command: ReaderCommand) -> ReaderEvent {
        let action = command.action();
        self.pending_scroll = None;
        match command {
            ReaderCommand::GetSnapshot => {}
            ReaderCommand::NextPage => self.next_page(),
            ReaderCommand::PrevPage => self.prev_page(),
            ReaderCommand::SetPage { page } => self.set_page(page),
            ReaderCommand::FollowLink { anchor_id } => {
                self.follow_link(&anchor_id);
            }
            ReaderCommand::OpenPreview { illustration_id } => {
                self.open_preview(&illustration_id);
            }
            ReaderCommand::ClosePreview => self.preview = None,
            ReaderCommand::Reload { book } => self.reload(*book),
        }
        ReaderEvent {
            action,
            snapshot: self.snapshot(),
        }
    }

    pub fn next_page(&mut self) {
        if self.current_page + 1 < self.plan.page_count() {
            self.current_page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.current_page = self.current_page.saturating_sub(1);
    }

    pub fn set_page(&mut self, page: usize) {
        self.current_page = page.min(self.plan.page_count().saturating_sub(1));
    }

    /// Jump to the page holding the chapter `anchor_id`. Unknown anchors
    /// leave the position unchanged and return `false`.
    pub fn follow_link(&mut self, anchor_id: &str) -> bool {
        match self.plan.page_of_anchor(&self.presentation, anchor_id) {
            Some(page) => {
                self.current_page = page;
                self.pending_scroll = Some(ScrollTarget::chapter(anchor_id));
                true
            }
            None => {
                warn!(anchor = anchor_id, "Table of contents link has no chapter");
                false
            }
        }
    }

    /// Show an illustration full screen. Placeholders have nothing to show.
    pub fn open_preview(&mut self, illustration_id: &str) -> bool {
        let found = self.presentation.blocks.iter().find_map(|block| match block {
            Block::Figure {
                illustration_id: id,
                source,
                ..
            } if id == illustration_id => Some(source.clone()),
            _ => None,
        });
        match found {
            Some(source) => {
                self.preview = Some(PreviewView {
                    illustration_id: illustration_id.to_string(),
                    source,
                });
                true
            }
            None => false,
        }
    }

    /// Rebuild from an updated book, staying in the same chapter when it
    /// still exists.
    pub fn reload(&mut self, book: Book) {
        let chapter = self.chapter_on_page();
        let page = self.current_page;
        *self = Self::open(book, self.options.clone());
        self.set_page(page);
        let Some(anchor) = chapter else {
            return;
        };
        if self.chapter_on_page().as_deref() != Some(anchor.as_str()) {
            if let Some(chapter_page) = self.plan.page_of_anchor(&self.presentation, &anchor) {
                self.current_page = chapter_page;
            }
        }
    }

    /// Anchor of the last heading at or before the end of the current page.
    fn chapter_on_page(&self) -> Option<String> {
        let end = self.plan.pages.get(self.current_page)?.end_block;
        self.presentation.blocks[..end]
            .iter()
            .rev()
            .find_map(|block| block.anchor_id().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Illustration, Stamp};

    fn narrow() -> LayoutOptions {
        LayoutOptions {
            font_size: 20.0,
            line_spacing: 2.0,
            viewport_width: 200.0,
            viewport_height: 400.0,
            ..LayoutOptions::default()
        }
    }

    fn book(content: &str) -> Book {
        let mut book = Book::new("b1", 1);
        book.title = "旅".to_string();
        book.content = content.to_string();
        book
    }

    fn long_book() -> Book {
        let filler = "少年は長い道を歩き続けた。".repeat(6);
        book(&format!(
            "【目次】\n・第1話 出発\n・第2話 帰還\n第1話 出発\n{filler}\n{filler}\n第2話 帰還\n{filler}\n{filler}"
        ))
    }

    #[test]
    fn paging_is_clamped_to_the_plan() {
        let mut session = ReaderSession::open(long_book(), narrow());
        let total = session.plan().page_count();
        assert!(total > 2);
        session.apply_command(ReaderCommand::PrevPage);
        assert_eq!(session.current_page, 0);
        session.apply_command(ReaderCommand::SetPage { page: 999 });
        assert_eq!(session.current_page, total - 1);
        session.apply_command(ReaderCommand::NextPage);
        assert_eq!(session.current_page, total - 1);
    }

    #[test]
    fn following_a_toc_link_lands_on_the_chapter() {
        let mut session = ReaderSession::open(long_book(), narrow());
        let event = session.apply_command(ReaderCommand::FollowLink {
            anchor_id: "ch-第2話-帰還".to_string(),
        });
        assert_eq!(event.action, "reader_follow_link");
        let snapshot = event.snapshot;
        assert!(snapshot.current_page > 0);
        assert!(
            (snapshot.first_block..snapshot.end_block)
                .contains(&session.presentation().block_of_anchor("ch-第2話-帰還").unwrap())
        );
        let target = snapshot.pending_scroll.unwrap();
        assert_eq!(target.inline, layout::ScrollAlign::Start);
        assert_eq!(snapshot.chapter_anchor_id.as_deref(), Some("ch-第2話-帰還"));

        let after = session.apply_command(ReaderCommand::GetSnapshot).snapshot;
        assert!(after.pending_scroll.is_none());
    }

    #[test]
    fn unknown_link_keeps_position() {
        let mut session = ReaderSession::open(long_book(), narrow());
        session.set_page(1);
        assert!(!session.follow_link("ch-第9話"));
        assert_eq!(session.current_page, 1);
    }

    #[test]
    fn preview_opens_only_for_resolved_illustrations() {
        let mut source = book("前\n[挿絵:img1]\n[挿絵:gone]");
        source.illustrations.push(Illustration {
            id: "img1".to_string(),
            image_data: "data:image/png;base64,AAAA".to_string(),
        });
        let mut session = ReaderSession::open(source, LayoutOptions::default());
        let snapshot = session
            .apply_command(ReaderCommand::OpenPreview {
                illustration_id: "img1".to_string(),
            })
            .snapshot;
        assert_eq!(
            snapshot.preview.map(|p| p.source).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
        session.apply_command(ReaderCommand::ClosePreview);
        assert!(!session.open_preview("gone"));
        assert!(session.snapshot().preview.is_none());
    }

    #[test]
    fn reload_keeps_the_reader_in_the_same_chapter() {
        let mut session = ReaderSession::open(long_book(), narrow());
        session.follow_link("ch-第2話-帰還");
        let mut updated = long_book();
        updated.content.push_str("\n少年は眠った。");
        updated.stamps.push(Stamp::new("感動", 20.0, 30.0));
        session.apply_command(ReaderCommand::Reload {
            book: Box::new(updated),
        });
        let snapshot = session.snapshot();
        assert_eq!(snapshot.chapter_anchor_id.as_deref(), Some("ch-第2話-帰還"));
        assert_eq!(snapshot.presentation.overlay.len(), 1);
    }

    #[test]
    fn empty_book_has_one_page_and_a_notice() {
        let session = ReaderSession::open(book(""), LayoutOptions::default());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.total_pages, 1);
        assert!(snapshot.presentation.empty_notice.is_some());
        assert_eq!(snapshot.chapter_anchor_id, None);
    }
}
