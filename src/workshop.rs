//! Writing-workshop operations built on the generative API.
//!
//! Every operation reads the current book, makes at most one generation call
//! and only then writes the result back through [`Library::update`]. A failed
//! or cancelled call therefore leaves the stored book exactly as it was.

use crate::generation::{BusyGate, GenerationError, GenerationSettings, Generator};
use crate::model::{Book, BookPatch, ChatMessage, ChatRole, STAMP_TEXTS, Stamp};
use crate::storage::{KeyValueStore, Library, StorageError, generate_id, now_millis};
use crate::structure::markers::{illustration_block, strip_illustration_markers};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hound::{SampleFormat, WavSpec, WavWriter};
use once_cell::sync::Lazy;
use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

pub const NARRATION_SAMPLE_RATE: u32 = 24_000;
pub const NARRATION_MAX_CHARS: usize = 2000;
const CONTINUE_CONTEXT_CHARS: usize = 1500;
const REVIEW_CONTEXT_CHARS: usize = 3000;
const PERSONA_CONTEXT_CHARS: usize = 500;
const CHAT_HISTORY_TURNS: usize = 10;

const NOVELIST_SYSTEM: &str = "あなたはプロの小説家です。美しい日本語で、感情豊かに物語を書いてください。出力はMarkdown形式ではなくプレーンテキストでお願いします。";
const CONTINUE_SYSTEM_SUFFIX: &str =
    " 既存の物語の続きを書いてください。文体とトーンを維持してください。";
const BACKGROUND_PROMPT: &str = "A cozy, warm, magical library with wooden shelves, soft lighting, lots of books, detailed, fantasy art style, 4k";

pub const THREE_TOPIC_TITLE: &str = "三題噺の物語";
pub const THREE_TOPIC_GENRE: &str = "三題噺";
pub const CLASSIC_GENRE: &str = "純文学";

/// Topic words for a 三題噺 (three-topic story).
pub const RANDOM_WORDS: [&str; 30] = [
    "雨宿り",
    "懐中時計",
    "秘密",
    "猫",
    "手紙",
    "魔法",
    "嘘",
    "約束",
    "桜",
    "夜行列車",
    "図書館",
    "鍵",
    "ピアノ",
    "星空",
    "迷子",
    "珈琲",
    "古書店",
    "鏡",
    "青",
    "記憶",
    "風船",
    "写真",
    "月",
    "金魚",
    "影",
    "電話",
    "屋上",
    "ソーダ水",
    "花火",
    "雪",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicWork {
    pub title: &'static str,
    pub author: &'static str,
}

/// Public-domain works offered for import from 青空文庫.
pub const CLASSIC_WORKS: [ClassicWork; 9] = [
    ClassicWork { title: "吾輩は猫である", author: "夏目漱石" },
    ClassicWork { title: "こころ", author: "夏目漱石" },
    ClassicWork { title: "銀河鉄道の夜", author: "宮沢賢治" },
    ClassicWork { title: "注文の多い料理店", author: "宮沢賢治" },
    ClassicWork { title: "走れメロス", author: "太宰治" },
    ClassicWork { title: "人間失格", author: "太宰治" },
    ClassicWork { title: "舞姫", author: "森鴎外" },
    ClassicWork { title: "羅生門", author: "芥川龍之介" },
    ClassicWork { title: "手袋を買いに", author: "新美南吉" },
];

static RE_TITLE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"タイトル[:：]\s*(.+)").unwrap());

#[derive(Error, Debug)]
pub enum WorkshopError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("No image was produced for {0}")]
    NoImage(&'static str),

    #[error("No audio was produced")]
    NoAudio,

    #[error("Nothing to work with: {0}")]
    EmptyInput(&'static str),

    #[error("Unknown classic work: {0}")]
    UnknownClassic(String),
}

/// Name of each generation request, used as the busy-gate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkshopAction {
    WriteOpening,
    ContinueStory,
    Illustrate,
    Cover,
    Background,
    Narrate,
    Review,
    Refine,
    Chat,
    FanLetter,
    ImportClassic,
}

impl WorkshopAction {
    pub fn action(&self) -> &'static str {
        match self {
            Self::WriteOpening => "workshop_write_opening",
            Self::ContinueStory => "workshop_continue_story",
            Self::Illustrate => "workshop_illustrate",
            Self::Cover => "workshop_cover",
            Self::Background => "workshop_background",
            Self::Narrate => "workshop_narrate",
            Self::Review => "workshop_review",
            Self::Refine => "workshop_refine",
            Self::Chat => "workshop_chat",
            Self::FanLetter => "workshop_fan_letter",
            Self::ImportClassic => "workshop_import_classic",
        }
    }
}

/// `main（詳細: sub）`, or just `main` when there is no detail.
pub fn genre_text(main: &str, detail: &str) -> String {
    let main = main.trim();
    let detail = detail.trim();
    if detail.is_empty() {
        main.to_string()
    } else {
        format!("{main}（詳細: {detail}）")
    }
}

/// Split a generated opening into its proposed title and the story text.
///
/// The first line carrying `タイトル:` is removed from the body. Without
/// such a line the whole text is the body.
pub fn extract_title(generated: &str) -> (Option<String>, String) {
    let mut title = None;
    let mut body = Vec::new();
    for line in generated.lines() {
        if title.is_none() {
            if let Some(caps) = RE_TITLE_LINE.captures(line) {
                let proposed = caps[1]
                    .trim()
                    .trim_matches(|c: char| matches!(c, '[' | ']' | '「' | '」' | '『' | '』' | '*'))
                    .trim();
                if !proposed.is_empty() {
                    title = Some(proposed.to_string());
                    continue;
                }
            }
        }
        body.push(line);
    }
    (title, body.join("\n").trim().to_string())
}

fn tail_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    match text.char_indices().nth(total - count) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

fn head_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// `base` followed by the book's cast and world notes, when it has any.
fn story_system(base: &str, book: &Book) -> String {
    let mut system = base.to_string();
    if !book.characters.is_empty() {
        let cast = serde_json::to_string(&book.characters).unwrap_or_default();
        system.push_str(&format!("\n\n【登場人物設定】\n{cast}"));
    }
    if let Some(world) = book.world_settings.as_deref().filter(|w| !w.is_empty()) {
        system.push_str(&format!("\n\n【世界観・設定】\n{world}"));
    }
    system
}

fn png_data_url(data: &str) -> String {
    format!("data:image/png;base64,{data}")
}

/// Raw 16-bit mono PCM returned by the speech endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub pcm_base64: String,
    pub sample_rate: u32,
}

impl Narration {
    pub fn pcm(&self) -> Result<Vec<u8>, GenerationError> {
        STANDARD
            .decode(self.pcm_base64.trim())
            .map_err(|err| GenerationError::Malformed(format!("audio is not base64: {err}")))
    }

    /// The samples wrapped in a RIFF/WAVE container. A trailing odd byte
    /// is dropped.
    pub fn to_wav(&self) -> Result<Vec<u8>, GenerationError> {
        let pcm = self.pcm()?;
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut wav = Vec::with_capacity(44 + pcm.len());
        let mut writer = WavWriter::new(Cursor::new(&mut wav), spec).map_err(wav_error)?;
        for pair in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
        Ok(wav)
    }
}

fn wav_error(err: hound::Error) -> GenerationError {
    GenerationError::Malformed(format!("cannot encode WAV: {err}"))
}

/// Text handed to the speech endpoint: markers removed, NFC-normalized and
/// cut to [`NARRATION_MAX_CHARS`].
pub fn narration_text(content: &str) -> String {
    let stripped: String = strip_illustration_markers(content).nfc().collect();
    head_chars(stripped.trim(), NARRATION_MAX_CHARS).to_string()
}

pub fn pick_topics<R: Rng + ?Sized>(rng: &mut R) -> Vec<&'static str> {
    RANDOM_WORDS.choose_multiple(rng, 3).copied().collect()
}

/// Create a new book seeded with three random topic words.
pub fn start_three_topic_story<S: KeyValueStore, R: Rng + ?Sized>(
    library: &mut Library<S>,
    rng: &mut R,
) -> Result<Book, StorageError> {
    let topics = pick_topics(rng);
    let mut book = Book::new(generate_id(), now_millis());
    book.title = THREE_TOPIC_TITLE.to_string();
    book.genre = Some(THREE_TOPIC_GENRE.to_string());
    book.content = format!("お題: {}\n\n", topics.join("、"));
    library.insert(book)
}

/// Drop a random stamp somewhere in the inner 10–80% of the page.
pub fn random_stamp<S: KeyValueStore, R: Rng + ?Sized>(
    library: &mut Library<S>,
    id: &str,
    rng: &mut R,
) -> Result<Book, StorageError> {
    let text = STAMP_TEXTS.choose(rng).copied().unwrap_or(STAMP_TEXTS[0]);
    let stamp = Stamp::new(text, rng.gen_range(10.0..80.0), rng.gen_range(10.0..80.0));
    library.add_stamp(id, stamp)
}

pub fn find_classic(title: &str) -> Option<ClassicWork> {
    CLASSIC_WORKS
        .iter()
        .copied()
        .find(|work| work.title == title.trim())
}

/// Generation-backed operations over one library.
pub struct Workshop<'a, S, G> {
    library: &'a mut Library<S>,
    generator: &'a G,
    settings: GenerationSettings,
    busy: BusyGate,
}

impl<'a, S: KeyValueStore, G: Generator> Workshop<'a, S, G> {
    pub fn new(library: &'a mut Library<S>, generator: &'a G, settings: GenerationSettings) -> Self {
        Self {
            library,
            generator,
            settings,
            busy: BusyGate::new(),
        }
    }

    /// Share an existing gate so duplicate requests are refused across views.
    pub fn with_busy_gate(mut self, busy: BusyGate) -> Self {
        self.busy = busy;
        self
    }

    pub fn busy_gate(&self) -> &BusyGate {
        &self.busy
    }

    pub fn library(&self) -> &Library<S> {
        self.library
    }

    /// Replace the book with a freshly generated opening and proposed title.
    pub fn write_opening(
        &mut self,
        id: &str,
        genre: &str,
        prompt: &str,
    ) -> Result<Book, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::WriteOpening.action())?;
        let book = self.library.require(id)?.clone();
        let request = format!(
            "ジャンル「{genre}」で、次の要素を含む物語の冒頭を書いてください: {prompt}。タイトルも提案してください（形式: タイトル: [タイトル]）。"
        );
        let system = story_system(NOVELIST_SYSTEM, &book);
        let generated = self.generator.generate_text(&request, &system)?;
        let (title, content) = extract_title(&generated);
        info!(book = %id, titled = title.is_some(), chars = content.chars().count(), "Wrote opening");
        let patch = BookPatch {
            title,
            content: Some(content),
            ..BookPatch::default()
        };
        Ok(self.library.update(id, patch)?)
    }

    /// Append a continuation written from the tail of the current text.
    pub fn continue_story(&mut self, id: &str, direction: &str) -> Result<Book, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::ContinueStory.action())?;
        let book = self.library.require(id)?.clone();
        let system = format!(
            "{}{CONTINUE_SYSTEM_SUFFIX}",
            story_system(&self.settings.system_instruction, &book)
        );
        let request = format!(
            "これまでのあらすじ（直近）:\n{}\n\n指示: 続きを書いてください。ジャンル意識: {}。展開案: {direction}",
            tail_chars(&book.content, CONTINUE_CONTEXT_CHARS),
            book.genre.as_deref().unwrap_or_default(),
        );
        let continuation = self.generator.generate_text(&request, &system)?;
        let content = if book.content.trim().is_empty() {
            continuation.trim().to_string()
        } else {
            format!("{}\n\n{}", book.content, continuation.trim())
        };
        debug!(book = %id, added = continuation.chars().count(), "Continued story");
        Ok(self.library.update(id, BookPatch::content(content))?)
    }

    /// Generate an illustration and append its marker as its own block.
    pub fn add_illustration(&mut self, id: &str, prompt: &str) -> Result<Book, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::Illustrate.action())?;
        let book = self.library.require(id)?.clone();
        let request = format!(
            "Anime style illustration, {prompt}, {}",
            book.genre.as_deref().unwrap_or_default()
        );
        let data = self
            .generator
            .generate_image(&request)?
            .ok_or(WorkshopError::NoImage("illustration"))?;

        let illustration_id = generate_id();
        let mut illustrations = book.illustrations.clone();
        illustrations.push(crate::model::Illustration {
            id: illustration_id.clone(),
            image_data: png_data_url(&data),
        });
        let content = format!("{}{}", book.content, illustration_block(&illustration_id));
        info!(book = %id, illustration = %illustration_id, "Added illustration");
        Ok(self.library.update(
            id,
            BookPatch {
                content: Some(content),
                illustrations: Some(illustrations),
                ..BookPatch::default()
            },
        )?)
    }

    pub fn generate_cover(&mut self, id: &str) -> Result<Book, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::Cover.action())?;
        let book = self.library.require(id)?;
        let request = format!(
            "Book cover art, {}, {}, elegant, no text",
            book.title,
            book.genre.as_deref().unwrap_or_default()
        );
        let data = self
            .generator
            .generate_image(&request)?
            .ok_or(WorkshopError::NoImage("cover"))?;
        Ok(self.library.update(
            id,
            BookPatch {
                cover: Some(png_data_url(&data)),
                ..BookPatch::default()
            },
        )?)
    }

    /// Generate the library background and store it. Returns the data URL.
    pub fn generate_background(&mut self) -> Result<String, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::Background.action())?;
        let data = self
            .generator
            .generate_image(BACKGROUND_PROMPT)?
            .ok_or(WorkshopError::NoImage("background"))?;
        let url = png_data_url(&data);
        self.library.set_background(&url)?;
        Ok(url)
    }

    pub fn narrate(&mut self, id: &str) -> Result<Narration, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::Narrate.action())?;
        let text = narration_text(&self.library.require(id)?.content);
        if text.is_empty() {
            return Err(WorkshopError::EmptyInput("narration"));
        }
        let pcm_base64 = self
            .generator
            .generate_speech(&text, &self.settings.voice_name)?
            .ok_or(WorkshopError::NoAudio)?;
        Ok(Narration {
            pcm_base64,
            sample_rate: NARRATION_SAMPLE_RATE,
        })
    }

    /// Editorial feedback on the latest part of the manuscript.
    pub fn review(&mut self, id: &str) -> Result<String, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::Review.action())?;
        let content = &self.library.require(id)?.content;
        if content.trim().is_empty() {
            return Err(WorkshopError::EmptyInput("review"));
        }
        let request = format!(
            "あなたは敏腕編集者です。以下の原稿を読み、1. 良かった点、2. 改善点（矛盾、誤字、表現の拙さ）、3. 次の展開のアイデア を優しくも的確にアドバイスしてください。\n\n本文:\n{}",
            tail_chars(content, REVIEW_CONTEXT_CHARS)
        );
        Ok(self
            .generator
            .generate_text(&request, &self.settings.system_instruction)?)
    }

    /// Suggestions for a more literary wording of `selection`.
    pub fn refine_wording(&mut self, selection: &str) -> Result<String, WorkshopError> {
        let selection = selection.trim();
        if selection.is_empty() {
            return Err(WorkshopError::EmptyInput("selection"));
        }
        let _guard = self.busy.try_begin(WorkshopAction::Refine.action())?;
        let request = format!(
            "言葉「{selection}」を、小説の中で使えるより情緒的、文学的、あるいはかっこいい表現に言い換えてください。5つほど箇条書きで提案してください。"
        );
        Ok(self
            .generator
            .generate_text(&request, &self.settings.system_instruction)?)
    }

    /// Talk to the author or a character; both turns are kept on the book.
    pub fn chat(&mut self, id: &str, message: &str) -> Result<(Book, String), WorkshopError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(WorkshopError::EmptyInput("chat message"));
        }
        let _guard = self.busy.try_begin(WorkshopAction::Chat.action())?;
        let book = self.library.require(id)?.clone();
        let persona = format!(
            "あなたは作品「{}」の作者、または登場人物です。読者に情緒的に答えてください。本文要約: {}",
            book.title,
            head_chars(&book.content, PERSONA_CONTEXT_CHARS)
        );

        let start = book.chat_history.len().saturating_sub(CHAT_HISTORY_TURNS);
        let mut request = String::new();
        for turn in &book.chat_history[start..] {
            let speaker = match turn.role {
                ChatRole::User => "読者",
                ChatRole::Model => "あなた",
            };
            request.push_str(&format!("{speaker}: {}\n", turn.text));
        }
        request.push_str(message);

        let reply = self.generator.generate_text(&request, &persona)?;
        let reply = reply.trim().to_string();
        let mut history = book.chat_history;
        history.push(ChatMessage {
            role: ChatRole::User,
            text: message.to_string(),
        });
        history.push(ChatMessage {
            role: ChatRole::Model,
            text: reply.clone(),
        });
        let updated = self.library.update(
            id,
            BookPatch {
                chat_history: Some(history),
                ..BookPatch::default()
            },
        )?;
        Ok((updated, reply))
    }

    pub fn fan_letter(&mut self, id: &str) -> Result<String, WorkshopError> {
        let _guard = self.busy.try_begin(WorkshopAction::FanLetter.action())?;
        let content = &self.library.require(id)?.content;
        let request = format!(
            "この小説を読んだファンとして、心温まる短いファンレターを1通書いてください:\n\n{}",
            head_chars(content, PERSONA_CONTEXT_CHARS)
        );
        Ok(self
            .generator
            .generate_text(&request, &self.settings.system_instruction)?)
    }

    /// Fetch the opening of a classic work into a new book.
    pub fn import_classic(&mut self, title: &str) -> Result<Book, WorkshopError> {
        let work = find_classic(title).ok_or_else(|| WorkshopError::UnknownClassic(title.to_string()))?;
        let _guard = self.busy.try_begin(WorkshopAction::ImportClassic.action())?;
        let request = format!(
            "青空文庫の作品『{}』（著：{}）の冒頭から可能な限り長く（約3000文字程度）正確な本文を出力してください。解説は不要です。",
            work.title, work.author
        );
        let text = self
            .generator
            .generate_text(&request, &self.settings.system_instruction)?;
        let mut book = Book::new(generate_id(), now_millis());
        book.title = work.title.to_string();
        book.author = Some(work.author.to_string());
        book.genre = Some(CLASSIC_GENRE.to_string());
        book.content = text.trim().to_string();
        Ok(self.library.insert(book)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Character, UNSET_GENRE};
    use crate::storage::MemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeGenerator {
        text: Option<String>,
        image: Option<String>,
        audio: Option<String>,
        fail: bool,
        prompts: RefCell<Vec<(String, String)>>,
    }

    impl FakeGenerator {
        fn text(reply: &str) -> Self {
            Self {
                text: Some(reply.to_string()),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn last_prompt(&self) -> (String, String) {
            self.prompts.borrow().last().cloned().unwrap_or_default()
        }

        fn outcome<T: Clone>(&self, value: &Option<T>) -> Result<Option<T>, GenerationError> {
            if self.fail {
                return Err(GenerationError::Api {
                    status: 500,
                    message: "API Error: 500".to_string(),
                });
            }
            Ok(value.clone())
        }
    }

    impl Generator for FakeGenerator {
        fn generate_text(&self, prompt: &str, system: &str) -> Result<String, GenerationError> {
            self.prompts
                .borrow_mut()
                .push((prompt.to_string(), system.to_string()));
            Ok(self.outcome(&self.text)?.unwrap_or_default())
        }

        fn generate_image(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
            self.prompts
                .borrow_mut()
                .push((prompt.to_string(), String::new()));
            self.outcome(&self.image)
        }

        fn generate_speech(&self, text: &str, voice: &str) -> Result<Option<String>, GenerationError> {
            self.prompts
                .borrow_mut()
                .push((text.to_string(), voice.to_string()));
            self.outcome(&self.audio)
        }
    }

    fn library_with(content: &str) -> (Library<MemoryStore>, String) {
        let mut library = Library::open(MemoryStore::new());
        let book = library.create().unwrap();
        library
            .update(&book.id, BookPatch::content(content))
            .unwrap();
        (library, book.id)
    }

    #[test]
    fn genre_text_includes_detail_only_when_given() {
        assert_eq!(genre_text("ファンタジー", ""), "ファンタジー");
        assert_eq!(
            genre_text("ファンタジー", "魔法学園"),
            "ファンタジー（詳細: 魔法学園）"
        );
    }

    #[test]
    fn title_line_is_split_from_the_opening() {
        let (title, body) = extract_title("タイトル: [星降る夜]\n\n少女は空を見上げた。");
        assert_eq!(title.as_deref(), Some("星降る夜"));
        assert_eq!(body, "少女は空を見上げた。");

        let (title, body) = extract_title("少年は走った。");
        assert_eq!(title, None);
        assert_eq!(body, "少年は走った。");
    }

    #[test]
    fn write_opening_replaces_content_and_title() {
        let (mut library, id) = library_with("古い下書き");
        let generator = FakeGenerator::text("タイトル：雨の駅\n駅には誰もいなかった。");
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        let book = workshop
            .write_opening(&id, &genre_text("ミステリー", "駅"), "雨、駅、傘")
            .unwrap();
        assert_eq!(book.title, "雨の駅");
        assert_eq!(book.content, "駅には誰もいなかった。");
        assert_eq!(book.genre.as_deref(), Some(UNSET_GENRE));
        let (prompt, system) = generator.last_prompt();
        assert!(prompt.contains("ジャンル「ミステリー（詳細: 駅）」"));
        assert_eq!(system, NOVELIST_SYSTEM);
    }

    #[test]
    fn continuation_is_appended_after_a_blank_line() {
        let (mut library, id) = library_with("第1話 出発\n少年は旅に出た。");
        let generator = FakeGenerator::text("  森は静かだった。 ");
        let settings = GenerationSettings::default();
        let base_system = settings.system_instruction.clone();
        let mut workshop = Workshop::new(&mut library, &generator, settings);
        let book = workshop.continue_story(&id, "森へ").unwrap();
        assert_eq!(book.content, "第1話 出発\n少年は旅に出た。\n\n森は静かだった。");
        let (prompt, system) = generator.last_prompt();
        assert!(prompt.contains("展開案: 森へ"));
        assert!(system.starts_with(&base_system));
        assert!(system.ends_with(CONTINUE_SYSTEM_SUFFIX));
    }

    #[test]
    fn cast_and_world_notes_join_the_story_prompts() {
        let (mut library, id) = library_with("港に霧が出ていた。");
        library
            .update(
                &id,
                BookPatch {
                    characters: Some(vec![Character {
                        name: "ミナ".to_string(),
                        desc: "魔女".to_string(),
                    }]),
                    world_settings: Some("浮遊大陸".to_string()),
                    ..BookPatch::default()
                },
            )
            .unwrap();
        let generator = FakeGenerator::text("続き");
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());

        workshop.write_opening(&id, "ファンタジー", "霧").unwrap();
        let (_, system) = generator.last_prompt();
        assert!(system.starts_with(NOVELIST_SYSTEM));
        assert!(system.contains(
            "\n\n【登場人物設定】\n[{\"name\":\"ミナ\",\"desc\":\"魔女\"}]"
        ));
        assert!(system.ends_with("\n\n【世界観・設定】\n浮遊大陸"));

        workshop.continue_story(&id, "").unwrap();
        let (_, system) = generator.last_prompt();
        assert!(system.contains("【世界観・設定】\n浮遊大陸"));
        assert!(system.ends_with(CONTINUE_SYSTEM_SUFFIX));
    }

    #[test]
    fn story_prompts_without_notes_stay_plain() {
        let book = Book::new("b1", 1);
        assert_eq!(story_system(NOVELIST_SYSTEM, &book), NOVELIST_SYSTEM);
    }

    #[test]
    fn continuation_context_is_the_tail_of_the_text() {
        let long = format!("{}終", "あ".repeat(CONTINUE_CONTEXT_CHARS + 10));
        let (mut library, id) = library_with(&long);
        let generator = FakeGenerator::text("続き");
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        workshop.continue_story(&id, "").unwrap();
        let (prompt, _) = generator.last_prompt();
        let context = prompt
            .split("\n\n指示")
            .next()
            .and_then(|head| head.split('\n').nth(1))
            .unwrap();
        assert_eq!(context.chars().count(), CONTINUE_CONTEXT_CHARS);
        assert!(context.ends_with('終'));
    }

    #[test]
    fn failed_generation_leaves_the_book_untouched() {
        let (mut library, id) = library_with("そのまま");
        let before = library.require(&id).unwrap().clone();
        let generator = FakeGenerator::failing();
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        let err = workshop.continue_story(&id, "").unwrap_err();
        assert_eq!(err.to_string(), "API Error: 500");
        assert!(workshop.add_illustration(&id, "猫").is_err());
        assert_eq!(library.require(&id).unwrap(), &before);
    }

    #[test]
    fn illustration_is_stored_and_marked_in_its_own_block() {
        let (mut library, id) = library_with("本文");
        let generator = FakeGenerator {
            image: Some("iVBORw0KGgo=".to_string()),
            ..FakeGenerator::default()
        };
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        let book = workshop.add_illustration(&id, "夕焼け").unwrap();
        assert_eq!(book.illustrations.len(), 1);
        let ill = &book.illustrations[0];
        assert_eq!(ill.image_data, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(book.content, format!("本文\n\n[挿絵:{}]\n\n", ill.id));

        let parsed = crate::structure::parse_book(&book);
        assert!(
            parsed
                .segments
                .iter()
                .any(|segment| segment.kind() == "illustrationRef")
        );
    }

    #[test]
    fn missing_image_is_reported_without_changes() {
        let (mut library, id) = library_with("本文");
        let generator = FakeGenerator::default();
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        assert!(matches!(
            workshop.generate_cover(&id),
            Err(WorkshopError::NoImage("cover"))
        ));
        assert!(library.require(&id).unwrap().cover.is_none());
    }

    #[test]
    fn background_is_saved_to_storage() {
        let (mut library, _) = library_with("");
        let generator = FakeGenerator {
            image: Some("AAAA".to_string()),
            ..FakeGenerator::default()
        };
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        let url = workshop.generate_background().unwrap();
        assert_eq!(library.background().unwrap().as_deref(), Some(url.as_str()));
    }

    #[test]
    fn narration_skips_markers_and_uses_configured_voice() {
        let (mut library, id) = library_with("一行目\n\n[挿絵:abc]\n\n二行目");
        let generator = FakeGenerator {
            audio: Some(STANDARD.encode([0u8, 1, 2, 3])),
            ..FakeGenerator::default()
        };
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        let narration = workshop.narrate(&id).unwrap();
        let (text, voice) = generator.last_prompt();
        assert!(!text.contains("挿絵"));
        assert_eq!(voice, GenerationSettings::default().voice_name);
        assert_eq!(narration.sample_rate, NARRATION_SAMPLE_RATE);

        let wav = narration.to_wav().unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(wav.len(), 44 + 4);
        let mut reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, NARRATION_SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![0x0100, 0x0302]);
    }

    #[test]
    fn narration_text_is_capped() {
        let text = narration_text(&"話".repeat(NARRATION_MAX_CHARS + 50));
        assert_eq!(text.chars().count(), NARRATION_MAX_CHARS);
    }

    #[test]
    fn chat_keeps_both_turns() {
        let (mut library, id) = library_with("少年は旅に出た。");
        let generator = FakeGenerator::text("ありがとう。");
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        let (book, reply) = workshop.chat(&id, "結末は？").unwrap();
        assert_eq!(reply, "ありがとう。");
        assert_eq!(book.chat_history.len(), 2);
        assert_eq!(book.chat_history[0].role, ChatRole::User);
        assert_eq!(book.chat_history[1].text, "ありがとう。");
        let (_, persona) = generator.last_prompt();
        assert!(persona.contains("本文要約: 少年は旅に出た。"));
    }

    #[test]
    fn empty_selection_is_rejected_before_any_request() {
        let (mut library, _) = library_with("");
        let generator = FakeGenerator::text("案");
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        assert!(matches!(
            workshop.refine_wording("  "),
            Err(WorkshopError::EmptyInput(_))
        ));
        assert!(generator.prompts.borrow().is_empty());
    }

    #[test]
    fn busy_action_is_refused() {
        let (mut library, id) = library_with("本文");
        let generator = FakeGenerator::text("講評");
        let gate = BusyGate::new();
        let _held = gate.try_begin(WorkshopAction::Review.action()).unwrap();
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default())
            .with_busy_gate(gate.clone());
        assert!(matches!(
            workshop.review(&id),
            Err(WorkshopError::Generation(GenerationError::Busy(_)))
        ));
        assert!(workshop.fan_letter(&id).is_ok());
    }

    #[test]
    fn classic_import_creates_a_new_book() {
        let (mut library, _) = library_with("");
        let generator = FakeGenerator::text("ある日の暮方の事である。");
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        let book = workshop.import_classic("羅生門").unwrap();
        assert_eq!(book.author.as_deref(), Some("芥川龍之介"));
        assert_eq!(book.genre.as_deref(), Some(CLASSIC_GENRE));
        assert_eq!(library.books()[0].id, book.id);
        assert_eq!(library.books().len(), 2);

        let generator = FakeGenerator::text("");
        let mut workshop = Workshop::new(&mut library, &generator, GenerationSettings::default());
        assert!(matches!(
            workshop.import_classic("存在しない本"),
            Err(WorkshopError::UnknownClassic(_))
        ));
    }

    #[test]
    fn three_topic_story_uses_distinct_words() {
        let mut library = Library::open(MemoryStore::new());
        let mut rng = StdRng::seed_from_u64(7);
        let book = start_three_topic_story(&mut library, &mut rng).unwrap();
        assert_eq!(book.title, THREE_TOPIC_TITLE);
        let topics = book
            .content
            .trim_end()
            .strip_prefix("お題: ")
            .unwrap()
            .split('、')
            .collect::<Vec<_>>();
        assert_eq!(topics.len(), 3);
        assert!(topics.iter().all(|word| RANDOM_WORDS.contains(word)));
        assert_ne!(topics[0], topics[1]);
        assert_ne!(topics[1], topics[2]);
        assert_ne!(topics[0], topics[2]);
    }

    #[test]
    fn random_stamp_lands_inside_the_page() {
        let (mut library, id) = library_with("本文");
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            random_stamp(&mut library, &id, &mut rng).unwrap();
        }
        let book = library.require(&id).unwrap();
        assert_eq!(book.stamps.len(), 20);
        for stamp in &book.stamps {
            assert!(STAMP_TEXTS.contains(&stamp.text.as_str()));
            assert!((10.0..80.0).contains(&stamp.x.value()));
            assert!((10.0..80.0).contains(&stamp.y.value()));
        }
    }
}
