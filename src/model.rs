//! Book documents and the annotations stored alongside them.
//!
//! `content` is the only structural source of truth; everything the reader
//! shows is derived from it by the parser on demand.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

pub const UNTITLED: &str = "無題の物語";
pub const UNSET_GENRE: &str = "未設定";

/// Stamp labels offered by the reader.
pub const STAMP_TEXTS: [&str; 5] = ["秀逸", "感動", "尊い", "天才", "続き希望"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Book {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub illustrations: Vec<Illustration>,
    #[serde(default)]
    pub stamps: Vec<Stamp>,
    #[serde(default)]
    #[ts(type = "number")]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub author: Option<String>,
    /// Cover art as a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characters: Vec<Character>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub world_settings: Option<String>,
}

fn default_title() -> String {
    UNTITLED.to_string()
}

impl Book {
    pub fn new(id: impl Into<String>, updated_at: i64) -> Self {
        Self {
            id: id.into(),
            title: default_title(),
            content: String::new(),
            illustrations: Vec::new(),
            stamps: Vec::new(),
            updated_at,
            genre: None,
            author: None,
            cover: None,
            created_at: Some(updated_at),
            chat_history: Vec::new(),
            characters: Vec::new(),
            world_settings: None,
        }
    }

    pub fn illustration(&self, id: &str) -> Option<&Illustration> {
        self.illustrations.iter().find(|ill| ill.id == id)
    }

    pub fn display_author(&self) -> &str {
        match self.author.as_deref() {
            Some(author) if !author.trim().is_empty() => author,
            _ => "私",
        }
    }

    /// Apply every populated field of `patch`. Does not touch `updated_at`.
    pub fn apply_patch(&mut self, patch: BookPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(illustrations) = patch.illustrations {
            self.illustrations = illustrations;
        }
        if let Some(stamps) = patch.stamps {
            self.stamps = stamps;
        }
        if let Some(genre) = patch.genre {
            self.genre = Some(genre);
        }
        if let Some(author) = patch.author {
            self.author = Some(author);
        }
        if let Some(cover) = patch.cover {
            self.cover = Some(cover);
        }
        if let Some(chat_history) = patch.chat_history {
            self.chat_history = chat_history;
        }
        if let Some(characters) = patch.characters {
            self.characters = characters;
        }
        if let Some(world_settings) = patch.world_settings {
            self.world_settings = Some(world_settings);
        }
    }
}

/// A cast entry the author keeps next to the manuscript.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Character {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Illustration {
    pub id: String,
    /// Image as a data URL. Older libraries stored this as `data`.
    #[serde(alias = "data", default)]
    pub image_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Stamp {
    pub text: String,
    #[ts(type = "number")]
    pub x: Percent,
    #[ts(type = "number")]
    pub y: Percent,
}

impl Stamp {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x: Percent::new(x),
            y: Percent::new(y),
        }
    }
}

/// A coordinate in percent of the page box, clamped to `0..=100`.
///
/// Accepts either a number or a CSS-style `"37.5%"` string when loading.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Percent(f32);

impl Percent {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 100.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn css(self) -> String {
        format!("{}%", self.0)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.0)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Percent::new(value)),
            Raw::Text(text) => text
                .trim()
                .trim_end_matches('%')
                .trim()
                .parse::<f32>()
                .map(Percent::new)
                .map_err(|err| serde::de::Error::custom(format!("invalid percent {text:?}: {err}"))),
        }
    }
}

/// Partial update for a [`Book`]; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BookPatch {
    #[ts(optional)]
    pub title: Option<String>,
    #[ts(optional)]
    pub content: Option<String>,
    #[ts(optional)]
    pub illustrations: Option<Vec<Illustration>>,
    #[ts(optional)]
    pub stamps: Option<Vec<Stamp>>,
    #[ts(optional)]
    pub genre: Option<String>,
    #[ts(optional)]
    pub author: Option<String>,
    #[ts(optional)]
    pub cover: Option<String>,
    #[ts(optional)]
    pub chat_history: Option<Vec<ChatMessage>>,
    #[ts(optional)]
    pub characters: Option<Vec<Character>>,
    #[ts(optional)]
    pub world_settings: Option<String>,
}

impl BookPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_fields_are_defaulted() {
        let book: Book = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(book.title, UNTITLED);
        assert!(book.content.is_empty());
        assert!(book.illustrations.is_empty());
        assert!(book.stamps.is_empty());
        assert_eq!(book.updated_at, 0);
        assert_eq!(book.genre, None);
    }

    #[test]
    fn legacy_illustration_data_field_is_accepted() {
        let ill: Illustration =
            serde_json::from_str(r#"{"id":"x1","data":"data:image/png;base64,AAAA"}"#).unwrap();
        assert_eq!(ill.image_data, "data:image/png;base64,AAAA");
        let json = serde_json::to_string(&ill).unwrap();
        assert!(json.contains("\"imageData\""));
    }

    #[test]
    fn stamp_coordinates_accept_css_percent_strings() {
        let stamp: Stamp = serde_json::from_str(r#"{"text":"感動","x":"37.5%","y":12}"#).unwrap();
        assert_eq!(stamp.x.value(), 37.5);
        assert_eq!(stamp.y.value(), 12.0);
        assert_eq!(stamp.x.css(), "37.5%");
    }

    #[test]
    fn stamp_coordinates_are_clamped() {
        let stamp = Stamp::new("尊い", -5.0, 140.0);
        assert_eq!(stamp.x.value(), 0.0);
        assert_eq!(stamp.y.value(), 100.0);
    }

    #[test]
    fn patch_only_touches_populated_fields() {
        let mut book = Book::new("b1", 1);
        book.content = "本文".to_string();
        book.apply_patch(BookPatch::title("新しい題"));
        assert_eq!(book.title, "新しい題");
        assert_eq!(book.content, "本文");
        assert_eq!(book.updated_at, 1);
    }

    #[test]
    fn cast_and_world_settings_survive_a_round_trip() {
        let raw = r#"{"id":"b1","title":"旅","characters":[{"name":"ミナ","desc":"魔女"},{"name":""}],"worldSettings":"浮遊大陸"}"#;
        let mut book: Book = serde_json::from_str(raw).unwrap();
        assert_eq!(book.characters.len(), 2);
        assert_eq!(book.characters[1].desc, "");
        book.apply_patch(BookPatch::title("新"));

        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["characters"][0]["name"], "ミナ");
        assert_eq!(json["characters"][0]["desc"], "魔女");
        assert_eq!(json["worldSettings"], "浮遊大陸");
        let reloaded: Book = serde_json::from_value(json).unwrap();
        assert_eq!(reloaded, book);
    }

    #[test]
    fn patch_replaces_cast_and_world_settings() {
        let mut book = Book::new("b1", 1);
        let patch: BookPatch = serde_json::from_str(
            r#"{"characters":[{"name":"蓮","desc":"剣士"}],"worldSettings":"霧の港町"}"#,
        )
        .unwrap();
        book.apply_patch(patch);
        assert_eq!(
            book.characters,
            vec![Character {
                name: "蓮".to_string(),
                desc: "剣士".to_string(),
            }]
        );
        assert_eq!(book.world_settings.as_deref(), Some("霧の港町"));
    }

    #[test]
    fn display_author_falls_back_to_first_person() {
        let mut book = Book::new("b1", 0);
        assert_eq!(book.display_author(), "私");
        book.author = Some("紫".to_string());
        assert_eq!(book.display_author(), "紫");
    }
}
