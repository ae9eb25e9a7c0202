//! Persistence of the book library and user settings.
//!
//! Everything lives in a string key-value store: the library as one JSON
//! array under [`BOOKS_KEY`], the API credential and the library background
//! under their own keys.

mod library;
mod store;

pub use library::{BACKUP_VERSION, Backup, Library, generate_id, now_millis};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use std::path::PathBuf;
use thiserror::Error;

pub const BOOKS_KEY: &str = "kotonoha_books";
pub const API_KEY_KEY: &str = "gemini_api_key";
pub const BACKGROUND_KEY: &str = "kotonoha_bg";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Book not found: {0}")]
    NotFound(String),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),
}
