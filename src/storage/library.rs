use super::{API_KEY_KEY, BACKGROUND_KEY, BOOKS_KEY, KeyValueStore, StorageError};
use crate::model::{Book, BookPatch, Stamp, UNSET_GENRE};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const BACKUP_VERSION: &str = "3.0";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Time-ordered id: base36 milliseconds followed by a random base36 tail.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let tail: u64 = rng.gen_range(36u64.pow(7)..36u64.pow(8));
    format!("{}{}", to_base36(now_millis().max(0) as u64), to_base36(tail))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Whole-library export written by [`Library::export_backup`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub books: Vec<Book>,
    pub version: String,
    pub exported_at: String,
}

/// All books, keyed by id, persisted after every mutation.
///
/// There is no notion of an active book: callers address books by id and get
/// the updated record back from each mutation.
#[derive(Debug)]
pub struct Library<S> {
    store: S,
    books: Vec<Book>,
}

impl<S: KeyValueStore> Library<S> {
    /// Load the library. Missing or corrupt data yields an empty library.
    pub fn open(store: S) -> Self {
        let books = match store.get(BOOKS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Book>>(&raw) {
                Ok(books) => {
                    info!(count = books.len(), "Loaded library");
                    books
                }
                Err(err) => {
                    warn!("Stored library is not valid JSON, starting empty: {err}");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!("No stored library yet");
                Vec::new()
            }
            Err(err) => {
                warn!("Failed to read stored library, starting empty: {err}");
                Vec::new()
            }
        };
        Self { store, books }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn get(&self, id: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&Book, StorageError> {
        self.get(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add an empty book at the front of the library.
    pub fn create(&mut self) -> Result<Book, StorageError> {
        let mut book = Book::new(generate_id(), now_millis());
        book.genre = Some(UNSET_GENRE.to_string());
        self.insert(book)
    }

    /// Add a fully formed book at the front of the library.
    pub fn insert(&mut self, book: Book) -> Result<Book, StorageError> {
        let mut books = Vec::with_capacity(self.books.len() + 1);
        books.push(book.clone());
        books.extend(self.books.iter().cloned());
        self.commit(books)?;
        info!(book = %book.id, title = %book.title, "Created book");
        Ok(book)
    }

    /// Merge `patch` into the book and refresh its `updated_at`.
    pub fn update(&mut self, id: &str, patch: BookPatch) -> Result<Book, StorageError> {
        let pos = self.position(id)?;
        let mut updated = self.books[pos].clone();
        updated.apply_patch(patch);
        updated.updated_at = now_millis().max(updated.updated_at + 1);
        let mut books = self.books.clone();
        books[pos] = updated.clone();
        self.commit(books)?;
        debug!(book = %id, updated_at = updated.updated_at, "Updated book");
        Ok(updated)
    }

    pub fn delete(&mut self, id: &str) -> Result<Book, StorageError> {
        let pos = self.position(id)?;
        let mut books = self.books.clone();
        let removed = books.remove(pos);
        self.commit(books)?;
        info!(book = %id, "Deleted book");
        Ok(removed)
    }

    pub fn add_stamp(&mut self, id: &str, stamp: Stamp) -> Result<Book, StorageError> {
        let mut stamps = self.require(id)?.stamps.clone();
        stamps.push(stamp);
        self.update(
            id,
            BookPatch {
                stamps: Some(stamps),
                ..BookPatch::default()
            },
        )
    }

    pub fn api_key(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .store
            .get(API_KEY_KEY)?
            .filter(|key| !key.trim().is_empty()))
    }

    pub fn set_api_key(&mut self, key: &str) -> Result<(), StorageError> {
        self.store.set(API_KEY_KEY, key.trim())
    }

    pub fn clear_api_key(&mut self) -> Result<(), StorageError> {
        self.store.remove(API_KEY_KEY)
    }

    pub fn background(&self) -> Result<Option<String>, StorageError> {
        self.store.get(BACKGROUND_KEY)
    }

    pub fn set_background(&mut self, data_url: &str) -> Result<(), StorageError> {
        self.store.set(BACKGROUND_KEY, data_url)
    }

    /// Remove every stored value, books included.
    pub fn clear_all(&mut self) -> Result<(), StorageError> {
        self.store.clear()?;
        self.books.clear();
        warn!("Cleared all stored data");
        Ok(())
    }

    pub fn export_backup(&self) -> Result<String, StorageError> {
        let backup = Backup {
            books: self.books.clone(),
            version: BACKUP_VERSION.to_string(),
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        Ok(serde_json::to_string_pretty(&backup)?)
    }

    /// Replace the library with the books of a backup. Returns the book count.
    pub fn import_backup(&mut self, raw: &str) -> Result<usize, StorageError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| StorageError::InvalidBackup(format!("not JSON: {err}")))?;
        let books = value
            .get("books")
            .filter(|books| books.is_array())
            .cloned()
            .ok_or_else(|| StorageError::InvalidBackup("missing `books` array".to_string()))?;
        let books: Vec<Book> = serde_json::from_value(books)
            .map_err(|err| StorageError::InvalidBackup(format!("malformed book: {err}")))?;
        let count = books.len();
        self.commit(books)?;
        info!(count, "Restored library from backup");
        Ok(count)
    }

    /// Plain-text manuscript of one book.
    pub fn export_text(&self, id: &str) -> Result<String, StorageError> {
        let book = self.require(id)?;
        Ok(format!(
            "タイトル：{}\n著者：{}\n\n{}",
            book.title,
            book.display_author(),
            book.content
        ))
    }

    fn position(&self, id: &str) -> Result<usize, StorageError> {
        self.books
            .iter()
            .position(|book| book.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Store `books`, then adopt them. A failed write leaves memory as it was.
    fn commit(&mut self, books: Vec<Book>) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&books)?;
        self.store.set(BOOKS_KEY, &raw)?;
        self.books = books;
        Ok(())
    }
}
