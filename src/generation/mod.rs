//! Access to the external generative API.
//!
//! Calls are blocking and never retried. A failure surfaces once as a
//! [`GenerationError`] and the caller leaves its document untouched.

mod busy;
pub mod gemini;

pub use busy::{BusyGate, BusyGuard};
pub use gemini::{GeminiClient, GenerationSettings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    /// Non-success status; `message` comes from the API when it sends one.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("No API key configured")]
    MissingApiKey,

    #[error("Cancelled at stage={0}")]
    Cancelled(&'static str),

    #[error("{0} is already in progress")]
    Busy(&'static str),
}

impl GenerationError {
    /// Human-readable description suitable for showing once to the user.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// The three generation capabilities the workshop relies on.
pub trait Generator {
    fn generate_text(&self, prompt: &str, system_instruction: &str)
    -> Result<String, GenerationError>;

    /// Base64 image bytes, or `None` when the API produced no image.
    fn generate_image(&self, prompt: &str) -> Result<Option<String>, GenerationError>;

    /// Base64 raw PCM audio, or `None` when the API produced no audio.
    fn generate_speech(
        &self,
        text: &str,
        voice_name: &str,
    ) -> Result<Option<String>, GenerationError>;
}
