//! Gemini REST client.
//!
//! Text and speech go through `:generateContent`, images through the Imagen
//! `:predict` endpoint. Request bodies and response extraction are plain
//! functions so they can be checked without a network.

use super::{GenerationError, Generator};
use crate::cancellation::CancellationToken;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub api_base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub speech_model: String,
    pub voice_name: String,
    pub system_instruction: String,
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        crate::config::AppConfig::default().generation_settings()
    }
}

pub struct GeminiClient {
    http: Client,
    api_key: String,
    settings: GenerationSettings,
    cancel: CancellationToken,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        settings: GenerationSettings,
        cancel: CancellationToken,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|err| GenerationError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            api_key,
            settings,
            cancel,
        })
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{model}:{method}",
            self.settings.api_base_url.trim_end_matches('/')
        )
    }

    fn post(
        &self,
        stage: &'static str,
        model: &str,
        method: &str,
        body: &Value,
    ) -> Result<Value, GenerationError> {
        let url = self.endpoint(model, method);
        let payload = serde_json::to_string(body)
            .map_err(|err| GenerationError::Malformed(format!("request body: {err}")))?;
        info!(stage, %url, bytes = payload.len(), "Sending generation request");

        let http = self.http.clone();
        let key = self.api_key.clone();
        let (status, text) = self
            .cancel
            .run_abandonable(stage, move || {
                let response = http
                    .post(&url)
                    .query(&[("key", key.as_str())])
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload)
                    .send()?;
                let status = response.status().as_u16();
                let text = response.text()?;
                Ok::<_, reqwest::Error>((status, text))
            })?
            .map_err(|err| {
                let err = err.without_url();
                warn!(stage, "Generation request failed: {err}");
                GenerationError::Transport(err.to_string())
            })?;

        debug!(stage, status, bytes = text.len(), "Received generation response");
        interpret_response(status, &text)
    }
}

impl Generator for GeminiClient {
    fn generate_text(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, GenerationError> {
        let system = if system_instruction.trim().is_empty() {
            self.settings.system_instruction.as_str()
        } else {
            system_instruction
        };
        let body = text_request(prompt, system);
        let response = self.post("text", &self.settings.text_model, "generateContent", &body)?;
        extract_text(&response)
    }

    fn generate_image(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
        let body = image_request(prompt);
        let response = self.post("image", &self.settings.image_model, "predict", &body)?;
        Ok(extract_image(&response))
    }

    fn generate_speech(
        &self,
        text: &str,
        voice_name: &str,
    ) -> Result<Option<String>, GenerationError> {
        let voice = if voice_name.trim().is_empty() {
            self.settings.voice_name.as_str()
        } else {
            voice_name
        };
        let body = speech_request(text, voice);
        let response = self.post(
            "speech",
            &self.settings.speech_model,
            "generateContent",
            &body,
        )?;
        Ok(extract_audio(&response))
    }
}

pub fn text_request(prompt: &str, system_instruction: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "systemInstruction": { "parts": [{ "text": system_instruction }] }
    })
}

pub fn image_request(prompt: &str) -> Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": { "sampleCount": 1 }
    })
}

pub fn speech_request(text: &str, voice_name: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice_name }
                }
            }
        }
    })
}

/// Turn a raw HTTP outcome into JSON or an error carrying the API's message.
pub fn interpret_response(status: u16, body: &str) -> Result<Value, GenerationError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("API Error: {status}"));
        return Err(GenerationError::Api { status, message });
    }
    serde_json::from_str(body)
        .map_err(|err| GenerationError::Malformed(format!("response is not JSON: {err}")))
}

fn first_candidate_parts(response: &Value) -> Option<&Vec<Value>> {
    response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
}

pub fn extract_text(response: &Value) -> Result<String, GenerationError> {
    first_candidate_parts(response)
        .and_then(|parts| {
            parts
                .iter()
                .find_map(|part| part.get("text").and_then(Value::as_str))
        })
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Malformed("no text in first candidate".to_string()))
}

pub fn extract_image(response: &Value) -> Option<String> {
    response
        .pointer("/predictions/0/bytesBase64Encoded")
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())
        .map(str::to_string)
}

pub fn extract_audio(response: &Value) -> Option<String> {
    first_candidate_parts(response)?
        .iter()
        .find_map(|part| part.pointer("/inlineData/data").and_then(Value::as_str))
        .filter(|data| !data.is_empty())
        .map(str::to_string)
}
