use crate::generation::GenerationSettings;
use crate::layout::LayoutOptions;
use serde::Deserialize;

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_data_dir")]
    pub data_dir: String,
    #[serde(default = "crate::config::defaults::default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "crate::config::defaults::default_text_model")]
    pub text_model: String,
    #[serde(default = "crate::config::defaults::default_image_model")]
    pub image_model: String,
    #[serde(default = "crate::config::defaults::default_speech_model")]
    pub speech_model: String,
    #[serde(default = "crate::config::defaults::default_voice_name")]
    pub voice_name: String,
    #[serde(default = "crate::config::defaults::default_system_instruction")]
    pub system_instruction: String,
    #[serde(default = "crate::config::defaults::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "crate::config::defaults::default_font_size")]
    pub font_size: f32,
    #[serde(default = "crate::config::defaults::default_line_spacing")]
    pub line_spacing: f32,
    #[serde(default = "crate::config::defaults::default_viewport_width")]
    pub viewport_width: f32,
    #[serde(default = "crate::config::defaults::default_viewport_height")]
    pub viewport_height: f32,
    #[serde(default = "crate::config::defaults::default_illustration_max_width_ratio")]
    pub illustration_max_width_ratio: f32,
    #[serde(default = "crate::config::defaults::default_illustration_max_height_ratio")]
    pub illustration_max_height_ratio: f32,
    #[serde(default = "crate::config::defaults::default_spacer_width_em")]
    pub spacer_width_em: f32,
    #[serde(default = "crate::config::defaults::default_narration_indent_em")]
    pub narration_indent_em: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            data_dir: crate::config::defaults::default_data_dir(),
            api_base_url: crate::config::defaults::default_api_base_url(),
            text_model: crate::config::defaults::default_text_model(),
            image_model: crate::config::defaults::default_image_model(),
            speech_model: crate::config::defaults::default_speech_model(),
            voice_name: crate::config::defaults::default_voice_name(),
            system_instruction: crate::config::defaults::default_system_instruction(),
            request_timeout_secs: crate::config::defaults::default_request_timeout_secs(),
            font_size: crate::config::defaults::default_font_size(),
            line_spacing: crate::config::defaults::default_line_spacing(),
            viewport_width: crate::config::defaults::default_viewport_width(),
            viewport_height: crate::config::defaults::default_viewport_height(),
            illustration_max_width_ratio:
                crate::config::defaults::default_illustration_max_width_ratio(),
            illustration_max_height_ratio:
                crate::config::defaults::default_illustration_max_height_ratio(),
            spacer_width_em: crate::config::defaults::default_spacer_width_em(),
            narration_indent_em: crate::config::defaults::default_narration_indent_em(),
        }
    }
}

impl AppConfig {
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            api_base_url: self.api_base_url.clone(),
            text_model: self.text_model.clone(),
            image_model: self.image_model.clone(),
            speech_model: self.speech_model.clone(),
            voice_name: self.voice_name.clone(),
            system_instruction: self.system_instruction.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            font_size: self.font_size,
            line_spacing: self.line_spacing,
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            illustration_max_width_ratio: self.illustration_max_width_ratio,
            illustration_max_height_ratio: self.illustration_max_height_ratio,
            spacer_width_em: self.spacer_width_em,
            narration_indent_em: self.narration_indent_em,
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
