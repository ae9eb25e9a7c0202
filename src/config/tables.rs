use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

/// On-disk layout of `config.toml`, one table per concern.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    generation: GenerationConfig,
    #[serde(default)]
    layout: LayoutConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            data_dir: tables.storage.data_dir,
            api_base_url: tables.generation.api_base_url,
            text_model: tables.generation.text_model,
            image_model: tables.generation.image_model,
            speech_model: tables.generation.speech_model,
            voice_name: tables.generation.voice_name,
            system_instruction: tables.generation.system_instruction,
            request_timeout_secs: tables.generation.request_timeout_secs,
            font_size: tables.layout.font_size,
            line_spacing: tables.layout.line_spacing,
            viewport_width: tables.layout.viewport_width,
            viewport_height: tables.layout.viewport_height,
            illustration_max_width_ratio: tables.layout.illustration_max_width_ratio,
            illustration_max_height_ratio: tables.layout.illustration_max_height_ratio,
            spacer_width_em: tables.layout.spacer_width_em,
            narration_indent_em: tables.layout.narration_indent_em,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            storage: StorageConfig {
                data_dir: config.data_dir.clone(),
            },
            generation: GenerationConfig {
                api_base_url: config.api_base_url.clone(),
                text_model: config.text_model.clone(),
                image_model: config.image_model.clone(),
                speech_model: config.speech_model.clone(),
                voice_name: config.voice_name.clone(),
                system_instruction: config.system_instruction.clone(),
                request_timeout_secs: config.request_timeout_secs,
            },
            layout: LayoutConfig {
                font_size: config.font_size,
                line_spacing: config.line_spacing,
                viewport_width: config.viewport_width,
                viewport_height: config.viewport_height,
                illustration_max_width_ratio: config.illustration_max_width_ratio,
                illustration_max_height_ratio: config.illustration_max_height_ratio,
                spacer_width_em: config.spacer_width_em,
                narration_indent_em: config.narration_indent_em,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_data_dir")]
    data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: defaults::default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct GenerationConfig {
    #[serde(default = "defaults::default_api_base_url")]
    api_base_url: String,
    #[serde(default = "defaults::default_text_model")]
    text_model: String,
    #[serde(default = "defaults::default_image_model")]
    image_model: String,
    #[serde(default = "defaults::default_speech_model")]
    speech_model: String,
    #[serde(default = "defaults::default_voice_name")]
    voice_name: String,
    #[serde(default = "defaults::default_system_instruction")]
    system_instruction: String,
    #[serde(default = "defaults::default_request_timeout_secs")]
    request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            api_base_url: defaults::default_api_base_url(),
            text_model: defaults::default_text_model(),
            image_model: defaults::default_image_model(),
            speech_model: defaults::default_speech_model(),
            voice_name: defaults::default_voice_name(),
            system_instruction: defaults::default_system_instruction(),
            request_timeout_secs: defaults::default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LayoutConfig {
    #[serde(default = "defaults::default_font_size")]
    font_size: f32,
    #[serde(default = "defaults::default_line_spacing")]
    line_spacing: f32,
    #[serde(default = "defaults::default_viewport_width")]
    viewport_width: f32,
    #[serde(default = "defaults::default_viewport_height")]
    viewport_height: f32,
    #[serde(default = "defaults::default_illustration_max_width_ratio")]
    illustration_max_width_ratio: f32,
    #[serde(default = "defaults::default_illustration_max_height_ratio")]
    illustration_max_height_ratio: f32,
    #[serde(default = "defaults::default_spacer_width_em")]
    spacer_width_em: f32,
    #[serde(default = "defaults::default_narration_indent_em")]
    narration_indent_em: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            font_size: defaults::default_font_size(),
            line_spacing: defaults::default_line_spacing(),
            viewport_width: defaults::default_viewport_width(),
            viewport_height: defaults::default_viewport_height(),
            illustration_max_width_ratio: defaults::default_illustration_max_width_ratio(),
            illustration_max_height_ratio: defaults::default_illustration_max_height_ratio(),
            spacer_width_em: defaults::default_spacer_width_em(),
            narration_indent_em: defaults::default_narration_indent_em(),
        }
    }
}
