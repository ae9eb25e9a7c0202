pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_data_dir() -> String {
    ".kotonoha".to_string()
}

pub(crate) fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

pub(crate) fn default_text_model() -> String {
    "gemini-2.5-flash-preview-09-2025".to_string()
}

pub(crate) fn default_image_model() -> String {
    "imagen-4.0-generate-001".to_string()
}

pub(crate) fn default_speech_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

pub(crate) fn default_voice_name() -> String {
    "Kore".to_string()
}

pub(crate) fn default_system_instruction() -> String {
    "情緒的な日本語を書く小説家として振る舞ってください。".to_string()
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_font_size() -> f32 {
    18.0
}

pub(crate) fn default_line_spacing() -> f32 {
    2.0
}

pub(crate) fn default_viewport_width() -> f32 {
    1280.0
}

pub(crate) fn default_viewport_height() -> f32 {
    800.0
}

pub(crate) fn default_illustration_max_width_ratio() -> f32 {
    0.65
}

pub(crate) fn default_illustration_max_height_ratio() -> f32 {
    0.5
}

pub(crate) fn default_spacer_width_em() -> f32 {
    1.5
}

pub(crate) fn default_narration_indent_em() -> f32 {
    1.0
}
