use crate::types::requests::SamplingParameters;

/// Model names containing any of these fragments are treated as
/// vision-capable; everything else gets the two-stage vision chain when an
/// image is attached.
const VISION_KEYWORDS: &[&str] = &["llava", "vision", "bakllava", "moondream", "minicpm", "cogvlm"];

pub const DEFAULT_VISION_MODEL: &str = "llava:7b";

/// Per-session generation and feature settings. The legacy flat sampling
/// fields are the defaults; `sampling_override` is set when the backend has
/// a persisted `samplingParameters` object, and then travels as that single
/// object instead of the flat fields.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub sampling_override: Option<SamplingParameters>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    pub preferred_vision_model: String,
    pub show_intermediate_output: bool,
    pub cpu_only: bool,
    /// Narrate backend mode switches as SYSTEM messages.
    pub show_mode_switch_messages: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let defaults = SamplingParameters::default();
        Self {
            sampling_override: None,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            top_k: defaults.top_k,
            repeat_penalty: defaults.repeat_penalty,
            preferred_vision_model: DEFAULT_VISION_MODEL.to_string(),
            show_intermediate_output: false,
            cpu_only: false,
            show_mode_switch_messages: true,
        }
    }
}

impl SessionSettings {
    pub fn is_vision_model(model: &str) -> bool {
        let lower = model.to_lowercase();
        VISION_KEYWORDS.iter().any(|k| lower.contains(k))
    }
}
