//! Transcription model definitions and metadata.
//!
//! Defines the two supported transcription models with their Deepgram model
//! names and metered per-minute rates. The fast model delivers a quick first
//! result, the accurate model the higher-quality second pass in double
//! transcription mode.

use serde::{Deserialize, Serialize};

/// Represents a supported transcription model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    /// Nova 2 model (fast, cheapest)
    Fast,
    /// Whisper Large model (slower, best accuracy)
    Accurate,
}

impl Model {
    /// Returns the model identifier as a string
    pub fn id(&self) -> &'static str {
        match self {
            Model::Fast => "fast",
            Model::Accurate => "accurate",
        }
    }

    /// Returns a human-readable description of the model
    pub fn description(&self) -> &'static str {
        match self {
            Model::Fast => "Nova 2 (fast, cheapest)",
            Model::Accurate => "Whisper Large (slower, best accuracy)",
        }
    }

    /// Returns the API endpoint for this model
    pub fn endpoint(&self) -> &'static str {
        "https://api.deepgram.com/v1/listen"
    }

    /// Returns the model name to send to the API
    pub fn api_model_name(&self) -> &'static str {
        match self {
            Model::Fast => "nova-2",
            Model::Accurate => "whisper-large",
        }
    }

    /// Returns the metered rate in dollars per minute of audio
    pub fn rate_per_minute(&self) -> f64 {
        match self {
            Model::Fast => 0.0043,
            Model::Accurate => 0.0048,
        }
    }

    /// Parses a model ID string into a Model
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "fast" => Some(Model::Fast),
            "accurate" => Some(Model::Accurate),
            _ => None,
        }
    }

    /// Returns all available models
    pub fn all() -> &'static [Self] {
        &[Model::Fast, Model::Accurate]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids_round_trip() {
        for model in Model::all() {
            assert_eq!(Model::from_id(model.id()), Some(*model));
        }
        assert_eq!(Model::from_id("nova-2"), None);
    }

    #[test]
    fn test_api_model_names() {
        assert_eq!(Model::Fast.api_model_name(), "nova-2");
        assert_eq!(Model::Accurate.api_model_name(), "whisper-large");
    }
}
