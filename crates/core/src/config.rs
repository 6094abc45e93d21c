//! Configuration loading and management.
//!
//! Values come from the environment (including a `.env` file). The API key
//! is optional at load time: its absence only becomes an error when a
//! synthesis call actually needs it, see [`Config::api_key`].

use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;

/// Model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Aspect-ratio hint sent with every synthesis request.
pub const SYNTHESIS_ASPECT_RATIO: &str = "3:4";

/// Fixed instruction sent with every synthesis request.
pub const PASSPORT_INSTRUCTION: &str = "Edit this portrait into a formal passport photo. \
Keep the subject's pose, face, facial features, expression and head position exactly as they are; \
do not move, rotate or resize the head. \
Replace the clothing with a professional dark suit, a crisp white shirt and a dark tie. \
Replace the background with a solid, flat royal blue color. \
Use even, soft studio lighting on the face with no harsh shadows.";

/// The prompt half of a synthesis request.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptConfig {
    pub instruction: String,
    pub aspect_ratio: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            instruction: PASSPORT_INSTRUCTION.to_string(),
            aspect_ratio: SYNTHESIS_ASPECT_RATIO.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub model_name: String,
    pub prompt: PromptConfig,
}

impl Config {
    pub fn load() -> Self {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let model_name = env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            gemini_api_key,
            model_name,
            prompt: PromptConfig::default(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the API key, or the error to surface when it is missing.
    pub fn api_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| AppError::MissingEnvVar("GEMINI_API_KEY".to_string()))
    }
}

/// Builder for a [`Config`] that does not touch the environment.
#[derive(Default)]
pub struct ConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    prompt: Option<PromptConfig>,
}

impl ConfigBuilder {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_prompt(mut self, prompt: PromptConfig) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn build(self) -> Result<Config> {
        let model_name = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model_name.trim().is_empty() {
            return Err(AppError::config("model name must not be empty"));
        }

        let prompt = self.prompt.unwrap_or_default();
        if prompt.instruction.trim().is_empty() {
            return Err(AppError::config("instruction text must not be empty"));
        }

        Ok(Config {
            gemini_api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            model_name,
            prompt,
        })
    }
}
