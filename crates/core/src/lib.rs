//! Passport Studio Core Library
//!
//! Turns a portrait photo into a printable passport picture: the photo is
//! sent to Google's Gemini image model with a fixed instruction (formal
//! clothing, royal-blue background, pose untouched), then cropped to
//! 35:45 and exported as a 1050×1350 PNG.
//!
//! # Overview
//!
//! - **State Machine**: one editing session and its transitions via [`pipeline`]
//! - **Async Driver**: background synthesis and completion delivery via [`controller`]
//! - **AI Integration**: request building and response parsing via [`synthesis`] and [`gemini`]
//! - **Image Processing**: upload validation and export resampling via [`image_processing`]
//! - **User Interface**: the desktop studio via [`ui`]
//!
//! # Quick Start
//!
//! ```ignore
//! use passport_studio_core::{Config, GeminiService, SynthesisClient, SourceImage};
//!
//! let config = Config::load();
//! let client = SynthesisClient::new(GeminiService::new(config.clone()), config.prompt);
//! let portrait = SourceImage::from_bytes(std::fs::read("me.jpg")?)?;
//! let result = client.synthesize(&portrait).await?;
//! ```
//!
//! # Module Structure
//!
//! - [`config`]: Configuration loading and the fixed prompt
//! - [`controller`]: Session driver with background synthesis
//! - [`crop`]: Crop rectangle and print geometry
//! - [`error`]: Error types and result aliases
//! - [`export`]: Output file naming and saving
//! - [`gemini`]: Gemini-backed synthesis service
//! - [`image_processing`]: Decoding, resampling, PNG encoding
//! - [`pipeline`]: Processing state machine
//! - [`synthesis`]: Synthesis client and service trait
//! - [`ui`]: Desktop studio

pub mod config;
pub mod controller;
pub mod crop;
pub mod error;
pub mod export;
pub mod gemini;
pub mod image_processing;
pub mod pipeline;
pub mod synthesis;
pub mod ui;

// Re-export primary types for convenience
pub use config::{Config, PromptConfig};
pub use controller::SessionController;
pub use crop::CropRect;
pub use error::{AppError, Result};
pub use gemini::GeminiService;
pub use image_processing::ImageProcessor;
pub use pipeline::{PipelineState, Session};
pub use synthesis::{SourceImage, SynthesisClient, SynthesisResult, SynthesisService};

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup. This loads `.env` files if
/// present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
