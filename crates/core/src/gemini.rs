use crate::config::Config;
use crate::error::{AppError, Result};
use crate::synthesis::{ResponsePart, SynthesisRequest, SynthesisService};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use futures::future::BoxFuture;
use gemini_rust::{Blob, Content, Gemini, Message, Part, Role};
use tracing::{debug, warn};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// [`SynthesisService`] backed by the Gemini `generateContent` endpoint.
///
/// The client is built per call so a missing API key surfaces as an error
/// of that call rather than at startup.
pub struct GeminiService {
    config: Config,
}

impl GeminiService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    fn client(&self) -> Result<Gemini> {
        let api_key = self.config.api_key()?;

        // Explicit base URL avoids the BadScheme error of the default constructor
        let base_url = url::Url::parse(BASE_URL)
            .map_err(|e| AppError::Config(format!("Invalid base URL: {}", e)))?;

        let model_url = format!("{}{}", BASE_URL, model_path(&self.config.model_name));

        Gemini::with_model_and_base_url(api_key, model_url, base_url)
            .map_err(|e| AppError::Config(format!("Failed to create Gemini client: {}", e)))
    }
}

impl SynthesisService for GeminiService {
    fn generate<'a>(&'a self, request: &'a SynthesisRequest) -> BoxFuture<'a, Result<Vec<ResponsePart>>> {
        Box::pin(async move {
            let client = self.client()?;
            let message = build_message(request);

            debug!(model = %self.config.model_name, "calling generateContent");
            let response = client
                .generate_content()
                .with_messages(vec![message])
                .execute()
                .await
                .map_err(|e| AppError::transport(e.to_string()))?;

            // Only the first candidate is considered
            let Some(candidate) = response.candidates.first() else {
                return Ok(Vec::new());
            };
            let Some(parts) = &candidate.content.parts else {
                return Ok(Vec::new());
            };

            Ok(convert_parts(parts))
        })
    }
}

/// `gemini-2.5-flash-image` -> `models/gemini-2.5-flash-image`
fn model_path(model_name: &str) -> String {
    if model_name.starts_with("models/") {
        model_name.to_string()
    } else {
        format!("models/{}", model_name)
    }
}

/// Builds the single user message: instruction, aspect-ratio hint, image.
fn build_message(request: &SynthesisRequest) -> Message {
    let instruction = Part::Text {
        text: request.instruction.clone(),
        thought: None,
        thought_signature: None,
    };

    let aspect_hint = Part::Text {
        text: format!("Output aspect ratio: {}.", request.aspect_ratio),
        thought: None,
        thought_signature: None,
    };

    let image = Part::InlineData {
        inline_data: Blob {
            mime_type: request.image.mime_type().to_string(),
            data: BASE64.encode(request.image.bytes()),
        },
    };

    let content = Content {
        role: Some(Role::User),
        parts: Some(vec![instruction, aspect_hint, image]),
    };

    Message {
        role: Role::User,
        content,
    }
}

/// Maps response parts onto the domain type, in order, up to and including
/// the first inline image that decodes. Later parts are never decoded. A
/// malformed payload is skipped so an earlier or later valid image still
/// counts. Parts other than text and inline data are dropped.
fn convert_parts(parts: &[Part]) -> Vec<ResponsePart> {
    let mut converted = Vec::new();
    for part in parts {
        match part {
            Part::Text { text, .. } => converted.push(ResponsePart::Text(text.clone())),
            Part::InlineData { inline_data, .. } => {
                match BASE64.decode(inline_data.data.as_bytes()) {
                    Ok(data) if !data.is_empty() => {
                        converted.push(ResponsePart::InlineImage {
                            mime_type: inline_data.mime_type.clone(),
                            data,
                        });
                        break;
                    }
                    Ok(_) => debug!("skipping empty image payload"),
                    Err(e) => warn!(error = %e, mime_type = %inline_data.mime_type, "skipping malformed image payload"),
                }
            }
            _ => {}
        }
    }
    converted
}
