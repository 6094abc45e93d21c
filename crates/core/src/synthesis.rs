//! Synthesis client: one outbound call to the image-generation service.
//!
//! The client builds a [`SynthesisRequest`] from the uploaded portrait and
//! the configured prompt, hands it to a [`SynthesisService`], and picks the
//! first inline image out of the ordered response parts. It never retries
//! and never caches.

use crate::config::PromptConfig;
use crate::error::{AppError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use futures::future::BoxFuture;
use tracing::{info, warn};

/// An encoded image held in memory together with its MIME type.
#[derive(Clone, PartialEq)]
pub struct SourceImage {
    bytes: Vec<u8>,
    mime_type: String,
}

impl std::fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl SourceImage {
    /// Wraps already encoded bytes with an explicit MIME type.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UploadDecodeFailure`] if `bytes` is empty.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AppError::upload("image data is empty"));
        }
        Ok(Self {
            bytes,
            mime_type: mime_type.into(),
        })
    }

    /// Wraps encoded bytes, sniffing the MIME type from the content.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)
            .map_err(|e| AppError::upload(format!("unrecognised image format: {}", e)))?;
        Self::new(bytes, format.to_mime_type())
    }

    /// Parses a `data:<mime>;base64,<payload>` URI.
    ///
    /// The MIME type is taken from the URI header.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AppError::upload("not a data URI"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AppError::upload("data URI has no payload"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AppError::upload("data URI is not base64 encoded"))?;
        if !mime_type.starts_with("image/") {
            return Err(AppError::upload(format!("not an image MIME type: {}", mime_type)));
        }

        let bytes = BASE64
            .decode(payload.trim())
            .map_err(|e| AppError::upload(format!("invalid base64 payload: {}", e)))?;
        Self::new(bytes, mime_type)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// The image picked out of a service response.
#[derive(Clone, PartialEq)]
pub struct SynthesisResult {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for SynthesisResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisResult")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Everything sent to the service for one attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisRequest {
    pub image: SourceImage,
    pub instruction: String,
    pub aspect_ratio: String,
}

impl SynthesisRequest {
    pub fn new(image: SourceImage, prompt: &PromptConfig) -> Self {
        Self {
            image,
            instruction: prompt.instruction.clone(),
            aspect_ratio: prompt.aspect_ratio.clone(),
        }
    }
}

/// One unit of a service response, in the order the service returned it.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponsePart {
    Text(String),
    InlineImage { mime_type: String, data: Vec<u8> },
}

/// The remote image-generation service.
///
/// Implementations issue exactly one request per call and return the
/// response parts unchanged. Failures should be [`AppError::Transport`],
/// or [`AppError::MissingEnvVar`] when no credential is configured.
pub trait SynthesisService: Send + Sync {
    fn generate<'a>(&'a self, request: &'a SynthesisRequest) -> BoxFuture<'a, Result<Vec<ResponsePart>>>;
}

/// Picks the first part that carries image data; later parts are ignored.
///
/// # Errors
///
/// Returns [`AppError::NoImageProduced`] if no part carries an image.
pub fn first_inline_image(parts: Vec<ResponsePart>) -> Result<SynthesisResult> {
    parts
        .into_iter()
        .find_map(|part| match part {
            ResponsePart::InlineImage { mime_type, data } if !data.is_empty() => Some(SynthesisResult {
                bytes: data,
                mime_type,
            }),
            _ => None,
        })
        .ok_or(AppError::NoImageProduced)
}

/// Wraps a [`SynthesisService`] with the prompt configuration.
pub struct SynthesisClient<S> {
    service: S,
    prompt: PromptConfig,
}

impl<S: SynthesisService> SynthesisClient<S> {
    pub fn new(service: S, prompt: PromptConfig) -> Self {
        Self { service, prompt }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Sends the portrait to the service and returns the generated image.
    ///
    /// # Errors
    ///
    /// - [`AppError::NoImageProduced`] when the response has no image part
    /// - whatever the service reported (transport, missing credential)
    pub async fn synthesize(&self, image: &SourceImage) -> Result<SynthesisResult> {
        let request = SynthesisRequest::new(image.clone(), &self.prompt);
        info!(
            mime_type = image.mime_type(),
            bytes = image.bytes().len(),
            aspect_ratio = %request.aspect_ratio,
            "sending synthesis request"
        );

        let parts = self.service.generate(&request).await.inspect_err(|e| {
            warn!(error = %e, "synthesis request failed");
        })?;
        let part_count = parts.len();

        let result = first_inline_image(parts).inspect_err(|_| {
            warn!(part_count, "synthesis response carried no image");
        })?;
        info!(
            mime_type = %result.mime_type,
            bytes = result.bytes.len(),
            part_count,
            "synthesis produced an image"
        );
        Ok(result)
    }
}
