//! Processing state machine for one editing session.
//!
//! The photo moves through:
//!
//! ```text
//! Idle ──load──▶ ImageLoaded ──begin_synthesis──▶ Synthesizing ──ok──▶ ResultReady
//!   ▲                ▲                                │                    │
//!   │                └──────── clear_error ───── Error ◀──err──┘           │
//!   └──────────────────────────── restart ◀────────────────────────────────┘
//! ```
//!
//! [`Session`] owns every entity of the session and exposes a closed set of
//! transitions. Asynchronous completions are applied through
//! [`Session::complete_synthesis`], which checks the attempt token so a
//! response that arrives after a restart is discarded.

use crate::crop::CropRect;
use crate::error::{AppError, EXPORT_FAILED_MESSAGE, Result};
use crate::image_processing::ImageProcessor;
use crate::synthesis::{SourceImage, SynthesisResult};
use tracing::{debug, info, warn};

/// Lower bound of the zoom control.
pub const ZOOM_MIN: f32 = 1.0;
/// Upper bound of the zoom control.
pub const ZOOM_MAX: f32 = 3.0;
/// Increment of the zoom control.
pub const ZOOM_STEP: f32 = 0.1;

/// Where the session is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ImageLoaded,
    Synthesizing,
    ResultReady,
    Error,
}

/// Identifies one synthesis attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptToken(u64);

/// Handed out by [`Session::begin_synthesis`]: what to send and how to
/// report back.
#[derive(Debug, Clone)]
pub struct SynthesisTicket {
    pub token: AttemptToken,
    pub image: SourceImage,
}

/// What [`Session::complete_synthesis`] did with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed,
    /// The token was not the current attempt; nothing changed.
    Stale,
}

/// Handed out by [`Session::begin_export`].
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub image: SynthesisResult,
    pub crop: CropRect,
}

/// All state of one editing session.
#[derive(Debug)]
pub struct Session {
    state: PipelineState,
    source: Option<SourceImage>,
    result: Option<SynthesisResult>,
    crop: Option<CropRect>,
    zoom: f32,
    error: Option<String>,
    attempt: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            source: None,
            result: None,
            crop: None,
            zoom: ZOOM_MIN,
            error: None,
            attempt: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn result(&self) -> Option<&SynthesisResult> {
        self.result.as_ref()
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// The current banner message, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Encoded bytes of the image currently on screen: the result once
    /// there is one, the upload before that.
    pub fn displayed_image(&self) -> Option<&[u8]> {
        self.result
            .as_ref()
            .map(|r| r.bytes.as_slice())
            .or_else(|| self.source.as_ref().map(|s| s.bytes()))
    }

    /// Uploads are only accepted before any result or error exists.
    pub fn can_upload(&self) -> bool {
        matches!(self.state, PipelineState::Idle | PipelineState::ImageLoaded)
    }

    pub fn can_synthesize(&self) -> bool {
        self.source.is_some()
            && matches!(self.state, PipelineState::ImageLoaded | PipelineState::Error)
    }

    pub fn can_export(&self) -> bool {
        self.state == PipelineState::ResultReady && self.result.is_some() && self.crop.is_some()
    }

    /// Accepts a decoded upload.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Ui`] when uploads are disabled; the session is
    /// left untouched.
    pub fn load_image(&mut self, image: SourceImage) -> Result<()> {
        if !self.can_upload() {
            return Err(AppError::ui("upload is disabled until the session is restarted"));
        }

        info!(mime_type = image.mime_type(), bytes = image.bytes().len(), "image loaded");
        self.source = Some(image);
        self.state = PipelineState::ImageLoaded;
        Ok(())
    }

    /// Validates raw file bytes as an image, then loads them.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UploadDecodeFailure`] if the bytes are not a
    /// readable image. The state does not advance.
    pub fn load_file(&mut self, bytes: Vec<u8>) -> Result<()> {
        if !self.can_upload() {
            return Err(AppError::ui("upload is disabled until the session is restarted"));
        }

        Self::check_decodes(&bytes)?;
        self.load_image(SourceImage::from_bytes(bytes)?)
    }

    /// Loads a `data:<mime>;base64,...` URI. The MIME type comes from the
    /// URI header; the payload must still decode as an image.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UploadDecodeFailure`] for a malformed URI or an
    /// unreadable payload. The state does not advance.
    pub fn load_data_uri(&mut self, uri: &str) -> Result<()> {
        if !self.can_upload() {
            return Err(AppError::ui("upload is disabled until the session is restarted"));
        }

        let image = SourceImage::from_data_uri(uri).inspect_err(|e| {
            warn!(error = %e, "rejected data URI");
        })?;
        Self::check_decodes(image.bytes())?;
        self.load_image(image)
    }

    fn check_decodes(bytes: &[u8]) -> Result<()> {
        let (width, height) = ImageProcessor::validate_upload(bytes).inspect_err(|e| {
            warn!(error = %e, "rejected upload");
        })?;
        info!(width, height, "upload decoded");
        Ok(())
    }

    /// Starts a synthesis attempt.
    ///
    /// Returns `None` (and changes nothing) while an attempt is in flight,
    /// when there is no source image, or once a result exists.
    pub fn begin_synthesis(&mut self) -> Option<SynthesisTicket> {
        if !self.can_synthesize() {
            return None;
        }
        let image = self.source.clone()?;

        self.attempt += 1;
        self.state = PipelineState::Synthesizing;
        self.error = None;
        self.result = None;
        self.crop = None;

        info!(attempt = self.attempt, "synthesis started");
        Some(SynthesisTicket {
            token: AttemptToken(self.attempt),
            image,
        })
    }

    /// Applies the outcome of the attempt identified by `token`.
    pub fn complete_synthesis(
        &mut self,
        token: AttemptToken,
        outcome: Result<SynthesisResult>,
    ) -> Completion {
        if token != AttemptToken(self.attempt) || self.state != PipelineState::Synthesizing {
            warn!(
                token = token.0,
                current = self.attempt,
                state = ?self.state,
                "discarding stale synthesis completion"
            );
            return Completion::Stale;
        }

        match outcome {
            Ok(result) => {
                info!(attempt = self.attempt, bytes = result.bytes.len(), "synthesis result ready");
                self.result = Some(result);
                self.crop = None;
                self.zoom = ZOOM_MIN;
                self.state = PipelineState::ResultReady;
                Completion::Applied
            }
            Err(e) => {
                warn!(attempt = self.attempt, error = %e, "synthesis failed");
                self.error = Some(e.user_message());
                self.state = PipelineState::Error;
                Completion::Failed
            }
        }
    }

    /// Drops everything and returns to Idle. Any attempt in flight becomes
    /// stale.
    pub fn restart(&mut self) {
        info!(state = ?self.state, "session restarted");
        self.attempt += 1;
        self.state = PipelineState::Idle;
        self.source = None;
        self.result = None;
        self.crop = None;
        self.zoom = ZOOM_MIN;
        self.error = None;
    }

    /// Dismisses the banner. After a synthesis error the session goes back
    /// to ImageLoaded so the attempt can be retried; after an export failure
    /// the result stays.
    pub fn clear_error(&mut self) {
        if self.state == PipelineState::ResultReady {
            self.error = None;
        } else if self.state == PipelineState::Error {
            self.error = None;
            self.state = if self.source.is_some() {
                PipelineState::ImageLoaded
            } else {
                PipelineState::Idle
            };
        }
    }

    /// Records the crop widget's latest rectangle. Ignored without a result.
    pub fn report_crop(&mut self, crop: CropRect) -> bool {
        if self.result.is_none() || !crop.is_valid() {
            return false;
        }
        if !crop.is_locked(1e-3) {
            debug!(aspect = crop.aspect(), "crop is not 35:45, export will stretch it");
        }
        self.crop = Some(crop);
        true
    }

    /// Sets the zoom, clamped to [`ZOOM_MIN`]..=[`ZOOM_MAX`] and snapped to
    /// [`ZOOM_STEP`]. Ignored without a result.
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        if self.result.is_none() || !zoom.is_finite() {
            return false;
        }
        self.zoom = snap_zoom(zoom);
        true
    }

    /// Returns the work for an export, or `None` if export is not possible.
    pub fn begin_export(&self) -> Option<ExportJob> {
        if !self.can_export() {
            return None;
        }
        Some(ExportJob {
            image: self.result.clone()?,
            crop: self.crop?,
        })
    }

    /// Records a successful export, clearing an earlier export failure.
    pub fn finish_export(&mut self) {
        if self.state == PipelineState::ResultReady {
            self.error = None;
        }
    }

    /// Records an export failure. State and result stay as they are.
    pub fn fail_export(&mut self, error: &AppError) {
        warn!(error = %error, "export failed");
        self.error = Some(EXPORT_FAILED_MESSAGE.to_string());
    }
}

/// Clamps to the zoom range and rounds to the nearest step.
pub fn snap_zoom(zoom: f32) -> f32 {
    let steps = ((zoom.clamp(ZOOM_MIN, ZOOM_MAX) - ZOOM_MIN) / ZOOM_STEP).round();
    (ZOOM_MIN + steps * ZOOM_STEP).clamp(ZOOM_MIN, ZOOM_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NO_IMAGE_MESSAGE;
    use crate::synthesis::testing::portrait;
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

    fn result(tag: u8) -> SynthesisResult {
        SynthesisResult {
            bytes: vec![tag; 8],
            mime_type: "image/png".into(),
        }
    }

    fn loaded() -> Session {
        let mut session = Session::new();
        session.load_image(portrait()).unwrap();
        session
    }

    fn ready() -> Session {
        let mut session = loaded();
        let ticket = session.begin_synthesis().unwrap();
        assert_eq!(session.complete_synthesis(ticket.token, Ok(result(1))), Completion::Applied);
        session
    }

    fn failed() -> Session {
        let mut session = loaded();
        let ticket = session.begin_synthesis().unwrap();
        session.complete_synthesis(ticket.token, Err(AppError::NoImageProduced));
        session
    }

    #[test]
    fn starts_idle_and_cannot_synthesize() {
        let mut session = Session::new();
        assert_eq!(session.state(), PipelineState::Idle);
        assert!(session.begin_synthesis().is_none());
    }

    #[test]
    fn upload_moves_to_image_loaded() {
        let session = loaded();
        assert_eq!(session.state(), PipelineState::ImageLoaded);
        assert_eq!(session.source(), Some(&portrait()));
    }

    #[test]
    fn undecodable_upload_does_not_advance() {
        let mut session = Session::new();
        let err = session.load_file(b"not an image".to_vec()).unwrap_err();
        assert!(matches!(err, AppError::UploadDecodeFailure(_)));
        assert_eq!(session.state(), PipelineState::Idle);
        assert!(session.source().is_none());
    }

    #[test]
    fn second_begin_while_in_flight_is_refused() {
        let mut session = loaded();
        let first = session.begin_synthesis();
        assert!(first.is_some());
        assert!(session.begin_synthesis().is_none());
        assert_eq!(session.state(), PipelineState::Synthesizing);
    }

    #[test]
    fn success_stores_result_and_resets_crop() {
        let session = ready();
        assert_eq!(session.state(), PipelineState::ResultReady);
        assert_eq!(session.result(), Some(&result(1)));
        assert_eq!(session.displayed_image(), Some(&[1u8; 8][..]));
        assert!(session.crop().is_none());
        assert_eq!(session.zoom(), ZOOM_MIN);
    }

    #[test]
    fn no_image_failure_sets_guidance_message() {
        let session = failed();
        assert_eq!(session.state(), PipelineState::Error);
        assert_eq!(session.error(), Some(NO_IMAGE_MESSAGE));
        assert!(session.result().is_none());
    }

    #[test]
    fn transport_failure_shows_service_message() {
        let mut session = loaded();
        let ticket = session.begin_synthesis().unwrap();
        session.complete_synthesis(ticket.token, Err(AppError::transport("rate limited")));
        assert_eq!(session.state(), PipelineState::Error);
        assert_eq!(session.error(), Some("rate limited"));
    }

    #[test]
    fn retry_from_error_clears_message() {
        let mut session = failed();
        assert!(session.can_synthesize());
        let ticket = session.begin_synthesis().unwrap();
        assert!(session.error().is_none());
        session.complete_synthesis(ticket.token, Ok(result(2)));
        assert_eq!(session.state(), PipelineState::ResultReady);
    }

    #[test]
    fn clear_error_returns_to_image_loaded() {
        let mut session = failed();
        session.clear_error();
        assert_eq!(session.state(), PipelineState::ImageLoaded);
        assert!(session.error().is_none());
        assert!(session.source().is_some());
    }

    #[test]
    fn upload_is_refused_once_result_or_error_exists() {
        let mut session = ready();
        assert!(!session.can_upload());
        assert!(session.load_image(portrait()).is_err());
        assert_eq!(session.result(), Some(&result(1)));

        let mut session = failed();
        assert!(session.load_image(portrait()).is_err());
        assert_eq!(session.state(), PipelineState::Error);
    }

    #[test]
    fn restart_clears_everything() {
        for mut session in [ready(), failed()] {
            session.report_crop(CropRect::locked(0.0, 0.0, 35.0));
            session.restart();
            assert_eq!(session.state(), PipelineState::Idle);
            assert!(session.source().is_none());
            assert!(session.result().is_none());
            assert!(session.crop().is_none());
            assert!(session.error().is_none());
            assert!(session.can_upload());
        }
    }

    #[test]
    fn completion_after_restart_is_stale() {
        let mut session = loaded();
        let ticket = session.begin_synthesis().unwrap();
        session.restart();

        assert_eq!(session.complete_synthesis(ticket.token, Ok(result(3))), Completion::Stale);
        assert_eq!(session.state(), PipelineState::Idle);
        assert!(session.result().is_none());
    }

    #[test]
    fn completion_of_superseded_attempt_is_stale() {
        let mut session = loaded();
        let old = session.begin_synthesis().unwrap();
        session.restart();
        session.load_image(portrait()).unwrap();
        let current = session.begin_synthesis().unwrap();

        assert_eq!(session.complete_synthesis(old.token, Ok(result(4))), Completion::Stale);
        assert_eq!(session.state(), PipelineState::Synthesizing);
        assert_eq!(session.complete_synthesis(current.token, Ok(result(5))), Completion::Applied);
        assert_eq!(session.result(), Some(&result(5)));
    }

    #[test]
    fn crop_and_zoom_need_a_result() {
        let mut session = loaded();
        assert!(!session.report_crop(CropRect::locked(0.0, 0.0, 35.0)));
        assert!(!session.set_zoom(2.0));

        let mut session = ready();
        assert!(session.report_crop(CropRect::locked(0.0, 0.0, 35.0)));
        assert!(session.set_zoom(2.0));
        assert_eq!(session.state(), PipelineState::ResultReady);
    }

    #[test]
    fn zoom_is_clamped_and_snapped() {
        let mut session = ready();
        session.set_zoom(5.0);
        assert_eq!(session.zoom(), ZOOM_MAX);
        session.set_zoom(0.2);
        assert_eq!(session.zoom(), ZOOM_MIN);
        session.set_zoom(1.234);
        assert!((session.zoom() - 1.2).abs() < 1e-4);
        assert!(!session.set_zoom(f32::NAN));
    }

    #[test]
    fn export_requires_result_ready_and_a_crop() {
        assert!(loaded().begin_export().is_none());
        assert!(failed().begin_export().is_none());

        let mut session = ready();
        assert!(session.begin_export().is_none());

        let crop = CropRect::new(100.0, 50.0, 700.0, 900.0);
        session.report_crop(crop);
        let job = session.begin_export().unwrap();
        assert_eq!(job.crop, crop);
        assert_eq!(job.image, result(1));
    }

    #[test]
    fn export_failure_keeps_state_and_result() {
        let mut session = ready();
        session.report_crop(CropRect::locked(0.0, 0.0, 35.0));
        session.fail_export(&AppError::rendering("no canvas"));

        assert_eq!(session.state(), PipelineState::ResultReady);
        assert_eq!(session.result(), Some(&result(1)));
        assert_eq!(session.error(), Some(EXPORT_FAILED_MESSAGE));
        assert!(session.begin_export().is_some());
    }

    #[test]
    fn data_uri_upload_keeps_header_mime_type() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(4, 6))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let uri = format!("data:image/x-portrait;base64,{}", BASE64.encode(&bytes));

        let mut session = Session::new();
        session.load_data_uri(&uri).unwrap();

        assert_eq!(session.state(), PipelineState::ImageLoaded);
        assert_eq!(session.source().unwrap().mime_type(), "image/x-portrait");
        assert_eq!(session.source().unwrap().bytes(), bytes.as_slice());
    }

    #[test]
    fn undecodable_data_uri_does_not_advance() {
        let mut session = Session::new();
        let err = session.load_data_uri("data:image/png;base64,AAEC").unwrap_err();
        assert!(matches!(err, AppError::UploadDecodeFailure(_)));
        assert_eq!(session.state(), PipelineState::Idle);

        let mut session = ready();
        assert!(session.load_data_uri("data:image/png;base64,AAEC").is_err());
        assert_eq!(session.state(), PipelineState::ResultReady);
    }

    #[test]
    fn successful_export_clears_earlier_failure() {
        let mut session = ready();
        session.report_crop(CropRect::locked(0.0, 0.0, 35.0));
        session.fail_export(&AppError::rendering("no canvas"));

        session.finish_export();

        assert_eq!(session.error(), None);
        assert_eq!(session.state(), PipelineState::ResultReady);
    }

    #[test]
    fn dismissing_export_banner_keeps_result() {
        let mut session = ready();
        session.fail_export(&AppError::rendering("no canvas"));

        session.clear_error();

        assert_eq!(session.error(), None);
        assert_eq!(session.state(), PipelineState::ResultReady);
        assert!(session.result().is_some());
    }
}
