//! Asynchronous driver around a [`Session`].
//!
//! The controller lives on the UI thread. Synthesis runs on a background
//! thread with its own single-threaded tokio runtime; its outcome comes
//! back over a channel tagged with the attempt token and is applied by
//! [`SessionController::poll`].

use crate::crop::CropRect;
use crate::error::{AppError, Result};
use crate::export;
use crate::image_processing::ImageProcessor;
use crate::pipeline::{AttemptToken, Completion, Session};
use crate::synthesis::{SynthesisClient, SynthesisResult, SynthesisService};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Completions delivered from background work.
pub(crate) enum PipelineEvent {
    SynthesisFinished {
        token: AttemptToken,
        outcome: Result<SynthesisResult>,
    },
}

type Notifier = Arc<dyn Fn() + Send + Sync>;

pub struct SessionController<S> {
    session: Session,
    client: Arc<SynthesisClient<S>>,
    tx: Sender<PipelineEvent>,
    rx: Receiver<PipelineEvent>,
    notifier: Option<Notifier>,
}

impl<S: SynthesisService + 'static> SessionController<S> {
    pub fn new(client: SynthesisClient<S>) -> Self {
        let (tx, rx) = channel();
        Self {
            session: Session::new(),
            client: Arc::new(client),
            tx,
            rx,
            notifier: None,
        }
    }

    /// Called from the worker thread after it posts a completion, e.g. to
    /// request a repaint.
    pub fn with_notifier(mut self, notify: impl Fn() + Send + Sync + 'static) -> Self {
        self.notifier = Some(Arc::new(notify));
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &SynthesisClient<S> {
        &self.client
    }

    pub fn select_file(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.session.load_file(bytes)
    }

    /// Starts a synthesis attempt in the background.
    ///
    /// Returns `false` without issuing a request if the session refuses
    /// (already synthesizing, nothing uploaded, result present).
    pub fn synthesize(&mut self) -> bool {
        let Some(ticket) = self.session.begin_synthesis() else {
            warn!(state = ?self.session.state(), "synthesize ignored");
            return false;
        };

        let tx = self.tx.clone();
        let client = Arc::clone(&self.client);
        let notifier = self.notifier.clone();

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();

            let outcome = match runtime {
                Ok(rt) => rt.block_on(client.synthesize(&ticket.image)),
                Err(e) => Err(AppError::transport(format!("Failed to create async runtime: {}", e))),
            };

            let _ = tx.send(PipelineEvent::SynthesisFinished {
                token: ticket.token,
                outcome,
            });
            if let Some(notify) = notifier {
                notify();
            }
        });

        true
    }

    /// Applies every completion that has arrived. Returns how many were
    /// applied (stale ones are not counted).
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            if self.apply(event) != Completion::Stale {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks until one completion arrives or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<Completion> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(self.apply(event)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn apply(&mut self, event: PipelineEvent) -> Completion {
        match event {
            PipelineEvent::SynthesisFinished { token, outcome } => {
                self.session.complete_synthesis(token, outcome)
            }
        }
    }

    pub fn restart(&mut self) {
        self.session.restart();
    }

    /// Dismisses the error banner.
    pub fn clear_error(&mut self) {
        self.session.clear_error();
    }

    pub fn adjust_crop(&mut self, crop: CropRect) -> bool {
        self.session.report_crop(crop)
    }

    pub fn adjust_zoom(&mut self, zoom: f32) -> bool {
        self.session.set_zoom(zoom)
    }

    /// Renders the export PNG.
    ///
    /// Returns `None` when export is not possible. A rendering failure is
    /// recorded on the session and also returned.
    pub fn export_png(&mut self) -> Option<Result<Vec<u8>>> {
        let job = self.session.begin_export()?;
        let rendered = ImageProcessor::resample(&job.image.bytes, job.crop);
        if let Err(e) = &rendered {
            self.session.fail_export(e);
        }
        Some(rendered)
    }

    /// Renders the export and writes it to `path`.
    pub fn export_to_file(&mut self, path: &Path) -> Option<Result<()>> {
        let png = match self.export_png()? {
            Ok(png) => png,
            Err(e) => return Some(Err(e)),
        };
        let written = std::fs::write(path, &png).map_err(AppError::from);
        match &written {
            Ok(()) => {
                info!(path = %path.display(), "exported passport photo");
                self.session.finish_export();
            }
            Err(e) => self.session.fail_export(e),
        }
        Some(written)
    }

    /// Renders the export and saves it in `dir` under the timestamped name.
    pub fn export_to_dir(&mut self, dir: &Path) -> Option<Result<PathBuf>> {
        let png = match self.export_png()? {
            Ok(png) => png,
            Err(e) => return Some(Err(e)),
        };
        let saved = export::save_png(dir, &png, export::timestamp_now());
        match &saved {
            Ok(_) => self.session.finish_export(),
            Err(e) => self.session.fail_export(e),
        }
        Some(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptConfig;
    use crate::error::{EXPORT_FAILED_MESSAGE, NO_IMAGE_MESSAGE};
    use crate::pipeline::PipelineState;
    use crate::synthesis::ResponsePart;
    use crate::synthesis::testing::{ScriptedService, image_part};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(10);

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 60, 180])));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png).unwrap();
        buffer
    }

    fn controller(responses: Vec<Result<Vec<ResponsePart>>>) -> SessionController<ScriptedService> {
        let client = SynthesisClient::new(ScriptedService::new(responses), PromptConfig::default());
        SessionController::new(client)
    }

    #[test]
    fn synthesize_is_single_flight() {
        let (release, gate) = mpsc::channel();
        let client = SynthesisClient::new(
            ScriptedService::new(vec![Ok(vec![image_part(1)])]).gated(gate),
            PromptConfig::default(),
        );
        let mut controller = SessionController::new(client);
        controller.select_file(png(20, 30)).unwrap();

        assert!(controller.synthesize());
        assert!(!controller.synthesize());
        assert_eq!(controller.session().state(), PipelineState::Synthesizing);

        release.send(()).unwrap();
        assert_eq!(controller.wait(WAIT), Some(Completion::Applied));
        assert_eq!(controller.client().service().call_count(), 1);
        assert_eq!(controller.session().state(), PipelineState::ResultReady);
    }

    #[test]
    fn transport_error_surfaces_service_message() {
        let mut controller = controller(vec![Err(AppError::transport("rate limited"))]);
        controller.select_file(png(20, 30)).unwrap();
        controller.synthesize();

        assert_eq!(controller.wait(WAIT), Some(Completion::Failed));
        assert_eq!(controller.session().state(), PipelineState::Error);
        assert_eq!(controller.session().error(), Some("rate limited"));
    }

    #[test]
    fn zero_image_parts_surface_guidance_message() {
        let mut controller = controller(vec![Ok(vec![ResponsePart::Text("no".into())])]);
        controller.select_file(png(20, 30)).unwrap();
        controller.synthesize();

        assert_eq!(controller.wait(WAIT), Some(Completion::Failed));
        assert_eq!(controller.session().error(), Some(NO_IMAGE_MESSAGE));
        assert!(controller.session().result().is_none());
    }

    #[test]
    fn restart_before_completion_discards_late_response() {
        let (release, gate) = mpsc::channel();
        let client = SynthesisClient::new(
            ScriptedService::new(vec![Ok(vec![image_part(1)])]).gated(gate),
            PromptConfig::default(),
        );
        let mut controller = SessionController::new(client);
        controller.select_file(png(20, 30)).unwrap();
        controller.synthesize();

        controller.restart();
        release.send(()).unwrap();

        assert_eq!(controller.wait(WAIT), Some(Completion::Stale));
        assert_eq!(controller.session().state(), PipelineState::Idle);
        assert!(controller.session().result().is_none());
    }

    #[test]
    fn export_without_crop_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let mut controller = controller(vec![Ok(vec![ResponsePart::InlineImage {
            mime_type: "image/png".into(),
            data: png(70, 90),
        }])]);

        assert!(controller.export_to_dir(tmp.path()).is_none());

        controller.select_file(png(20, 30)).unwrap();
        assert!(controller.export_to_dir(tmp.path()).is_none());

        controller.synthesize();
        controller.wait(WAIT);
        assert!(controller.export_to_dir(tmp.path()).is_none());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn undecodable_result_reports_export_failure() {
        let mut controller = controller(vec![Ok(vec![image_part(1)])]);
        controller.select_file(png(20, 30)).unwrap();
        controller.synthesize();
        controller.wait(WAIT);
        controller.adjust_crop(CropRect::locked(0.0, 0.0, 35.0));

        let err = controller.export_png().unwrap().unwrap_err();
        assert!(matches!(err, AppError::DecodeFailure(_)));
        assert_eq!(controller.session().state(), PipelineState::ResultReady);
        assert!(controller.session().error().is_some());
    }

    #[test]
    fn export_after_failed_write_clears_banner() {
        let tmp = tempfile::tempdir().unwrap();
        let mut controller = controller(vec![Ok(vec![ResponsePart::InlineImage {
            mime_type: "image/png".into(),
            data: png(70, 90),
        }])]);
        controller.select_file(png(20, 30)).unwrap();
        controller.synthesize();
        controller.wait(WAIT);
        controller.adjust_crop(CropRect::locked(0.0, 0.0, 70.0));

        let missing = tmp.path().join("missing").join("out.png");
        assert!(controller.export_to_file(&missing).unwrap().is_err());
        assert_eq!(controller.session().error(), Some(EXPORT_FAILED_MESSAGE));

        controller.export_to_file(&tmp.path().join("out.png")).unwrap().unwrap();
        assert_eq!(controller.session().error(), None);
        assert_eq!(controller.session().state(), PipelineState::ResultReady);
    }

    #[test]
    fn portrait_to_passport_print() {
        let tmp = tempfile::tempdir().unwrap();
        let mut controller = controller(vec![Ok(vec![
            ResponsePart::Text("done".into()),
            ResponsePart::InlineImage {
                mime_type: "image/png".into(),
                data: png(2000, 3000),
            },
        ])]);

        controller.select_file(png(2000, 3000)).unwrap();
        assert!(controller.synthesize());
        assert_eq!(controller.wait(WAIT), Some(Completion::Applied));

        assert!(controller.adjust_crop(CropRect::new(100.0, 50.0, 700.0, 900.0)));
        let path = controller.export_to_dir(tmp.path()).unwrap().unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("passport_standard_35x45_"));
        assert!(name.ends_with(".png"));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let exported = image::load_from_memory(&bytes).unwrap();
        assert_eq!((exported.width(), exported.height()), (1050, 1350));
    }
}
