//! Main studio application.
//!
//! This module contains the `PassportStudio` struct which implements the
//! `eframe::App` trait: upload, synthesize, crop and export in one window.

use super::crop::{CropEvent, CropFrame, process_crop_input};
use super::rendering::{draw_crop_border, draw_crop_overlay, error_banner, fit_image_rect};
use super::state::Controls;
use crate::config::Config;
use crate::controller::SessionController;
use crate::error::{AppError, Result};
use crate::export;
use crate::gemini::GeminiService;
use crate::image_processing::ImageProcessor;
use crate::pipeline::{ZOOM_MAX, ZOOM_MIN, ZOOM_STEP};
use crate::synthesis::{SynthesisClient, SynthesisService};
use eframe::egui;
use std::path::Path;
use tracing::{info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// The texture currently uploaded, keyed by the buffer it came from.
struct ShownImage {
    key: (usize, usize),
    texture: egui::TextureHandle,
    size: [u32; 2],
}

pub struct PassportStudio<S> {
    controller: SessionController<S>,
    shown: Option<ShownImage>,
    crop_frame: Option<CropFrame>,
    /// Local message for problems that do not change the pipeline state
    /// (unreadable upload, saved file path).
    notice: Option<String>,
}

impl<S: SynthesisService + 'static> PassportStudio<S> {
    pub fn new(controller: SessionController<S>) -> Self {
        Self {
            controller,
            shown: None,
            crop_frame: None,
            notice: None,
        }
    }

    fn open_file(&mut self, path: &Path) {
        match std::fs::read(path) {
            Ok(bytes) => self.load_bytes(bytes),
            Err(e) => self.notice = Some(format!("Could not read {}: {}", path.display(), e)),
        }
    }

    fn load_bytes(&mut self, bytes: Vec<u8>) {
        match self.controller.select_file(bytes) {
            Ok(()) => {
                self.notice = None;
                self.crop_frame = None;
            }
            Err(e) => {
                warn!(error = %e, "upload rejected");
                self.notice = Some(e.to_string());
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context, upload_enabled: bool) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().next() else {
            return;
        };
        if !upload_enabled {
            return;
        }

        if let Some(bytes) = file.bytes {
            self.load_bytes(bytes.to_vec());
        } else if let Some(path) = file.path {
            self.open_file(&path);
        }
    }

    fn restart(&mut self) {
        self.controller.restart();
        self.shown = None;
        self.crop_frame = None;
        self.notice = None;
    }

    fn export(&mut self) {
        let file_name = export::export_file_name(export::timestamp_now());
        let Some(path) = rfd::FileDialog::new()
            .set_file_name(file_name.as_str())
            .add_filter("PNG", &["png"])
            .save_file()
        else {
            return;
        };

        match self.controller.export_to_file(&path) {
            Some(Ok(())) => self.notice = Some(format!("Saved {}", path.display())),
            Some(Err(e)) => warn!(error = %e, "export failed"),
            None => {}
        }
    }

    /// Re-uploads the texture when the displayed image changes.
    fn sync_texture(&mut self, ctx: &egui::Context) {
        let Some(bytes) = self.controller.session().displayed_image() else {
            self.shown = None;
            return;
        };
        let key = (bytes.as_ptr() as usize, bytes.len());
        if self.shown.as_ref().is_some_and(|s| s.key == key) {
            return;
        }

        match ImageProcessor::decode(bytes) {
            Ok(image) => {
                let size = [image.width(), image.height()];
                let rgba = image.to_rgba8();
                let pixels = rgba.as_flat_samples();
                let color_image = egui::ColorImage::from_rgba_unmultiplied(
                    [size[0] as usize, size[1] as usize],
                    pixels.as_slice(),
                );
                let texture = ctx.load_texture("portrait", color_image, egui::TextureOptions::LINEAR);
                self.shown = Some(ShownImage { key, texture, size });
            }
            Err(e) => {
                warn!(error = %e, "displayed image could not be decoded");
                self.shown = None;
            }
        }
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui, controls: &Controls) {
        ui.horizontal(|ui| {
            ui.heading("Passport Studio");
            ui.separator();

            if ui
                .add_enabled(controls.upload_enabled, egui::Button::new("Select photo"))
                .clicked()
            {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_file()
                {
                    self.open_file(&path);
                }
            }

            if ui
                .add_enabled(controls.synthesize_enabled, egui::Button::new("Synthesize"))
                .clicked()
            {
                self.controller.synthesize();
            }

            if controls.busy {
                ui.spinner();
                ui.label("Synthesizing...");
            }

            if ui
                .add_enabled(controls.restart_enabled, egui::Button::new("Restart"))
                .clicked()
            {
                self.restart();
            }

            if controls.crop_enabled {
                ui.separator();
                if let Some(frame) = &mut self.crop_frame {
                    let mut zoom = frame.zoom();
                    let slider = egui::Slider::new(&mut zoom, ZOOM_MIN..=ZOOM_MAX)
                        .step_by(ZOOM_STEP as f64)
                        .text("Zoom");
                    if ui.add(slider).changed() {
                        frame.set_zoom(zoom);
                        self.controller.adjust_zoom(frame.zoom());
                        self.controller.adjust_crop(frame.rect());
                    }
                }

                if ui
                    .add_enabled(controls.export_enabled, egui::Button::new("Export PNG"))
                    .clicked()
                {
                    self.export();
                }
            }
        });

        if let Some(message) = &controls.error_banner {
            if error_banner(ui, message) {
                self.controller.clear_error();
            }
        } else if let Some(notice) = &self.notice {
            ui.label(egui::RichText::new(notice).weak());
        }
    }

    fn render_canvas(&mut self, ui: &mut egui::Ui, controls: &Controls) {
        let available = ui.max_rect();

        let Some(shown) = &self.shown else {
            let hint = if controls.upload_enabled {
                "Select or drop a portrait photo"
            } else {
                "Restart to load another photo"
            };
            ui.centered_and_justified(|ui| ui.label(hint));
            return;
        };

        let size = egui::vec2(shown.size[0] as f32, shown.size[1] as f32);
        let image_rect = fit_image_rect(size, available.shrink(16.0));
        ui.painter().image(
            shown.texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        if !controls.crop_enabled {
            return;
        }

        // The widget reports its initial rectangle as soon as it appears
        let frame = self.crop_frame.get_or_insert_with(|| {
            let frame = CropFrame::new(shown.size[0], shown.size[1]);
            self.controller.adjust_crop(frame.rect());
            frame
        });

        let response = ui.interact(image_rect, ui.id().with("crop"), egui::Sense::drag());
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if process_crop_input(&response, scroll, image_rect, frame) == CropEvent::Changed {
            self.controller.adjust_zoom(frame.zoom());
            self.controller.adjust_crop(frame.rect());
        }

        let crop_rect = frame.screen_rect(image_rect);
        draw_crop_overlay(ui.painter(), image_rect, crop_rect, 150);
        draw_crop_border(ui.painter(), crop_rect, 2.0);
    }
}

impl<S: SynthesisService + 'static> eframe::App for PassportStudio<S> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        if self.controller.poll() > 0 {
            self.crop_frame = None;
        }

        let controls = Controls::project(self.controller.session());
        self.handle_dropped_files(ctx, controls.upload_enabled);
        self.sync_texture(ctx);

        // Input handling may have changed the session
        let controls = Controls::project(self.controller.session());

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.render_toolbar(ui, &controls);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_canvas(ui, &controls);
        });
    }
}

/// Launches the studio window and blocks until it is closed.
pub fn run(config: Config) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Passport Studio")
            .with_inner_size([1100.0, 820.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let prompt = config.prompt.clone();
    let service = GeminiService::new(config);
    info!(model = service.model_name(), "launching studio");
    let client = SynthesisClient::new(service, prompt);

    eframe::run_native(
        "Passport Studio",
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            let controller = SessionController::new(client).with_notifier(move || ctx.request_repaint());
            Ok(Box::new(PassportStudio::new(controller)) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
