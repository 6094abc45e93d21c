//! Crop widget geometry.
//!
//! The crop box is described by a centre point and a zoom factor over an
//! image of known size. At zoom 1 the box is the largest 35:45 rectangle
//! that fits inside the image; at zoom `z` each side is divided by `z`.
//! The centre is always clamped so the box stays inside the image.

use crate::crop::{CROP_ASPECT, CropRect};
use crate::pipeline::{ZOOM_MIN, snap_zoom};
use eframe::egui;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropFrame {
    image_width: f32,
    image_height: f32,
    center_x: f32,
    center_y: f32,
    zoom: f32,
}

impl CropFrame {
    /// A centred frame at zoom 1 over a `width`×`height` image.
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        Self {
            image_width: w,
            image_height: h,
            center_x: w / 2.0,
            center_y: h / 2.0,
            zoom: ZOOM_MIN,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn image_size(&self) -> egui::Vec2 {
        egui::vec2(self.image_width, self.image_height)
    }

    /// Largest 35:45 box inside the image.
    fn base_size(&self) -> (f32, f32) {
        if self.image_width / self.image_height > CROP_ASPECT {
            (self.image_height * CROP_ASPECT, self.image_height)
        } else {
            (self.image_width, self.image_width / CROP_ASPECT)
        }
    }

    fn box_size(&self) -> (f32, f32) {
        let (w, h) = self.base_size();
        (w / self.zoom, h / self.zoom)
    }

    fn clamp_center(&mut self) {
        let (w, h) = self.box_size();
        let half_w = w / 2.0;
        let half_h = h / 2.0;
        self.center_x = self.center_x.clamp(half_w, (self.image_width - half_w).max(half_w));
        self.center_y = self.center_y.clamp(half_h, (self.image_height - half_h).max(half_h));
    }

    /// The crop rectangle in image pixels.
    pub fn rect(&self) -> CropRect {
        let (w, h) = self.box_size();
        CropRect::new(self.center_x - w / 2.0, self.center_y - h / 2.0, w, h)
    }

    /// Sets the zoom (clamped and snapped), keeping the centre where possible.
    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = snap_zoom(zoom);
            self.clamp_center();
        }
    }

    /// Moves the box by a delta in image pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.center_x += dx;
        self.center_y += dy;
        self.clamp_center();
    }

    /// Maps the crop rectangle into screen space, given where the image is
    /// drawn.
    pub fn screen_rect(&self, image_rect: egui::Rect) -> egui::Rect {
        let scale = image_rect.width() / self.image_width;
        let crop = self.rect();
        egui::Rect::from_min_size(
            image_rect.min + egui::vec2(crop.x * scale, crop.y * scale),
            egui::vec2(crop.width * scale, crop.height * scale),
        )
    }
}

/// Result of processing pointer input over the crop widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CropEvent {
    /// The box moved or the zoom changed.
    Changed,
    None,
}

/// Applies drag and scroll input to `frame`.
///
/// `image_rect` is the on-screen rectangle the image is drawn into, used to
/// turn screen deltas into image pixels.
pub fn process_crop_input(
    response: &egui::Response,
    scroll_delta: f32,
    image_rect: egui::Rect,
    frame: &mut CropFrame,
) -> CropEvent {
    let before = *frame;
    let scale = image_rect.width() / frame.image_width;

    if response.dragged() && scale > 0.0 {
        let delta = response.drag_delta() / scale;
        frame.pan(delta.x, delta.y);
    }

    if response.hovered() && scroll_delta != 0.0 {
        let step = if scroll_delta > 0.0 { 0.1 } else { -0.1 };
        frame.set_zoom(frame.zoom() + step);
    }

    if *frame != before {
        CropEvent::Changed
    } else {
        CropEvent::None
    }
}
