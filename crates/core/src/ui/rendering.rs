//! Drawing helpers for the studio: image placement, the dimmed cut-out
//! around the crop box, and the error banner.

use eframe::egui;

/// Fits an image of `image_size` inside `available`, centred, keeping its
/// aspect ratio.
pub fn fit_image_rect(image_size: egui::Vec2, available: egui::Rect) -> egui::Rect {
    if image_size.x <= 0.0 || image_size.y <= 0.0 {
        return egui::Rect::from_center_size(available.center(), egui::Vec2::ZERO);
    }
    let scale = (available.width() / image_size.x).min(available.height() / image_size.y);
    egui::Rect::from_center_size(available.center(), image_size * scale)
}

/// The parts of `image_rect` outside `crop_rect`, as up to four
/// non-overlapping bands: full-width above and below, then left and right
/// of the crop. The crop is clipped to the image first, and empty bands are
/// left out.
pub fn dim_regions(image_rect: egui::Rect, crop_rect: egui::Rect) -> Vec<egui::Rect> {
    let clear = crop_rect.intersect(image_rect);
    if !clear.is_positive() {
        return vec![image_rect];
    }

    [
        egui::Rect::from_min_max(image_rect.min, egui::pos2(image_rect.max.x, clear.min.y)),
        egui::Rect::from_min_max(egui::pos2(image_rect.min.x, clear.max.y), image_rect.max),
        egui::Rect::from_min_max(
            egui::pos2(image_rect.min.x, clear.min.y),
            egui::pos2(clear.min.x, clear.max.y),
        ),
        egui::Rect::from_min_max(
            egui::pos2(clear.max.x, clear.min.y),
            egui::pos2(image_rect.max.x, clear.max.y),
        ),
    ]
    .into_iter()
    .filter(|band| band.is_positive())
    .collect()
}

/// Dims the image outside the crop box. `alpha` is the darkness (0-255).
pub fn draw_crop_overlay(
    painter: &egui::Painter,
    image_rect: egui::Rect,
    crop_rect: egui::Rect,
    alpha: u8,
) {
    let color = egui::Color32::from_black_alpha(alpha);
    for band in dim_regions(image_rect, crop_rect) {
        painter.rect_filled(band, 0.0, color);
    }
}

/// Draws the crop border plus rule-of-thirds guides.
pub fn draw_crop_border(painter: &egui::Painter, crop_rect: egui::Rect, stroke_width: f32) {
    painter.rect_stroke(
        crop_rect,
        0.0,
        egui::Stroke::new(stroke_width, egui::Color32::WHITE),
        egui::StrokeKind::Middle,
    );

    let guide = egui::Stroke::new(1.0, egui::Color32::from_white_alpha(90));
    for i in 1..3 {
        let t = i as f32 / 3.0;
        let x = crop_rect.min.x + crop_rect.width() * t;
        let y = crop_rect.min.y + crop_rect.height() * t;
        painter.line_segment([egui::pos2(x, crop_rect.min.y), egui::pos2(x, crop_rect.max.y)], guide);
        painter.line_segment([egui::pos2(crop_rect.min.x, y), egui::pos2(crop_rect.max.x, y)], guide);
    }
}

/// Single-line red banner with a dismiss button. Returns `true` when the
/// button was clicked.
pub fn error_banner(ui: &mut egui::Ui, message: &str) -> bool {
    let mut dismissed = false;
    egui::Frame::new()
        .fill(egui::Color32::from_rgb(70, 20, 20))
        .inner_margin(6.0)
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(message).color(egui::Color32::from_rgb(255, 120, 120)));
                dismissed = ui.small_button("Dismiss").clicked();
            });
        });
    dismissed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tall_image_is_pillarboxed() {
        let available = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 600.0));
        let rect = fit_image_rect(egui::vec2(2000.0, 3000.0), available);
        assert!((rect.height() - 600.0).abs() < 1e-3);
        assert!((rect.width() - 400.0).abs() < 1e-3);
        assert!((rect.center().x - 400.0).abs() < 1e-3);
    }

    #[test]
    fn empty_image_gets_empty_rect() {
        let available = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(800.0, 600.0));
        assert_eq!(fit_image_rect(egui::Vec2::ZERO, available).area(), 0.0);
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> egui::Rect {
        egui::Rect::from_min_size(egui::pos2(x, y), egui::vec2(w, h))
    }

    #[test]
    fn dim_regions_surround_crop() {
        let image = rect(0.0, 0.0, 100.0, 200.0);
        let crop = rect(20.0, 30.0, 35.0, 45.0);
        let bands = dim_regions(image, crop);

        assert_eq!(bands.len(), 4);
        let area: f32 = bands.iter().map(|b| b.area()).sum();
        assert!((area + crop.area() - image.area()).abs() < 1e-2);
        for band in &bands {
            assert!(!band.intersects(crop.shrink(0.01)), "{band:?}");
        }
    }

    #[test]
    fn crop_touching_edges_leaves_no_empty_bands() {
        let image = rect(0.0, 0.0, 70.0, 90.0);
        assert!(dim_regions(image, image).is_empty());

        // Crop flush with the left and top edges dims only right and bottom.
        let bands = dim_regions(image, rect(0.0, 0.0, 35.0, 45.0));
        assert_eq!(bands.len(), 2);
    }

    #[test]
    fn crop_hanging_off_image_is_clipped() {
        let image = rect(0.0, 0.0, 100.0, 100.0);
        let bands = dim_regions(image, rect(-50.0, -50.0, 100.0, 100.0));
        for band in &bands {
            assert!(image.contains_rect(*band), "{band:?}");
        }
        let area: f32 = bands.iter().map(|b| b.area()).sum();
        assert!((area - 7500.0).abs() < 1e-2);
    }
}
