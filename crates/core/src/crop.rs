//! Crop rectangle type and the passport print geometry.

/// Print width of a passport photo in millimetres.
pub const PRINT_WIDTH_MM: u32 = 35;
/// Print height of a passport photo in millimetres.
pub const PRINT_HEIGHT_MM: u32 = 45;
/// Export width in pixels of the 300 DPI passport target.
pub const EXPORT_WIDTH: u32 = 1050;
/// Export height in pixels of the 300 DPI passport target.
pub const EXPORT_HEIGHT: u32 = 1350;

/// Width / height ratio of the crop rectangle.
pub const CROP_ASPECT: f32 = PRINT_WIDTH_MM as f32 / PRINT_HEIGHT_MM as f32;

/// A region of interest in the pixel space of the displayed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle of the given width whose height follows the 35:45 lock.
    pub fn locked(x: f32, y: f32, width: f32) -> Self {
        Self::new(x, y, width, width * PRINT_HEIGHT_MM as f32 / PRINT_WIDTH_MM as f32)
    }

    /// Positive, finite width and height.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// Whether the rectangle keeps the passport ratio within `tolerance`.
    pub fn is_locked(&self, tolerance: f32) -> bool {
        (self.aspect() - CROP_ASPECT).abs() <= tolerance
    }
}
