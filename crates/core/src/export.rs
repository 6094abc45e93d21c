//! Naming and writing of exported passport photos.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of every exported file name.
pub const EXPORT_PREFIX: &str = "passport_standard_35x45";

/// `passport_standard_35x45_<timestamp_ms>.png`
pub fn export_file_name(timestamp_ms: i64) -> String {
    format!("{}_{}.png", EXPORT_PREFIX, timestamp_ms)
}

/// Milliseconds since the Unix epoch, used as the file name timestamp.
pub fn timestamp_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Writes `png` into `dir` under the deterministic export name.
///
/// The directory is created if needed.
pub fn save_png(dir: &Path, png: &[u8], timestamp_ms: i64) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(timestamp_ms));
    fs::write(&path, png)?;
    info!(path = %path.display(), bytes = png.len(), "exported passport photo");
    Ok(path)
}
