//! Desktop studio for passport photos.
//!
//! # Architecture
//!
//! The UI is split into focused submodules:
//! - [`state`]: projection of the session onto enabled controls
//! - [`crop`]: crop widget geometry and input handling
//! - [`rendering`]: drawing helpers for the image, cut-out and banner
//! - [`studio`]: main application logic
//!
//! # Usage
//!
//! ```ignore
//! use passport_studio_core::{ui, Config};
//!
//! ui::run_studio(Config::load())?;
//! ```

pub mod crop;
mod rendering;
mod state;
mod studio;

// Public API exports
pub use crop::CropFrame;
pub use state::Controls;
pub use studio::PassportStudio;

use crate::config::Config;
use crate::error::Result;

/// Opens the studio window and blocks until it is closed.
///
/// # Errors
///
/// Returns [`crate::AppError::Ui`] if the window cannot be created.
pub fn run_studio(config: Config) -> Result<()> {
    studio::run(config)
}
