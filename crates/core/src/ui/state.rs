//! Projection of the session onto the controls the studio shows.

use crate::pipeline::{PipelineState, Session};

/// Which controls are enabled and what the banner says.
///
/// Computed fresh every frame from the [`Session`]; it holds no state of
/// its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub upload_enabled: bool,
    pub synthesize_enabled: bool,
    pub export_enabled: bool,
    pub restart_enabled: bool,
    /// Crop box and zoom slider are shown.
    pub crop_enabled: bool,
    /// A synthesis call is in flight.
    pub busy: bool,
    pub error_banner: Option<String>,
}

impl Controls {
    pub fn project(session: &Session) -> Self {
        let state = session.state();
        Self {
            upload_enabled: session.can_upload(),
            synthesize_enabled: session.can_synthesize(),
            export_enabled: session.can_export(),
            restart_enabled: state != PipelineState::Idle,
            crop_enabled: session.result().is_some(),
            busy: state == PipelineState::Synthesizing,
            error_banner: session.error().map(str::to_string),
        }
    }
}
