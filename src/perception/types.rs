use serde::{Deserialize, Serialize};

/// Geometry the capture surface was set up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSpec {
    pub width: u32,
    pub height: u32,
    pub density_dpi: u32,
}

impl From<&crate::config::CaptureConfig> for CaptureSpec {
    fn from(cfg: &crate::config::CaptureConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            density_dpi: cfg.density_dpi,
        }
    }
}
