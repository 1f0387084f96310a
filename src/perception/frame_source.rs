use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::CaptureConfig;
use crate::errors::{DroidClawError, DroidClawResult};
use crate::perception::frame::Frame;
use crate::perception::traits::CaptureSurface;
use crate::perception::types::CaptureSpec;

/// Anything that can produce a fresh frame on demand.
#[async_trait]
pub trait FrameProvider: Send + Sync {
    async fn capture(&self) -> DroidClawResult<Frame>;

    /// Frees the underlying capture resources. Idempotent.
    async fn release(&self);
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub read_timeout: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(cfg: &CaptureConfig) -> Self {
        Self {
            read_timeout: cfg.read_timeout(),
            max_attempts: cfg.max_attempts.max(1),
            retry_delay: cfg.retry_delay(),
        }
    }
}

struct ActiveCapture {
    spec: CaptureSpec,
    surface: Box<dyn CaptureSurface>,
}

/// Owns the live capture surface and turns its padded buffers into frames.
pub struct FrameSource {
    settings: CaptureSettings,
    active: Mutex<Option<ActiveCapture>>,
}

impl FrameSource {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            active: Mutex::new(None),
        }
    }

    /// Attach a surface. Replaces (and releases) any previously attached one.
    pub async fn initialize(&self, spec: CaptureSpec, surface: Box<dyn CaptureSurface>) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            tracing::debug!("re-initializing capture; releasing previous surface");
            previous.surface.release().await;
        }
        tracing::info!(
            width = spec.width,
            height = spec.height,
            dpi = spec.density_dpi,
            "capture surface initialized"
        );
        *active = Some(ActiveCapture { spec, surface });
    }

    pub async fn is_initialized(&self) -> bool {
        self.active.lock().await.is_some()
    }
}

#[async_trait]
impl FrameProvider for FrameSource {
    async fn capture(&self) -> DroidClawResult<Frame> {
        let active = self.active.lock().await;
        let Some(capture) = active.as_ref() else {
            return Err(DroidClawError::NotInitialized);
        };
        let spec = capture.spec;
        let max_attempts = self.settings.max_attempts;

        for attempt in 1..=max_attempts {
            match capture.surface.acquire_latest(self.settings.read_timeout).await {
                Ok(Some(buffer)) => {
                    let frame = Frame::from_padded_rgba(
                        &buffer.data,
                        buffer.width,
                        buffer.height,
                        buffer.row_stride,
                        buffer.pixel_stride,
                    )?;
                    if (buffer.width, buffer.height) != (spec.width, spec.height) {
                        tracing::debug!(
                            from_width = buffer.width,
                            from_height = buffer.height,
                            to_width = spec.width,
                            to_height = spec.height,
                            "scaling frame to capture size"
                        );
                    }
                    let frame = frame.resized(spec.width, spec.height);
                    tracing::debug!(attempt, width = frame.width(), height = frame.height(), "frame captured");
                    return Ok(frame);
                }
                Ok(None) => {
                    tracing::debug!(attempt, "capture surface returned no buffer");
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "capture attempt failed");
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        Err(DroidClawError::CaptureTimeout {
            attempts: max_attempts,
        })
    }

    async fn release(&self) {
        if let Some(capture) = self.active.lock().await.take() {
            capture.surface.release().await;
            tracing::info!("capture surface released");
        }
    }
}
