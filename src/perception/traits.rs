use std::time::Duration;

use async_trait::async_trait;

use crate::errors::DroidClawResult;

/// One raw buffer as handed out by the capture hardware.
#[derive(Debug, Clone)]
pub struct RawBuffer {
    /// Pixel dimensions of the buffer as produced, which may differ from
    /// the size the capture was configured for.
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// Bytes between the starts of two consecutive rows.
    pub row_stride: usize,
    /// Bytes per pixel.
    pub pixel_stride: usize,
}

/// A live display mirror that can be sampled for its most recent buffer.
///
/// Implementations own the platform objects behind the mirror (virtual
/// display, image reader, helper process) and free them in `release`.
#[async_trait]
pub trait CaptureSurface: Send + Sync {
    /// Returns the latest available buffer, or `None` when nothing arrived
    /// within `timeout`.
    async fn acquire_latest(&self, timeout: Duration) -> DroidClawResult<Option<RawBuffer>>;

    /// Must be safe to call more than once.
    async fn release(&self);
}
