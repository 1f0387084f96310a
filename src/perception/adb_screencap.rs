/// Capture surface backed by `adb exec-out screencap`.
///
/// Each read spawns a short-lived `screencap` on the device and parses its
/// raw output: a little-endian header (width, height, pixel format and, on
/// Android 10+, a colour-space word) followed by tightly packed RGBA rows.
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::{DroidClawError, DroidClawResult};
use crate::perception::frame::RGBA_PIXEL_SIZE;
use crate::perception::traits::{CaptureSurface, RawBuffer};

/// PIXEL_FORMAT_RGBA_8888 in the screencap header.
const FORMAT_RGBA_8888: u32 = 1;

pub struct AdbScreencapSurface {
    serial: Option<String>,
    released: AtomicBool,
}

impl AdbScreencapSurface {
    pub fn new(serial: Option<String>) -> Self {
        Self {
            serial,
            released: AtomicBool::new(false),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("adb");
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(["exec-out", "screencap"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CaptureSurface for AdbScreencapSurface {
    async fn acquire_latest(&self, timeout: Duration) -> DroidClawResult<Option<RawBuffer>> {
        if self.released.load(Ordering::SeqCst) {
            return Err(DroidClawError::Capture("surface already released".into()));
        }

        let output = match tokio::time::timeout(timeout, self.command().output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "screencap read timed out");
                return Ok(None);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DroidClawError::Capture(format!(
                "screencap exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Ok(None);
        }

        parse_screencap(output.stdout).map(Some)
    }

    async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let word = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
}

/// Strip the screencap header and return the pixel payload.
pub fn parse_screencap(mut raw: Vec<u8>) -> DroidClawResult<RawBuffer> {
    let (Some(width), Some(height), Some(format)) =
        (read_u32(&raw, 0), read_u32(&raw, 4), read_u32(&raw, 8))
    else {
        return Err(DroidClawError::Capture("screencap output shorter than header".into()));
    };
    if format != FORMAT_RGBA_8888 {
        return Err(DroidClawError::Capture(format!(
            "unsupported screencap pixel format {format}"
        )));
    }

    let payload = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(RGBA_PIXEL_SIZE))
        .ok_or_else(|| {
            DroidClawError::Capture(format!("implausible screencap size {width}x{height}"))
        })?;
    let header = raw.len().checked_sub(payload).ok_or_else(|| {
        DroidClawError::Capture(format!(
            "screencap payload truncated: {} bytes for {width}x{height}",
            raw.len()
        ))
    })?;
    if header != 12 && header != 16 {
        return Err(DroidClawError::Capture(format!(
            "unexpected screencap header length {header}"
        )));
    }

    raw.drain(..header);
    Ok(RawBuffer {
        width,
        height,
        data: raw,
        row_stride: width as usize * RGBA_PIXEL_SIZE,
        pixel_stride: RGBA_PIXEL_SIZE,
    })
}
