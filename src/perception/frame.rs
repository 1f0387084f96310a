/// Decoded screen frames.
///
/// Capture hardware hands out RGBA buffers whose rows are padded to an
/// alignment boundary (`row_stride >= width * pixel_stride`). A `Frame` is
/// always tightly packed: exactly `width * height` pixels, no padding.
use base64::Engine as _;
use image::imageops::FilterType;
use image::RgbaImage;

use crate::errors::{DroidClawError, DroidClawResult};

/// Bytes per pixel for RGBA_8888, the only layout the capture surface produces.
pub const RGBA_PIXEL_SIZE: usize = 4;

#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
}

impl Frame {
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Rebuild a `width × height` frame from a row-padded buffer, copying
    /// row by row and skipping the `row_stride - width * pixel_stride`
    /// padding bytes at the end of every row.
    pub fn from_padded_rgba(
        data: &[u8],
        width: u32,
        height: u32,
        row_stride: usize,
        pixel_stride: usize,
    ) -> DroidClawResult<Self> {
        if width == 0 || height == 0 {
            return Err(DroidClawError::Capture("zero-size frame".into()));
        }
        if pixel_stride != RGBA_PIXEL_SIZE {
            return Err(DroidClawError::Capture(format!(
                "unsupported pixel stride {pixel_stride} (expected {RGBA_PIXEL_SIZE})"
            )));
        }

        let row_bytes = width as usize * pixel_stride;
        if row_stride < row_bytes {
            return Err(DroidClawError::Capture(format!(
                "row stride {row_stride} smaller than row width {row_bytes}"
            )));
        }

        // The last row may omit its trailing padding.
        let needed = row_stride
            .checked_mul(height as usize - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or_else(|| DroidClawError::Capture("frame size overflows".into()))?;
        if data.len() < needed {
            return Err(DroidClawError::Capture(format!(
                "buffer too short: {} bytes, need {needed}",
                data.len()
            )));
        }

        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in data.chunks(row_stride).take(height as usize) {
            packed.extend_from_slice(&row[..row_bytes]);
        }

        let image = RgbaImage::from_raw(width, height, packed)
            .ok_or_else(|| DroidClawError::Capture("packed buffer size mismatch".into()))?;
        Ok(Self { image })
    }

    /// Scale to exactly `width × height`. A no-op when already that size.
    pub fn resized(self, width: u32, height: u32) -> Self {
        if self.width() == width && self.height() == height {
            return self;
        }
        let image = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn to_png(&self) -> DroidClawResult<Vec<u8>> {
        let mut png_bytes = Vec::new();
        self.image.write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        )?;
        Ok(png_bytes)
    }

    /// PNG-encoded `data:` URL, the form vision endpoints accept inline.
    pub fn to_data_url(&self) -> DroidClawResult<String> {
        let b64 = base64::engine::general_purpose::STANDARD.encode(self.to_png()?);
        Ok(format!("data:image/png;base64,{b64}"))
    }
}
