//! Off-screen raster buffer and still-image encoding for photo capture.

use std::future::Future;

use chatter_core::types::MediaBlob;

use crate::device::{Resolution, VideoFrame};
use crate::error::CaptureError;

/// MIME type produced by [`BmpEncoder`].
pub const BMP_MIME_TYPE: &str = "image/bmp";

/// An RGB canvas sized to a stream's native resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    /// Allocate a black canvas.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            width: resolution.width,
            height: resolution.height,
            pixels: vec![0u8; resolution.pixel_count() * 3],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGB rows, top to bottom.
    pub fn as_rgb(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        Some([
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ])
    }

    /// Draw `frame` at the origin. Parts outside the canvas are clipped and
    /// uncovered canvas stays as it was.
    pub fn draw(&mut self, frame: &VideoFrame) {
        let cols = self.width.min(frame.width) as usize;
        let rows = self.height.min(frame.height) as usize;
        let row_bytes = cols * 3;

        for y in 0..rows {
            let src_start = y * frame.width as usize * 3;
            let Some(src) = frame.pixels.get(src_start..src_start + row_bytes) else {
                break;
            };
            let dst_start = y * self.width as usize * 3;
            self.pixels[dst_start..dst_start + row_bytes].copy_from_slice(src);
        }
    }
}

/// Encodes a raster into a still image.
pub trait FrameEncoder: Send + Sync {
    /// MIME type of the blobs this encoder produces.
    fn mime_type(&self) -> &str;

    fn encode(
        &self,
        raster: &RasterBuffer,
    ) -> impl Future<Output = Result<MediaBlob, CaptureError>> + Send;
}

/// Uncompressed 24-bit BMP encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct BmpEncoder;

impl FrameEncoder for BmpEncoder {
    fn mime_type(&self) -> &str {
        BMP_MIME_TYPE
    }

    async fn encode(&self, raster: &RasterBuffer) -> Result<MediaBlob, CaptureError> {
        let data = encode_bmp(raster)?;
        Ok(MediaBlob::new(BMP_MIME_TYPE, data))
    }
}

/// Serialize a raster as a bottom-up 24-bit BMP file.
pub fn encode_bmp(raster: &RasterBuffer) -> Result<Vec<u8>, CaptureError> {
    if raster.width == 0 || raster.height == 0 {
        return Err(CaptureError::Encode("raster has no pixels".into()));
    }

    let width = i32::try_from(raster.width)
        .map_err(|_| CaptureError::Encode(format!("width {} too large", raster.width)))?;
    let height = i32::try_from(raster.height)
        .map_err(|_| CaptureError::Encode(format!("height {} too large", raster.height)))?;

    let stride = (raster.width as usize * 3 + 3) & !3;
    let image_size = stride * raster.height as usize;
    let file_size = u32::try_from(54 + image_size)
        .map_err(|_| CaptureError::Encode("image exceeds BMP size limit".into()))?;

    let mut out = Vec::with_capacity(54 + image_size);

    // BMP file header (14 bytes).
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_size.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved
    out.extend_from_slice(&54u32.to_le_bytes()); // pixel data offset

    // DIB header (40 bytes), positive height = bottom-up rows.
    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&24u16.to_le_bytes()); // bits per pixel
    out.extend_from_slice(&0u32.to_le_bytes()); // compression
    out.extend_from_slice(&(image_size as u32).to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes()); // x ppm
    out.extend_from_slice(&0i32.to_le_bytes()); // y ppm
    out.extend_from_slice(&0u32.to_le_bytes()); // colors used
    out.extend_from_slice(&0u32.to_le_bytes()); // important colors

    let row_bytes = raster.width as usize * 3;
    let padding = stride - row_bytes;
    for y in (0..raster.height as usize).rev() {
        let row = &raster.pixels[y * row_bytes..(y + 1) * row_bytes];
        for rgb in row.chunks_exact(3) {
            out.extend_from_slice(&[rgb[2], rgb[1], rgb[0]]);
        }
        out.extend(std::iter::repeat(0u8).take(padding));
    }

    Ok(out)
}
