//! Frame encoding for image prompts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};

use crate::error::{MlError, MlResult};

pub const JPEG_QUALITY: u8 = 85;

/// Base64 of the frame as a JPEG.
pub fn encode_frame_jpeg(frame: &RgbImage) -> MlResult<String> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode(frame.as_raw(), frame.width(), frame.height(), ColorType::Rgb8)
        .map_err(|e| MlError::Encode(e.to_string()))?;
    Ok(STANDARD.encode(buf))
}

pub(crate) fn jpeg_data_url(jpeg_base64: &str) -> String {
    format!("data:image/jpeg;base64,{jpeg_base64}")
}
