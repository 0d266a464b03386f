//! Wire payload codec: Base64 transport, zlib inflate, pixel conversion.
//!
//! Everything here is a pure function; all state lives in the store. The
//! Base64 decoder is deliberately lenient: payloads arrive through a PTY
//! that may inject whitespace or mangle framing, and a salvageable payload
//! beats a dropped image.

use std::io::Read;

use base64::alphabet;
use base64::engine::{self, Engine};
use flate2::read::ZlibDecoder;

use crate::command::{Compression, PixelFormat};
use crate::error::GraphicsError;

/// Accepts unpadded input and non-canonical trailing bits; foreign
/// characters are filtered out before the engine ever sees them.
const LENIENT: engine::GeneralPurpose = engine::GeneralPurpose::new(
    &alphabet::STANDARD,
    engine::GeneralPurposeConfig::new()
        .with_decode_padding_mode(engine::DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decoded RGBA pixels. This is the "bitmap handle" the renderer draws
/// from; the host uploads it to whatever texture representation it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Resident size in bytes, charged against the store's budget.
    pub fn byte_size(&self) -> usize {
        self.rgba.len()
    }

    /// Fetch one pixel; out-of-bounds reads return transparent black.
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        if x >= self.width || y >= self.height {
            return (0, 0, 0, 0);
        }
        let idx = ((y * self.width + x) * 4) as usize;
        match self.rgba.get(idx..idx + 4) {
            Some(px) => (px[0], px[1], px[2], px[3]),
            None => (0, 0, 0, 0),
        }
    }
}

/// Decode Base64 text, skipping characters outside the alphabet.
///
/// Whitespace and other junk are dropped, the URL-safe variants `-`/`_`
/// are normalized to `+`/`/`, and padding is optional. Output length is
/// derived from the count of valid characters, so skipped bytes never
/// produce padding artifacts. A dangling single character (impossible in
/// real Base64) is discarded.
pub fn decode_base64(text: &str) -> Vec<u8> {
    let mut filtered: Vec<u8> = text
        .bytes()
        .filter_map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' => Some(b),
            b'-' => Some(b'+'),
            b'_' => Some(b'/'),
            _ => None,
        })
        .collect();
    if filtered.len() % 4 == 1 {
        filtered.pop();
    }
    match LENIENT.decode(&filtered) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("base64 decode failed after filtering: {err}");
            Vec::new()
        }
    }
}

/// Encode bytes as standard padded Base64 (used when emitting protocol
/// frames, e.g. from tests and tooling).
pub fn encode_base64(bytes: &[u8]) -> String {
    engine::general_purpose::STANDARD.encode(bytes)
}

/// Inflate a zlib-compressed payload.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, GraphicsError> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Expand 3-byte RGB pixels to 4-byte RGBA, forcing full opacity.
pub fn rgb_to_rgba(bytes: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(bytes.len() / 3 * 4);
    for px in bytes.chunks_exact(3) {
        rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    rgba
}

/// Decode a transmitted payload into a [`Bitmap`].
///
/// Format 100 is a PNG container and carries its own dimensions; formats
/// 24/32 are raw pixels and require explicit `s=`/`v=` values.
pub fn decode_image(
    data: &[u8],
    format: PixelFormat,
    width: Option<u32>,
    height: Option<u32>,
    compression: Compression,
) -> Result<Bitmap, GraphicsError> {
    let data = match compression {
        Compression::Zlib => decompress(data)?,
        Compression::None => data.to_vec(),
    };

    match format {
        PixelFormat::Png => {
            let decoded = image::load_from_memory_with_format(&data, image::ImageFormat::Png)?;
            let rgba = decoded.to_rgba8();
            let (width, height) = rgba.dimensions();
            Ok(Bitmap::new(width, height, rgba.into_raw()))
        }
        PixelFormat::Rgba => {
            let (width, height) = required_dimensions(width, height)?;
            let need = width as usize * height as usize * 4;
            if data.len() < need {
                return Err(GraphicsError::TruncatedPixels {
                    actual: data.len(),
                    width,
                    height,
                });
            }
            let mut rgba = data;
            rgba.truncate(need);
            Ok(Bitmap::new(width, height, rgba))
        }
        PixelFormat::Rgb => {
            let (width, height) = required_dimensions(width, height)?;
            let need = width as usize * height as usize * 3;
            if data.len() < need {
                return Err(GraphicsError::TruncatedPixels {
                    actual: data.len(),
                    width,
                    height,
                });
            }
            Ok(Bitmap::new(width, height, rgb_to_rgba(&data[..need])))
        }
        PixelFormat::Unknown(code) => Err(GraphicsError::UnsupportedFormat(code)),
    }
}

fn required_dimensions(
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(u32, u32), GraphicsError> {
    match (
        width.filter(|&w| w > 0),
        height.filter(|&h| h > 0),
    ) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(GraphicsError::MissingDimensions),
    }
}

/// Decode each Base64 chunk independently and concatenate the raw bytes.
///
/// The protocol guarantees chunk boundaries are Base64-aligned (whole
/// 4-character groups), never mid-byte, so per-chunk decoding is lossless.
pub fn combine_chunks(chunks: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(&decode_base64(chunk));
    }
    out
}

/// Fast upper-bound estimate of decoded size, for cache admission only.
///
/// Compressed containers are assumed to inflate roughly 4x; raw formats
/// with known dimensions are exact. Never authoritative - the store
/// reconciles against real byte sizes after decode.
pub fn estimate_size(
    payload_len: usize,
    format: PixelFormat,
    width: Option<u32>,
    height: Option<u32>,
) -> usize {
    match format {
        PixelFormat::Png => payload_len.saturating_mul(4),
        PixelFormat::Rgb | PixelFormat::Rgba => match (width, height) {
            (Some(w), Some(h)) => (w as usize).saturating_mul(h as usize).saturating_mul(4),
            _ => payload_len,
        },
        PixelFormat::Unknown(_) => payload_len,
    }
}
