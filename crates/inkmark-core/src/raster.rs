//! Raster payload handling for image annotations
//!
//! Data URL decoding, PNG sample extraction for image XObjects and the
//! JPEG re-encode used when a payload cannot be embedded as PNG.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::{ColorType, DynamicImage, ImageDecoder, RgbImage};

use crate::error::EditorError;

/// Decoded `data:` URL
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Decode a base64 `data:<mime>;base64,<payload>` URL
pub fn decode_data_url(data_url: &str) -> Result<DataUrl, EditorError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| EditorError::ImageDecode("Missing 'data:' prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| EditorError::ImageDecode("Malformed data URL".to_string()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| EditorError::ImageDecode("Data URL is not base64 encoded".to_string()))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| EditorError::ImageDecode(e.to_string()))?;

    if bytes.is_empty() {
        return Err(EditorError::ImageDecode("Data URL payload is empty".to_string()));
    }

    Ok(DataUrl {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// Encode bytes as a base64 data URL
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// PDF color space of decoded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
}

impl ColorSpace {
    pub fn pdf_name(&self) -> &'static [u8] {
        match self {
            ColorSpace::DeviceGray => b"DeviceGray",
            ColorSpace::DeviceRgb => b"DeviceRGB",
        }
    }
}

/// 8-bit samples split into color and optional alpha planes
#[derive(Debug, Clone)]
pub struct DecodedPng {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub color: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

/// Decode a PNG into planes suitable for an image XObject.
/// Fails for anything that is not a PNG.
pub fn decode_png(bytes: &[u8]) -> Result<DecodedPng, EditorError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| EditorError::ImageDecode(format!("PNG: {}", e)))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| EditorError::ImageDecode(format!("PNG: {}", e)))?;
    buf.truncate(frame.buffer_size());

    if frame.bit_depth != png::BitDepth::Eight {
        return Err(EditorError::ImageDecode(format!(
            "PNG: unsupported bit depth {:?}",
            frame.bit_depth
        )));
    }

    let (color_space, channels, has_alpha) = match frame.color_type {
        png::ColorType::Grayscale => (ColorSpace::DeviceGray, 1, false),
        png::ColorType::GrayscaleAlpha => (ColorSpace::DeviceGray, 2, true),
        png::ColorType::Rgb => (ColorSpace::DeviceRgb, 3, false),
        png::ColorType::Rgba => (ColorSpace::DeviceRgb, 4, true),
        png::ColorType::Indexed => {
            return Err(EditorError::ImageDecode(
                "PNG: indexed color was not expanded".to_string(),
            ))
        }
    };

    let (color, alpha) = if has_alpha {
        let color_channels = channels - 1;
        let pixels = buf.len() / channels;
        let mut color = Vec::with_capacity(pixels * color_channels);
        let mut alpha = Vec::with_capacity(pixels);
        for px in buf.chunks_exact(channels) {
            color.extend_from_slice(&px[..color_channels]);
            alpha.push(px[color_channels]);
        }
        (color, Some(alpha))
    } else {
        (buf, None)
    };

    Ok(DecodedPng {
        width: frame.width,
        height: frame.height,
        color_space,
        color,
        alpha,
    })
}

/// Header information of a baseline JPEG
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
}

/// Read JPEG dimensions and color space without decoding the scan data
pub fn inspect_jpeg(bytes: &[u8]) -> Result<JpegInfo, EditorError> {
    let decoder = JpegDecoder::new(Cursor::new(bytes))
        .map_err(|e| EditorError::ImageDecode(format!("JPEG: {}", e)))?;
    let (width, height) = decoder.dimensions();
    let color_space = match decoder.color_type() {
        ColorType::L8 | ColorType::L16 => ColorSpace::DeviceGray,
        _ => ColorSpace::DeviceRgb,
    };
    Ok(JpegInfo {
        width,
        height,
        color_space,
    })
}

/// Re-encode any supported raster as an opaque JPEG.
///
/// Transparent pixels are composited onto white since JPEG has no alpha.
pub fn reencode_as_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, EditorError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| EditorError::ImageDecode(e.to_string()))?;
    let rgba = decoded.to_rgba8();

    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(flattened.pixels_mut()) {
        let [r, g, b, a] = src.0;
        dst.0 = [
            over_white(r, a),
            over_white(g, a),
            over_white(b, a),
        ];
    }

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(flattened)
        .write_with_encoder(encoder)
        .map_err(|e| EditorError::ImageDecode(format!("JPEG encode: {}", e)))?;
    Ok(out)
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let c = channel as u32;
    let a = alpha as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// True when at least one pixel of an RGBA buffer is not fully transparent
pub fn has_ink(rgba: &[u8]) -> bool {
    rgba.chunks_exact(4).any(|px| px[3] > 0)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let url = encode_data_url("image/png", b"abc");
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.bytes, b"abc");
    }

    #[test]
    fn test_decode_data_url_rejects_malformed() {
        assert!(decode_data_url("image/png;base64,abc").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
        assert!(decode_data_url("data:image/png;base64,").is_err());
    }

    #[test]
    fn test_decode_png_splits_alpha() {
        let png = rgba_png(4, 2);
        let decoded = decode_png(&png).unwrap();
        assert_eq!(decoded.width, 4);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.color_space, ColorSpace::DeviceRgb);
        assert_eq!(decoded.color.len(), 4 * 2 * 3);
        let alpha = decoded.alpha.unwrap();
        assert_eq!(alpha, vec![0, 0, 255, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn test_decode_png_rejects_other_formats() {
        let gif = gif(2, 2);
        assert!(decode_png(&gif).is_err());
    }

    #[test]
    fn test_reencode_flattens_onto_white() {
        let png = rgba_png(8, 8);
        let jpeg = reencode_as_jpeg(&png, 95).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));

        let info = inspect_jpeg(&jpeg).unwrap();
        assert_eq!((info.width, info.height), (8, 8));
        assert_eq!(info.color_space, ColorSpace::DeviceRgb);

        let back = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        // Transparent corner becomes (near) white, not black
        let corner = back.get_pixel(0, 0).0;
        assert!(corner.iter().all(|&c| c > 230), "corner was {:?}", corner);
    }

    #[test]
    fn test_over_white() {
        assert_eq!(over_white(0, 0), 255);
        assert_eq!(over_white(0, 255), 0);
        assert_eq!(over_white(100, 255), 100);
    }

    #[test]
    fn test_has_ink() {
        assert!(!has_ink(&[0; 16]));
        assert!(has_ink(&[0, 0, 0, 0, 10, 10, 10, 1]));
        assert!(!has_ink(&[]));
    }
}
