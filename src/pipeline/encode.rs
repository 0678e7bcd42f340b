//! Page image encoding: `GrayImage` → PNG bytes for the tesseract engine, and
//! → base64 PNG wrapped in `ImageData` for the vision engine.
//!
//! PNG keeps the binarised page lossless; JPEG artefacts around glyph edges
//! measurably hurt transcription of small print.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use tracing::debug;

/// Encode a preprocessed page as PNG.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a preprocessed page as a base64 PNG ready for a vision request.
///
/// `detail: "high"` keeps fine print readable on providers that tile images.
pub fn encode_for_vision(img: &GrayImage) -> Result<ImageData, image::ImageError> {
    let b64 = STANDARD.encode(encode_png(img)?);
    debug!(
        "Encoded {}x{} page → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn encode_small_page() {
        let img = GrayImage::from_pixel(12, 8, Luma([255]));
        let data = encode_for_vision(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
