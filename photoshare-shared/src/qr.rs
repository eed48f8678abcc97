/// QR code rendering
///
/// Pictures can get a QR code pointing at their current URL. The code is
/// rendered to a PNG here and uploaded next to the picture.
use std::io::Cursor;

use image::{ImageFormat, Luma};
use qrcode::QrCode;

/// Pixels per QR module
pub const MODULE_SIZE: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("Cannot encode data as QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("Cannot encode QR code as PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// Renders `data` as a PNG QR code with a quiet zone
pub fn render_png(data: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::new(data.as_bytes())?;

    let img = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_SIZE, MODULE_SIZE)
        .quiet_zone(true)
        .build();

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    #[test]
    fn test_render_png() {
        let png = render_png("https://images.test/photo_share/abc").unwrap();
        assert!(png.starts_with(PNG_MAGIC));

        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!(decoded.width(), decoded.height());
        assert_eq!(decoded.width() % MODULE_SIZE, 0);
    }

    #[test]
    fn test_data_too_long() {
        let data = "x".repeat(8000);
        assert!(matches!(render_png(&data), Err(QrError::Encode(_))));
    }
}
