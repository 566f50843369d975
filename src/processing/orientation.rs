//! Decoding plus EXIF orientation correction.
//!
//! Every downloaded asset passes through [`normalize`] before any portrait or
//! landscape decision is made, so the composer only ever sees pixels in their
//! intended viewing orientation.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{RgbaImage, imageops};
use tracing::debug;

/// Decodes `bytes` to RGBA8 and applies the EXIF orientation if one is present.
///
/// Missing or unreadable metadata leaves the pixels as decoded; only a failed
/// decode is an error.
pub fn normalize(bytes: &[u8]) -> Result<RgbaImage> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?
        .decode()
        .context("failed to decode image")?;
    let img = img.to_rgba8();

    match read_orientation(bytes) {
        Some(code) => {
            debug!(
                orientation = code,
                label = orientation_label(code),
                "applying exif orientation"
            );
            Ok(apply_orientation(img, code))
        }
        None => {
            debug!("exif orientation not available; keeping decoded orientation");
            Ok(img)
        }
    }
}

/// Reads EXIF tag 274 from the primary IFD.
pub fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).map(|v| v as u16)
}

/// Maps an EXIF orientation code to the transform that undoes it.
/// Unknown codes are a no-op.
pub fn apply_orientation(img: RgbaImage, code: u16) -> RgbaImage {
    match code {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        // mirror + rotate 180
        4 => imageops::flip_vertical(&img),
        // mirror + rotate 270 (counter-clockwise)
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        // mirror + rotate 90 (counter-clockwise)
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

fn orientation_label(v: u16) -> &'static str {
    match v {
        1 => "normal",
        2 => "mirrored horizontal",
        3 => "rotated 180",
        4 => "mirrored vertical",
        5 => "mirrored horizontal, rotated 270 cw",
        6 => "rotated 90 cw",
        7 => "mirrored horizontal, rotated 90 cw",
        8 => "rotated 270 cw",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use image::{ImageFormat, Rgba};

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    /// A 3x2 image whose pixels are all distinct, so every transform is observable.
    fn marked() -> RgbaImage {
        RgbaImage::from_fn(3, 2, |x, y| Rgba([(x * 80) as u8, (y * 200) as u8, 7, 255]))
    }

    /// Splices an APP1 EXIF segment carrying only an orientation tag after SOI.
    fn jpeg_with_orientation(width: u32, height: u32, code: u16) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 60, 30]));
        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg).unwrap();

        let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
        app1.extend_from_slice(b"Exif\0\0MM\0\x2A\0\0\0\x08\0\x01\x01\x12\0\x03\0\0\0\x01");
        app1.extend_from_slice(&code.to_be_bytes());
        app1.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        assert_eq!(read_orientation(&bytes), Some(6));
        let img = normalize(&bytes).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn every_code_yields_expected_dimensions() {
        for code in 1..=8u16 {
            let bytes = jpeg_with_orientation(4, 2, code);
            assert_eq!(read_orientation(&bytes), Some(code));
            let img = normalize(&bytes).unwrap();
            let expected = if code >= 5 { (2, 4) } else { (4, 2) };
            assert_eq!(img.dimensions(), expected, "orientation {code}");
        }
    }

    #[test]
    fn identity_and_unknown_codes_are_no_ops() {
        let src = marked();
        assert_eq!(apply_orientation(src.clone(), 1), src);
        assert_eq!(apply_orientation(src.clone(), 0), src);
        assert_eq!(apply_orientation(src.clone(), 9), src);
    }

    #[test]
    fn transforms_move_pixels_where_exif_expects() {
        let src = marked();
        let top_left = *src.get_pixel(0, 0);
        let top_right = *src.get_pixel(2, 0);
        let bottom_left = *src.get_pixel(0, 1);

        // 2: mirror; top-right lands top-left
        assert_eq!(*apply_orientation(src.clone(), 2).get_pixel(0, 0), top_right);
        // 3: rotate 180; top-left lands bottom-right
        assert_eq!(*apply_orientation(src.clone(), 3).get_pixel(2, 1), top_left);
        // 4: mirror + 180; bottom-left lands top-left
        assert_eq!(*apply_orientation(src.clone(), 4).get_pixel(0, 0), bottom_left);
        // 5: transpose; top-right lands bottom-left
        assert_eq!(*apply_orientation(src.clone(), 5).get_pixel(0, 2), top_right);
        // 6: rotate 90 cw; bottom-left lands top-left
        assert_eq!(*apply_orientation(src.clone(), 6).get_pixel(0, 0), bottom_left);
        // 7: transverse; top-left lands bottom-right
        assert_eq!(*apply_orientation(src.clone(), 7).get_pixel(1, 2), top_left);
        // 8: rotate 270 cw; top-right lands top-left
        assert_eq!(*apply_orientation(src.clone(), 8).get_pixel(0, 0), top_right);
    }

    #[test]
    fn missing_metadata_keeps_pixels() {
        let src = marked();
        let mut png = Vec::new();
        src.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        assert_eq!(read_orientation(&png), None);
        assert_eq!(normalize(&png).unwrap(), src);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(normalize(b"definitely not an image").is_err());
    }
}
