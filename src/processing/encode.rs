use std::io::Cursor;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{RgbImage, RgbaImage};

/// Composites `img` over an opaque `background`, dropping the alpha channel.
pub fn flatten(img: &RgbaImage, background: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let a = u16::from(a);
        let mix =
            |fg: u8, bg: u8| ((u16::from(fg) * a + u16::from(bg) * (255 - a) + 127) / 255) as u8;
        image::Rgb([
            mix(r, background[0]),
            mix(g, background[1]),
            mix(b, background[2]),
        ])
    })
}

/// Final encoding handed to the display layer.
pub fn encode_jpeg(img: &RgbaImage, background: [u8; 3], quality: u8) -> Result<Vec<u8>> {
    let rgb = flatten(img, background);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut out), quality)
        .encode_image(&rgb)
        .context("failed to encode JPEG")?;
    Ok(out)
}
