use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;

/// High-quality RGBA resample to exactly `target_w` x `target_h`.
pub fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        anyhow::bail!("resize dimensions must be positive");
    }
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("resize failed")?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizes_to_requested_dimensions() {
        let src = RgbaImage::from_pixel(40, 20, image::Rgba([10, 20, 30, 255]));
        let out = resize_rgba(&src, 13, 7).unwrap();
        assert_eq!(out.dimensions(), (13, 7));
        let px = out.get_pixel(6, 3).0;
        for (got, want) in px.iter().zip([10u8, 20, 30, 255]) {
            assert!(got.abs_diff(want) <= 1, "{px:?}");
        }
    }

    #[test]
    fn rejects_empty_targets() {
        let src = RgbaImage::new(4, 4);
        assert!(resize_rgba(&src, 0, 4).is_err());
    }
}
