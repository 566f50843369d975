//! Fits one or two oriented images onto the fixed display canvas.

use anyhow::Result;
use image::{Rgba, RgbaImage, imageops};
use tracing::debug;

use crate::config::{Canvas, CropMode};
use crate::processing::layout::{center_offset, contain_size, cover_crop};
use crate::processing::pairing::PortraitHold;
use crate::processing::resize::resize_rgba;

/// Ties go to landscape.
pub fn is_portrait(image: &RgbaImage) -> bool {
    image.height() > image.width()
}

/// Result of one composition step.
#[derive(Debug)]
pub struct Composition {
    /// `None` means nothing should change on screen this cycle.
    pub image: Option<RgbaImage>,
    /// Whether two portraits were placed side by side.
    pub combined: bool,
}

impl Composition {
    fn single(image: RgbaImage) -> Self {
        Self {
            image: Some(image),
            combined: false,
        }
    }

    fn nothing() -> Self {
        Self {
            image: None,
            combined: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Composer {
    canvas: Canvas,
    background: Rgba<u8>,
}

impl Composer {
    pub fn new(canvas: Canvas, background: [u8; 3]) -> Self {
        let [r, g, b] = background;
        Self {
            canvas,
            background: Rgba([r, g, b, 255]),
        }
    }

    /// Produces the next canvas image from a batch of already-oriented images.
    ///
    /// In [`CropMode::Combine`] a lone portrait is parked in `hold` until a
    /// later batch supplies a partner; the other modes never touch `hold`.
    pub fn compose(
        &self,
        batch: Vec<RgbaImage>,
        mode: CropMode,
        hold: &mut PortraitHold,
    ) -> Result<Composition> {
        if batch.is_empty() {
            return Ok(Composition::nothing());
        }
        for (idx, img) in batch.iter().enumerate() {
            debug!(
                idx,
                width = img.width(),
                height = img.height(),
                portrait = is_portrait(img),
                %mode,
                "composing"
            );
        }

        match mode {
            CropMode::CropSingle => {
                let first = first(batch);
                Ok(Composition::single(self.crop_to_fill(&first)?))
            }
            CropMode::None => {
                let first = first(batch);
                Ok(Composition::single(self.letterbox(&first)?))
            }
            CropMode::Combine => self.combine_or_hold(batch, hold),
        }
    }

    fn combine_or_hold(
        &self,
        batch: Vec<RgbaImage>,
        hold: &mut PortraitHold,
    ) -> Result<Composition> {
        let (mut portraits, landscapes): (Vec<_>, Vec<_>) =
            batch.into_iter().partition(is_portrait);
        if let Some(held) = hold.take() {
            portraits.insert(0, held);
        }

        match portraits.len() {
            0 => {
                let first = first(landscapes);
                Ok(Composition::single(self.letterbox(&first)?))
            }
            1 => {
                hold.hold(portraits.remove(0));
                match landscapes.first() {
                    Some(landscape) => Ok(Composition::single(self.letterbox(landscape)?)),
                    None => Ok(Composition::nothing()),
                }
            }
            _ => {
                let combined = self.side_by_side(&portraits[0], &portraits[1])?;
                Ok(Composition {
                    image: Some(combined),
                    combined: true,
                })
            }
        }
    }

    /// Scales `img` to cover the canvas and clips the overflow evenly.
    pub fn crop_to_fill(&self, img: &RgbaImage) -> Result<RgbaImage> {
        let Canvas { width, height } = self.canvas;
        let region = cover_crop(width, height, img.width(), img.height());
        let cropped =
            imageops::crop_imm(img, region.x, region.y, region.width, region.height).to_image();
        resize_rgba(&cropped, width, height)
    }

    /// Scales `img` to the largest size that fits the canvas, keeping its aspect ratio.
    pub fn letterbox(&self, img: &RgbaImage) -> Result<RgbaImage> {
        fit_within(img, self.canvas.width, self.canvas.height)
    }

    /// Two portraits on one canvas, each fitted into half the width and
    /// centered vertically.
    pub fn side_by_side(&self, left: &RgbaImage, right: &RgbaImage) -> Result<RgbaImage> {
        let Canvas { width, height } = self.canvas;
        let half = width / 2;
        let mut canvas = RgbaImage::from_pixel(width, height, self.background);
        for (slot, img) in [left, right].into_iter().enumerate() {
            let fitted = fit_within(img, half, height)?;
            let (_, y) = center_offset(fitted.width(), fitted.height(), half, height);
            let x = slot as u32 * half;
            imageops::replace(&mut canvas, &fitted, i64::from(x), i64::from(y));
        }
        Ok(canvas)
    }
}

fn first(mut images: Vec<RgbaImage>) -> RgbaImage {
    images.swap_remove(0)
}

fn fit_within(img: &RgbaImage, max_w: u32, max_h: u32) -> Result<RgbaImage> {
    let (w, h) = contain_size(max_w, max_h, img.width(), img.height());
    resize_rgba(img, w, h)
}
