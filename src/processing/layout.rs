//! Pure geometry for fitting a source raster onto a canvas.

/// A sub-rectangle of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest size with the source aspect ratio that fits inside the canvas.
///
/// One side always matches the canvas exactly; the other is rounded and never
/// exceeds its bound. Sources smaller than the canvas are scaled up.
pub fn contain_size(canvas_w: u32, canvas_h: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    let cw = canvas_w.max(1);
    let ch = canvas_h.max(1);
    let iw = src_w.max(1) as f64;
    let ih = src_h.max(1) as f64;
    let src_ratio = iw / ih;
    let dst_ratio = cw as f64 / ch as f64;
    if src_ratio > dst_ratio {
        let h = (ih / iw * cw as f64).round().clamp(1.0, ch as f64);
        (cw, h as u32)
    } else if src_ratio < dst_ratio {
        let w = (iw / ih * ch as f64).round().clamp(1.0, cw as f64);
        (w as u32, ch)
    } else {
        (cw, ch)
    }
}

/// Centered region of the source with the canvas aspect ratio; scaling it to
/// the canvas fills every pixel while clipping the overflow evenly.
pub fn cover_crop(canvas_w: u32, canvas_h: u32, src_w: u32, src_h: u32) -> Rect {
    let cw = canvas_w.max(1) as f64;
    let ch = canvas_h.max(1) as f64;
    let iw = src_w.max(1);
    let ih = src_h.max(1);
    let dst_ratio = cw / ch;
    let src_ratio = iw as f64 / ih as f64;
    if src_ratio > dst_ratio {
        let width = ((ih as f64 * dst_ratio).round() as u32).clamp(1, iw);
        Rect {
            x: (iw - width) / 2,
            y: 0,
            width,
            height: ih,
        }
    } else {
        let height = ((iw as f64 / dst_ratio).round() as u32).clamp(1, ih);
        Rect {
            x: 0,
            y: (ih - height) / 2,
            width: iw,
            height,
        }
    }
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}
