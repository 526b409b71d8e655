//! Render dataset examples back into viewable images.

use anyhow::{bail, Result};
use busi_dataset::{ImageTensor, LabeledExample};
use image::{Rgb, RgbImage};

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Undo `[-1, 1]` normalization of a `[3, H, W]` tensor.
pub fn tensor_to_rgb(t: &ImageTensor) -> Result<RgbImage> {
    if t.channels() != 3 {
        bail!("expected a 3-channel image tensor, got shape {:?}", t.shape);
    }
    let (h, w) = (t.height(), t.width());
    Ok(RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([0, 1, 2].map(|c| to_u8((t.at(c, y, x) + 1.0) / 2.0)))
    }))
}

/// Render a `[1, H, W]` mask in `[0, 1]` as grayscale (replicated to RGB).
pub fn tensor_to_gray(t: &ImageTensor) -> Result<RgbImage> {
    if t.channels() != 1 {
        bail!("expected a 1-channel mask tensor, got shape {:?}", t.shape);
    }
    let (h, w) = (t.height(), t.width());
    Ok(RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let v = to_u8(t.at(0, y as usize, x as usize));
        Rgb([v, v, v])
    }))
}

/// Image on the left, mask (if any) on the right.
pub fn render_example(example: &LabeledExample) -> Result<RgbImage> {
    let image = tensor_to_rgb(&example.image)?;
    let Some(mask) = example.mask.as_ref() else {
        return Ok(image);
    };
    let mask = tensor_to_gray(mask)?;
    let (w, h) = image.dimensions();
    let mut canvas = RgbImage::new(w + mask.width(), h.max(mask.height()));
    image::imageops::replace(&mut canvas, &image, 0, 0);
    image::imageops::replace(&mut canvas, &mask, i64::from(w), 0);
    Ok(canvas)
}
