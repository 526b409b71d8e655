//! Synchronized image/mask augmentation.
//!
//! An [`AugmentationSpec`] is an ordered list of [`TransformStep`]s. A [`SpecPair`]
//! holds one spec for the image and one for its mask; both must contain the same
//! geometric steps in the same order, and only the image spec may carry
//! photometric steps (color jitter, normalization), placed after every
//! geometric step.
//!
//! [`SpecPair::apply`] clones the caller's generator before the image pass and
//! replays the clone for the mask pass, so rotation angles, crop windows and
//! flip decisions come out identical for both targets.

use crate::types::{DatasetError, DatasetResult, ImageTensor, Mode};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Pixel, Rgb, RgbImage};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

/// Per-channel normalization applied to images: maps `[0, 1]` to `[-1, 1]`.
pub const IMAGE_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const IMAGE_STD: [f32; 3] = [0.5, 0.5, 0.5];

const RESIZED_CROP_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformStep {
    /// Rotate by an angle drawn uniformly from `[-degrees, degrees]`; corners fill with 0.
    RandomRotation { degrees: f32 },
    /// Crop a random window (area fraction in `scale`, aspect ratio in `ratio`)
    /// and resize it to `size x size`.
    RandomResizedCrop {
        size: u32,
        scale: (f32, f32),
        ratio: (f32, f32),
    },
    RandomHorizontalFlip { p: f32 },
    RandomVerticalFlip { p: f32 },
    /// Resize the shorter edge to `size`, keeping the aspect ratio.
    Resize { size: u32 },
    CenterCrop { size: u32 },
    ColorJitter {
        brightness: f32,
        contrast: f32,
        saturation: f32,
        hue: f32,
    },
    /// `u8 / 255` into a CHW `f32` tensor.
    ToTensor,
    Normalize { mean: [f32; 3], std: [f32; 3] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Geometric,
    Photometric,
    Conversion,
}

impl TransformStep {
    pub fn kind(&self) -> StepKind {
        match self {
            TransformStep::RandomRotation { .. }
            | TransformStep::RandomResizedCrop { .. }
            | TransformStep::RandomHorizontalFlip { .. }
            | TransformStep::RandomVerticalFlip { .. }
            | TransformStep::Resize { .. }
            | TransformStep::CenterCrop { .. } => StepKind::Geometric,
            TransformStep::ColorJitter { .. } | TransformStep::Normalize { .. } => {
                StepKind::Photometric
            }
            TransformStep::ToTensor => StepKind::Conversion,
        }
    }

    fn needs_tensor(&self) -> bool {
        matches!(self, TransformStep::Normalize { .. })
    }

    /// Draw this step's parameters for an input of `(width, height)`.
    fn geometric_op(&self, (w, h): (u32, u32), rng: &mut dyn RngCore) -> GeomOp {
        match *self {
            TransformStep::RandomRotation { degrees } => {
                let d = degrees.abs();
                GeomOp::Rotate(rng.random_range(-d..=d))
            }
            TransformStep::RandomResizedCrop { size, scale, ratio } => {
                let (x, y, width, height) = resized_crop_window(w, h, scale, ratio, rng);
                GeomOp::CropResize {
                    x,
                    y,
                    width,
                    height,
                    size,
                }
            }
            TransformStep::RandomHorizontalFlip { p } => {
                if rng.random_range(0.0..1.0) < p {
                    GeomOp::FlipHorizontal
                } else {
                    GeomOp::Identity
                }
            }
            TransformStep::RandomVerticalFlip { p } => {
                if rng.random_range(0.0..1.0) < p {
                    GeomOp::FlipVertical
                } else {
                    GeomOp::Identity
                }
            }
            TransformStep::Resize { size } => {
                let (width, height) = shorter_edge_size(w, h, size);
                GeomOp::Resize { width, height }
            }
            TransformStep::CenterCrop { size } => GeomOp::CenterCrop { size },
            TransformStep::ColorJitter { .. }
            | TransformStep::ToTensor
            | TransformStep::Normalize { .. } => GeomOp::Identity,
        }
    }
}

impl std::fmt::Display for TransformStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformStep::RandomRotation { degrees } => write!(f, "rotate(±{degrees})"),
            TransformStep::RandomResizedCrop { size, scale, ratio } => write!(
                f,
                "resized_crop({size}, scale=[{:.2},{:.2}], ratio=[{:.2},{:.2}])",
                scale.0, scale.1, ratio.0, ratio.1
            ),
            TransformStep::RandomHorizontalFlip { p } => write!(f, "hflip(p={p:.2})"),
            TransformStep::RandomVerticalFlip { p } => write!(f, "vflip(p={p:.2})"),
            TransformStep::Resize { size } => write!(f, "resize({size})"),
            TransformStep::CenterCrop { size } => write!(f, "center_crop({size})"),
            TransformStep::ColorJitter {
                brightness,
                contrast,
                saturation,
                hue,
            } => write!(
                f,
                "color_jitter(b={brightness:.2}, c={contrast:.2}, s={saturation:.2}, h={hue:.2})"
            ),
            TransformStep::ToTensor => write!(f, "to_tensor"),
            TransformStep::Normalize { mean, std } => {
                write!(f, "normalize(mean={mean:?}, std={std:?})")
            }
        }
    }
}

/// Geometric operation with its random parameters already drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
enum GeomOp {
    Identity,
    Rotate(f32),
    FlipHorizontal,
    FlipVertical,
    CropResize {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        size: u32,
    },
    Resize {
        width: u32,
        height: u32,
    },
    CenterCrop {
        size: u32,
    },
}

impl GeomOp {
    fn apply<P>(self, img: ImageBuffer<P, Vec<u8>>, filter: FilterType) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8> + 'static,
    {
        match self {
            GeomOp::Identity => img,
            GeomOp::Rotate(angle) => rotate_nearest(&img, angle),
            GeomOp::FlipHorizontal => {
                let mut img = img;
                imageops::flip_horizontal_in_place(&mut img);
                img
            }
            GeomOp::FlipVertical => {
                let mut img = img;
                imageops::flip_vertical_in_place(&mut img);
                img
            }
            GeomOp::CropResize {
                x,
                y,
                width,
                height,
                size,
            } => {
                let cropped = imageops::crop_imm(&img, x, y, width, height).to_image();
                imageops::resize(&cropped, size, size, filter)
            }
            GeomOp::Resize { width, height } => {
                if img.dimensions() == (width, height) {
                    img
                } else {
                    imageops::resize(&img, width, height, filter)
                }
            }
            GeomOp::CenterCrop { size } => center_crop(&img, size),
        }
    }
}

/// Which half of a pair a spec runs on; picks the resampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Image,
    Mask,
}

impl Target {
    fn filter(self) -> FilterType {
        match self {
            Target::Image => FilterType::Triangle,
            // keeps mask values binary
            Target::Mask => FilterType::Nearest,
        }
    }
}

enum Working {
    Rgb(RgbImage),
    Gray(GrayImage),
    Tensor(ImageTensor),
}

impl Working {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            Working::Rgb(img) => img.dimensions(),
            Working::Gray(img) => img.dimensions(),
            Working::Tensor(t) => (t.width() as u32, t.height() as u32),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentationSpec {
    steps: Vec<TransformStep>,
}

impl AugmentationSpec {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    pub fn builder() -> AugmentationSpecBuilder {
        AugmentationSpecBuilder::default()
    }

    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    pub fn geometric_steps(&self) -> impl Iterator<Item = &TransformStep> {
        self.steps
            .iter()
            .filter(|s| s.kind() == StepKind::Geometric)
    }

    /// True when no step draws from the generator.
    pub fn is_deterministic(&self) -> bool {
        self.steps.iter().all(|s| {
            matches!(
                s,
                TransformStep::Resize { .. }
                    | TransformStep::CenterCrop { .. }
                    | TransformStep::ToTensor
                    | TransformStep::Normalize { .. }
            )
        })
    }

    pub fn describe(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check pixel/tensor stage ordering: pixel steps before `ToTensor`,
    /// normalization after it, and exactly one conversion.
    fn validate_stages(&self, name: &str) -> DatasetResult<()> {
        let mut converted = false;
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                TransformStep::ToTensor if converted => {
                    return Err(DatasetError::InvalidSpec(format!(
                        "{name} spec converts to tensor twice (step {i})"
                    )));
                }
                TransformStep::ToTensor => converted = true,
                s if s.needs_tensor() && !converted => {
                    return Err(DatasetError::InvalidSpec(format!(
                        "{name} spec step {i} ({s}) must follow to_tensor"
                    )));
                }
                s if !s.needs_tensor() && converted => {
                    return Err(DatasetError::InvalidSpec(format!(
                        "{name} spec step {i} ({s}) operates on pixels but follows to_tensor"
                    )));
                }
                _ => {}
            }
        }
        if !converted {
            return Err(DatasetError::InvalidSpec(format!(
                "{name} spec never converts to tensor"
            )));
        }
        Ok(())
    }

    fn run(
        &self,
        input: Working,
        target: Target,
        rng: &mut dyn RngCore,
    ) -> DatasetResult<ImageTensor> {
        let mut working = input;
        for step in &self.steps {
            working = match (step, working) {
                (TransformStep::ToTensor, Working::Rgb(img)) => Working::Tensor(rgb_to_tensor(&img)),
                (TransformStep::ToTensor, Working::Gray(img)) => {
                    Working::Tensor(gray_to_tensor(&img))
                }
                (TransformStep::Normalize { mean, std }, Working::Tensor(mut t)) => {
                    normalize(&mut t, mean, std)?;
                    Working::Tensor(t)
                }
                (
                    TransformStep::ColorJitter {
                        brightness,
                        contrast,
                        saturation,
                        hue,
                    },
                    Working::Rgb(mut img),
                ) => {
                    color_jitter(&mut img, *brightness, *contrast, *saturation, *hue, rng);
                    Working::Rgb(img)
                }
                (step, Working::Rgb(img)) if step.kind() == StepKind::Geometric => {
                    let op = step.geometric_op(img.dimensions(), rng);
                    Working::Rgb(op.apply(img, target.filter()))
                }
                (step, Working::Gray(img)) if step.kind() == StepKind::Geometric => {
                    let op = step.geometric_op(img.dimensions(), rng);
                    Working::Gray(op.apply(img, target.filter()))
                }
                (step, other) => {
                    let (w, h) = other.dimensions();
                    return Err(DatasetError::InvalidSpec(format!(
                        "step {step} cannot run on a {w}x{h} {} input",
                        match other {
                            Working::Rgb(_) => "rgb",
                            Working::Gray(_) => "single-channel",
                            Working::Tensor(_) => "tensor",
                        }
                    )));
                }
            };
        }
        match working {
            Working::Tensor(t) => Ok(t),
            _ => Err(DatasetError::InvalidSpec(
                "spec finished without converting to tensor".to_string(),
            )),
        }
    }
}

/// Image and mask specs for one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPair {
    image: AugmentationSpec,
    mask: AugmentationSpec,
}

impl SpecPair {
    /// Pair two specs after checking they stay geometrically synchronized.
    pub fn new(image: AugmentationSpec, mask: AugmentationSpec) -> DatasetResult<Self> {
        image.validate_stages("image")?;
        mask.validate_stages("mask")?;

        if let Some(step) = mask
            .steps()
            .iter()
            .find(|s| s.kind() == StepKind::Photometric)
        {
            return Err(DatasetError::InvalidSpec(format!(
                "mask spec must not contain photometric step {step}"
            )));
        }
        let image_geom: Vec<_> = image.geometric_steps().collect();
        let mask_geom: Vec<_> = mask.geometric_steps().collect();
        if image_geom != mask_geom {
            return Err(DatasetError::InvalidSpec(format!(
                "geometric steps differ: image [{}] vs mask [{}]",
                join_steps(&image_geom),
                join_steps(&mask_geom)
            )));
        }
        let first_photometric = image
            .steps()
            .iter()
            .position(|s| s.kind() == StepKind::Photometric);
        let last_geometric = image
            .steps()
            .iter()
            .rposition(|s| s.kind() == StepKind::Geometric);
        if let (Some(p), Some(g)) = (first_photometric, last_geometric) {
            if p < g {
                return Err(DatasetError::InvalidSpec(format!(
                    "image spec photometric step {} precedes geometric step {}",
                    image.steps()[p],
                    image.steps()[g]
                )));
            }
        }
        Ok(Self { image, mask })
    }

    pub fn image(&self) -> &AugmentationSpec {
        &self.image
    }

    pub fn mask(&self) -> &AugmentationSpec {
        &self.mask
    }

    pub fn is_deterministic(&self) -> bool {
        self.image.is_deterministic() && self.mask.is_deterministic()
    }

    /// Transform `image` and, when present, `mask` with identical geometric draws.
    pub fn apply<R>(
        &self,
        image: RgbImage,
        mask: Option<GrayImage>,
        rng: &mut R,
    ) -> DatasetResult<(ImageTensor, Option<ImageTensor>)>
    where
        R: RngCore + Clone,
    {
        let mut mask_rng = rng.clone();
        let image = self.image.run(Working::Rgb(image), Target::Image, rng)?;
        let mask = match mask {
            Some(m) => Some(self.mask.run(Working::Gray(m), Target::Mask, &mut mask_rng)?),
            None => None,
        };
        Ok((image, mask))
    }

    pub fn describe(&self) -> String {
        format!(
            "image: {} | mask: {}",
            self.image.describe(),
            self.mask.describe()
        )
    }
}

fn join_steps(steps: &[&TransformStep]) -> String {
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Training augmentation: random rotation, resized crop and flips on both
/// targets, then color jitter and normalization on the image only.
pub fn train_specs(image_size: u32) -> DatasetResult<SpecPair> {
    let geometric = AugmentationSpec::builder()
        .random_rotation(45.0)
        .random_resized_crop(image_size, (0.5, 1.0), (0.75, 1.33))
        .horizontal_flip(0.5)
        .vertical_flip(0.5);
    let image = geometric
        .clone()
        .color_jitter(0.12, 0.12, 0.12, 0.08)
        .to_tensor()
        .normalize(IMAGE_MEAN, IMAGE_STD)
        .build();
    let mask = geometric.to_tensor().build();
    SpecPair::new(image, mask)
}

/// Evaluation preprocessing: shorter-edge resize and center crop, no randomness.
pub fn test_specs(image_size: u32) -> DatasetResult<SpecPair> {
    let geometric = AugmentationSpec::builder()
        .resize(image_size)
        .center_crop(image_size);
    let image = geometric
        .clone()
        .to_tensor()
        .normalize(IMAGE_MEAN, IMAGE_STD)
        .build();
    let mask = geometric.to_tensor().build();
    SpecPair::new(image, mask)
}

pub fn specs_for(mode: Mode, image_size: u32) -> DatasetResult<SpecPair> {
    match mode {
        Mode::Train => train_specs(image_size),
        Mode::Test => test_specs(image_size),
    }
}

#[derive(Debug, Clone, Default)]
pub struct AugmentationSpecBuilder {
    steps: Vec<TransformStep>,
}

impl AugmentationSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn step(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }
    pub fn random_rotation(self, degrees: f32) -> Self {
        self.step(TransformStep::RandomRotation { degrees })
    }
    pub fn random_resized_crop(self, size: u32, scale: (f32, f32), ratio: (f32, f32)) -> Self {
        self.step(TransformStep::RandomResizedCrop { size, scale, ratio })
    }
    pub fn horizontal_flip(self, p: f32) -> Self {
        self.step(TransformStep::RandomHorizontalFlip { p })
    }
    pub fn vertical_flip(self, p: f32) -> Self {
        self.step(TransformStep::RandomVerticalFlip { p })
    }
    pub fn resize(self, size: u32) -> Self {
        self.step(TransformStep::Resize { size })
    }
    pub fn center_crop(self, size: u32) -> Self {
        self.step(TransformStep::CenterCrop { size })
    }
    pub fn color_jitter(self, brightness: f32, contrast: f32, saturation: f32, hue: f32) -> Self {
        self.step(TransformStep::ColorJitter {
            brightness,
            contrast,
            saturation,
            hue,
        })
    }
    pub fn to_tensor(self) -> Self {
        self.step(TransformStep::ToTensor)
    }
    pub fn normalize(self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.step(TransformStep::Normalize { mean, std })
    }
    pub fn build(self) -> AugmentationSpec {
        AugmentationSpec { steps: self.steps }
    }
}

fn resized_crop_window(
    w: u32,
    h: u32,
    scale: (f32, f32),
    ratio: (f32, f32),
    rng: &mut dyn RngCore,
) -> (u32, u32, u32, u32) {
    let area = (w as f32) * (h as f32);
    let (log_lo, log_hi) = (ratio.0.ln(), ratio.1.ln());
    for _ in 0..RESIZED_CROP_ATTEMPTS {
        let target_area = area * rng.random_range(scale.0..=scale.1);
        let aspect = rng.random_range(log_lo..=log_hi).exp();
        let cw = (target_area * aspect).sqrt().round() as u32;
        let ch = (target_area / aspect).sqrt().round() as u32;
        if cw > 0 && ch > 0 && cw <= w && ch <= h {
            let y = rng.random_range(0..=h - ch);
            let x = rng.random_range(0..=w - cw);
            return (x, y, cw, ch);
        }
    }
    // fall back to a centered crop with the ratio clamped into range
    let in_ratio = w as f32 / h as f32;
    let (cw, ch) = if in_ratio < ratio.0 {
        (w, ((w as f32 / ratio.0).round() as u32).clamp(1, h))
    } else if in_ratio > ratio.1 {
        (((h as f32 * ratio.1).round() as u32).clamp(1, w), h)
    } else {
        (w, h)
    };
    ((w - cw) / 2, (h - ch) / 2, cw.max(1), ch.max(1))
}

fn shorter_edge_size(w: u32, h: u32, size: u32) -> (u32, u32) {
    if w <= h {
        let oh = ((size as u64 * h as u64) / w.max(1) as u64) as u32;
        (size, oh.max(1))
    } else {
        let ow = ((size as u64 * w as u64) / h.max(1) as u64) as u32;
        (ow.max(1), size)
    }
}

fn rotate_nearest<P>(img: &ImageBuffer<P, Vec<u8>>, degrees: f32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    let mut out: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(w, h);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = w as f32 * 0.5;
    let cy = h as f32 * 0.5;
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let sx = cos * dx - sin * dy + cx;
            let sy = sin * dx + cos * dy + cy;
            if sx >= 0.0 && sy >= 0.0 && sx < w as f32 && sy < h as f32 {
                out.put_pixel(x, y, *img.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    out
}

/// Centered `size x size` window; areas outside the input are zero.
fn center_crop<P>(img: &ImageBuffer<P, Vec<u8>>, size: u32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    if (w, h) == (size, size) {
        return img.clone();
    }
    let left = ((w as f64 - size as f64) / 2.0).round() as i64;
    let top = ((h as f64 - size as f64) / 2.0).round() as i64;
    let mut out: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(size, size);
    for y in 0..size {
        let sy = y as i64 + top;
        if sy < 0 || sy >= h as i64 {
            continue;
        }
        for x in 0..size {
            let sx = x as i64 + left;
            if sx < 0 || sx >= w as i64 {
                continue;
            }
            out.put_pixel(x, y, *img.get_pixel(sx as u32, sy as u32));
        }
    }
    out
}

fn rgb_to_tensor(img: &RgbImage) -> ImageTensor {
    let (w, h) = img.dimensions();
    let plane = (w * h) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in img.enumerate_pixels() {
        let base = (y * w + x) as usize;
        data[base] = pixel[0] as f32 / 255.0;
        data[plane + base] = pixel[1] as f32 / 255.0;
        data[2 * plane + base] = pixel[2] as f32 / 255.0;
    }
    ImageTensor {
        data,
        shape: [3, h as usize, w as usize],
    }
}

fn gray_to_tensor(img: &GrayImage) -> ImageTensor {
    let (w, h) = img.dimensions();
    ImageTensor {
        data: img.as_raw().iter().map(|&v| v as f32 / 255.0).collect(),
        shape: [1, h as usize, w as usize],
    }
}

fn normalize(t: &mut ImageTensor, mean: &[f32; 3], std: &[f32; 3]) -> DatasetResult<()> {
    let channels = t.channels();
    if channels > 3 {
        return Err(DatasetError::InvalidSpec(format!(
            "normalize supports up to 3 channels, got {channels}"
        )));
    }
    let plane = t.height() * t.width();
    for c in 0..channels {
        let (m, s) = (mean[c], std[c]);
        for v in &mut t.data[c * plane..(c + 1) * plane] {
            *v = (*v - m) / s;
        }
    }
    Ok(())
}

fn color_jitter(
    img: &mut RgbImage,
    brightness: f32,
    contrast: f32,
    saturation: f32,
    hue: f32,
    rng: &mut dyn RngCore,
) {
    let mut order = [0usize, 1, 2, 3];
    order.shuffle(&mut *rng);
    for op in order {
        match op {
            0 if brightness > 0.0 => {
                let f = jitter_factor(brightness, rng);
                for px in img.pixels_mut() {
                    px.0 = px.0.map(|v| to_u8(v as f32 * f));
                }
            }
            1 if contrast > 0.0 => {
                let f = jitter_factor(contrast, rng);
                let sum: f64 = img.pixels().map(|px| luma(px) as f64).sum();
                let mean = (sum / (img.width() as f64 * img.height() as f64).max(1.0)) as f32;
                for px in img.pixels_mut() {
                    px.0 = px.0.map(|v| to_u8(mean + (v as f32 - mean) * f));
                }
            }
            2 if saturation > 0.0 => {
                let f = jitter_factor(saturation, rng);
                for px in img.pixels_mut() {
                    let gray = luma(px);
                    px.0 = px.0.map(|v| to_u8(gray + (v as f32 - gray) * f));
                }
            }
            3 if hue > 0.0 => {
                let shift = rng.random_range(-hue..=hue);
                for px in img.pixels_mut() {
                    *px = shift_hue(*px, shift);
                }
            }
            _ => {}
        }
    }
}

fn jitter_factor(strength: f32, rng: &mut dyn RngCore) -> f32 {
    rng.random_range((1.0 - strength).max(0.0)..=1.0 + strength)
}

fn luma(px: &Rgb<u8>) -> f32 {
    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Rotate hue by `shift` of a full turn.
fn shift_hue(px: Rgb<u8>, shift: f32) -> Rgb<u8> {
    let [r, g, b] = px.0.map(|v| v as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    if delta <= f32::EPSILON {
        return px;
    }
    let s = delta / max;
    let mut h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    } / 6.0;
    h = (h + shift).rem_euclid(1.0);

    let v = max;
    let sector = h * 6.0;
    let i = sector.floor();
    let f = sector - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match i as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    Rgb([to_u8(r * 255.0), to_u8(g * 255.0), to_u8(b * 255.0)])
}
