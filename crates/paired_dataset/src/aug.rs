//! Image preprocessing and augmentation pipeline.

use crate::types::{DatasetResult, ImageTensor, PairedDatasetError};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Spatial preprocessing applied before flipping and normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preprocess {
    /// Resize to `load_size` square, then random crop to `crop_size`.
    ResizeAndCrop,
    /// Random crop to `crop_size` only.
    Crop,
    /// Scale width to `load_size`, keeping aspect (height at least `crop_size`).
    ScaleWidth,
    /// `ScaleWidth` followed by a random crop.
    ScaleWidthAndCrop,
    /// Only round both sides to a multiple of 4.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub preprocess: Preprocess,
    pub load_size: u32,
    pub crop_size: u32,
    /// Disable the random horizontal flip.
    pub no_flip: bool,
    /// Map [0, 1] to [-1, 1] with mean 0.5 / std 0.5 per channel.
    pub normalize: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            preprocess: Preprocess::ResizeAndCrop,
            load_size: 286,
            crop_size: 256,
            no_flip: false,
            normalize: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Rgb,
    Grayscale,
}

impl ChannelMode {
    pub fn channels(&self) -> u32 {
        match self {
            ChannelMode::Rgb => 3,
            ChannelMode::Grayscale => 1,
        }
    }
}

const POWER_BASE: u32 = 4;
const FLIP_PROB: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    pub config: TransformConfig,
    pub mode: ChannelMode,
}

impl TransformPipeline {
    pub fn rgb(config: &TransformConfig) -> Self {
        Self {
            config: config.clone(),
            mode: ChannelMode::Rgb,
        }
    }

    pub fn grayscale(config: &TransformConfig) -> Self {
        Self {
            config: config.clone(),
            mode: ChannelMode::Grayscale,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "mode={:?} channels={} preprocess={:?} load_size={} crop_size={} flip={} normalize={}",
            self.mode,
            self.mode.channels(),
            self.config.preprocess,
            self.config.load_size,
            self.config.crop_size,
            !self.config.no_flip,
            self.config.normalize
        )
    }

    /// Transform a decoded image. `source` is only used for error context.
    pub fn apply(
        &self,
        img: &DynamicImage,
        source: &Path,
        rng: &mut dyn rand::RngCore,
    ) -> DatasetResult<ImageTensor> {
        match self.mode {
            ChannelMode::Rgb => {
                let img = self.spatial(img.to_rgb8(), source, rng)?;
                Ok(self.to_tensor(&img))
            }
            ChannelMode::Grayscale => {
                let img = self.spatial(to_luma_601(img), source, rng)?;
                Ok(self.to_tensor(&img))
            }
        }
    }

    fn spatial<P>(
        &self,
        img: ImageBuffer<P, Vec<P::Subpixel>>,
        source: &Path,
        rng: &mut dyn rand::RngCore,
    ) -> DatasetResult<ImageBuffer<P, Vec<P::Subpixel>>>
    where
        P: Pixel + 'static,
        P::Subpixel: 'static,
    {
        let cfg = &self.config;
        let img = match cfg.preprocess {
            Preprocess::ResizeAndCrop => {
                let resized =
                    imageops::resize(&img, cfg.load_size, cfg.load_size, FilterType::CatmullRom);
                random_crop(resized, cfg.crop_size, source, rng)?
            }
            Preprocess::Crop => random_crop(img, cfg.crop_size, source, rng)?,
            Preprocess::ScaleWidth => scale_width(img, cfg.load_size, cfg.crop_size),
            Preprocess::ScaleWidthAndCrop => {
                let scaled = scale_width(img, cfg.load_size, cfg.crop_size);
                random_crop(scaled, cfg.crop_size, source, rng)?
            }
            Preprocess::None => make_power_of(img, POWER_BASE),
        };
        Ok(maybe_hflip(img, !cfg.no_flip, rng))
    }

    fn to_tensor<P>(&self, img: &ImageBuffer<P, Vec<P::Subpixel>>) -> ImageTensor
    where
        P: Pixel<Subpixel = u8>,
    {
        let (width, height) = img.dimensions();
        let channels = P::CHANNEL_COUNT as usize;
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; plane * channels];
        for (x, y, pixel) in img.enumerate_pixels() {
            let base = (y * width + x) as usize;
            for (c, &v) in pixel.channels().iter().enumerate() {
                let v = v as f32 / 255.0;
                data[c * plane + base] = if self.config.normalize {
                    (v - 0.5) / 0.5
                } else {
                    v
                };
            }
        }
        ImageTensor {
            data,
            channels: channels as u32,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipelineBuilder {
    config: TransformConfig,
}

impl Default for TransformPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: TransformConfig::default(),
        }
    }
    pub fn preprocess(mut self, preprocess: Preprocess) -> Self {
        self.config.preprocess = preprocess;
        self
    }
    pub fn load_size(mut self, size: u32) -> Self {
        self.config.load_size = size;
        self
    }
    pub fn crop_size(mut self, size: u32) -> Self {
        self.config.crop_size = size;
        self
    }
    pub fn no_flip(mut self, no_flip: bool) -> Self {
        self.config.no_flip = no_flip;
        self
    }
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.config.normalize = normalize;
        self
    }
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }
    pub fn build_rgb(&self) -> TransformPipeline {
        TransformPipeline::rgb(&self.config)
    }
    pub fn build_grayscale(&self) -> TransformPipeline {
        TransformPipeline::grayscale(&self.config)
    }
}

/// Luma with ITU-R 601-2 weights (0.299, 0.587, 0.114) in 16-bit fixed
/// point, rounded. Single-channel 8-bit input is kept as is.
fn to_luma_601(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

fn random_crop<P>(
    img: ImageBuffer<P, Vec<P::Subpixel>>,
    size: u32,
    source: &Path,
    rng: &mut dyn rand::RngCore,
) -> DatasetResult<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (w, h) = img.dimensions();
    if size > w || size > h {
        return Err(PairedDatasetError::Transform {
            path: source.to_path_buf(),
            msg: format!("crop {size}x{size} larger than image {w}x{h}"),
        });
    }
    if size == w && size == h {
        return Ok(img);
    }
    let x = rng.random_range(0..=w - size);
    let y = rng.random_range(0..=h - size);
    Ok(imageops::crop_imm(&img, x, y, size, size).to_image())
}

fn scale_width<P>(
    img: ImageBuffer<P, Vec<P::Subpixel>>,
    target_width: u32,
    crop_size: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (w, h) = img.dimensions();
    if w == target_width && h >= crop_size {
        return img;
    }
    let scaled_h = (target_width as u64 * h as u64 / w.max(1) as u64) as u32;
    let new_h = scaled_h.max(crop_size);
    imageops::resize(&img, target_width, new_h, FilterType::CatmullRom)
}

fn make_power_of<P>(
    img: ImageBuffer<P, Vec<P::Subpixel>>,
    base: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (w, h) = img.dimensions();
    let round = |v: u32| (((v as f32 / base as f32).round() as u32) * base).max(base);
    let (new_w, new_h) = (round(w), round(h));
    if new_w == w && new_h == h {
        return img;
    }
    imageops::resize(&img, new_w, new_h, FilterType::CatmullRom)
}

fn maybe_hflip<P>(
    img: ImageBuffer<P, Vec<P::Subpixel>>,
    enabled: bool,
    rng: &mut dyn rand::RngCore,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    if !enabled {
        return img;
    }
    if rng.random_bool(FLIP_PROB) {
        imageops::flip_horizontal(&img)
    } else {
        img
    }
}
