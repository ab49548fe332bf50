use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::Rng;

use super::ImageTensor;

/// A single image-to-image step of a [`Pipeline`].
pub trait ImageTransform: Send + Sync {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage;
}

/// Zero-pads every side by `padding`, then crops a random `size`x`size` window.
pub struct RandomCrop {
    pub size: u32,
    pub padding: u32,
}

impl ImageTransform for RandomCrop {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage {
        let padded = pad(image, self.padding);
        let top = rng.gen_range(0..=padded.height().saturating_sub(self.size));
        let left = rng.gen_range(0..=padded.width().saturating_sub(self.size));
        imageops::crop_imm(&padded, left, top, self.size, self.size).to_image()
    }
}

fn pad(image: RgbImage, padding: u32) -> RgbImage {
    if padding == 0 {
        return image;
    }

    let mut padded = RgbImage::new(image.width() + 2 * padding, image.height() + 2 * padding);
    imageops::replace(&mut padded, &image, padding as i64, padding as i64);
    padded
}

pub struct RandomHorizontalFlip {
    pub probability: f64,
}

impl Default for RandomHorizontalFlip {
    fn default() -> Self {
        Self { probability: 0.5 }
    }
}

impl ImageTransform for RandomHorizontalFlip {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage {
        if rng.gen_bool(self.probability) {
            imageops::flip_horizontal(&image)
        } else {
            image
        }
    }
}

/// Crops a random area with a random aspect ratio and resizes it to `size`x`size`.
pub struct RandomResizedCrop {
    pub size: u32,
    /// Bounds of the cropped area, relative to the source area
    pub scale: (f64, f64),
    /// Bounds of the crop's width / height
    pub ratio: (f64, f64),
}

impl RandomResizedCrop {
    const ATTEMPTS: usize = 10;

    pub fn new(size: u32) -> Self {
        Self {
            size,
            scale: (0.08, 1.0),
            ratio: (3.0 / 4.0, 4.0 / 3.0),
        }
    }

    /// Returns `(left, top, width, height)` of the crop window.
    fn crop_window(&self, width: u32, height: u32, rng: &mut StdRng) -> (u32, u32, u32, u32) {
        let area = width as f64 * height as f64;
        let log_ratio = (self.ratio.0.ln(), self.ratio.1.ln());

        for _ in 0..Self::ATTEMPTS {
            let target_area = area * rng.gen_range(self.scale.0..=self.scale.1);
            let aspect = rng.gen_range(log_ratio.0..=log_ratio.1).exp();

            let crop_width = (target_area * aspect).sqrt().round_ties_even() as u32;
            let crop_height = (target_area / aspect).sqrt().round_ties_even() as u32;

            if crop_width > 0 && crop_width <= width && crop_height > 0 && crop_height <= height {
                let top = rng.gen_range(0..=height - crop_height);
                let left = rng.gen_range(0..=width - crop_width);
                return (left, top, crop_width, crop_height);
            }
        }

        // Central crop, clamped to the allowed aspect ratios
        let in_ratio = width as f64 / height as f64;
        let (crop_width, crop_height) = if in_ratio < self.ratio.0 {
            (width, (width as f64 / self.ratio.0).round_ties_even() as u32)
        } else if in_ratio > self.ratio.1 {
            ((height as f64 * self.ratio.1).round_ties_even() as u32, height)
        } else {
            (width, height)
        };
        (
            (width - crop_width) / 2,
            (height - crop_height) / 2,
            crop_width,
            crop_height,
        )
    }
}

impl ImageTransform for RandomResizedCrop {
    fn apply(&self, image: RgbImage, rng: &mut StdRng) -> RgbImage {
        let (left, top, width, height) = self.crop_window(image.width(), image.height(), rng);
        let cropped = imageops::crop_imm(&image, left, top, width, height).to_image();
        imageops::resize(&cropped, self.size, self.size, FilterType::Triangle)
    }
}

/// Resizes so that the shorter side equals `size`, keeping the aspect ratio.
pub struct Resize {
    pub size: u32,
}

impl ImageTransform for Resize {
    fn apply(&self, image: RgbImage, _rng: &mut StdRng) -> RgbImage {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return image;
        }

        let (new_width, new_height) = if width <= height {
            (self.size, (self.size as u64 * height as u64 / width as u64) as u32)
        } else {
            ((self.size as u64 * width as u64 / height as u64) as u32, self.size)
        };

        if (new_width, new_height) == (width, height) {
            return image;
        }
        imageops::resize(&image, new_width, new_height, FilterType::Triangle)
    }
}

pub struct CenterCrop {
    pub size: u32,
}

impl ImageTransform for CenterCrop {
    fn apply(&self, image: RgbImage, _rng: &mut StdRng) -> RgbImage {
        let (width, height) = image.dimensions();
        let left = (width.saturating_sub(self.size) as f64 / 2.0).round_ties_even() as u32;
        let top = (height.saturating_sub(self.size) as f64 / 2.0).round_ties_even() as u32;
        imageops::crop_imm(
            &image,
            left,
            top,
            self.size.min(width),
            self.size.min(height),
        )
        .to_image()
    }
}

/// Per-channel `(x - mean) / std` applied to a CHW tensor.
#[derive(Debug, Clone, Copy)]
pub struct Normalize {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalize {
    /// Maps `[0, 1]` to `[-1, 1]`.
    pub const SYMMETRIC: Normalize = Normalize {
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };

    pub const IMAGENET: Normalize = Normalize {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    pub fn apply(&self, tensor: &mut ImageTensor) {
        let plane = tensor.height() * tensor.width();
        if plane == 0 {
            return;
        }

        for (channel, values) in tensor.data.chunks_mut(plane).enumerate().take(3) {
            let (mean, std) = (self.mean[channel], self.std[channel]);
            values.iter_mut().for_each(|value| *value = (*value - mean) / std);
        }
    }
}

/// Converts an RGB8 image to a CHW tensor with values in `[0, 1]`.
pub fn to_tensor(image: &RgbImage) -> ImageTensor {
    let (width, height) = image.dimensions();
    let plane = width as usize * height as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (i, pixel) in image.pixels().enumerate() {
        for channel in 0..3 {
            data[channel * plane + i] = pixel.0[channel] as f32 / 255.0;
        }
    }

    ImageTensor::new(data, [3, height as usize, width as usize])
}

/// Image transforms followed by tensor conversion and optional normalization.
#[derive(Default)]
pub struct Pipeline {
    ops: Vec<Box<dyn ImageTransform>>,
    normalize: Option<Normalize>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, op: impl ImageTransform + 'static) -> Self {
        self.ops.push(Box::new(op));
        self
    }

    pub fn normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn apply(&self, image: RgbImage, rng: &mut StdRng) -> ImageTensor {
        let image = self.ops.iter().fold(image, |image, op| op.apply(image, rng));
        let mut tensor = to_tensor(&image);
        if let Some(normalize) = &self.normalize {
            normalize.apply(&mut tensor);
        }
        tensor
    }

    /// Pad 4 + random 32x32 crop, random flip, normalized to `[-1, 1]`.
    pub fn cifar10_train() -> Self {
        Self::new()
            .then(RandomCrop { size: 32, padding: 4 })
            .then(RandomHorizontalFlip::default())
            .normalize(Normalize::SYMMETRIC)
    }

    pub fn cifar10_test() -> Self {
        Self::new().normalize(Normalize::SYMMETRIC)
    }

    pub fn imagenet_train() -> Self {
        Self::new()
            .then(RandomResizedCrop::new(224))
            .then(RandomHorizontalFlip::default())
            .normalize(Normalize::IMAGENET)
    }

    pub fn imagenet_test() -> Self {
        Self::new()
            .then(Resize { size: 256 })
            .then(CenterCrop { size: 224 })
            .normalize(Normalize::IMAGENET)
    }
}
