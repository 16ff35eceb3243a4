use std::path::Path;

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisionError};

pub const CHANNELS: usize = 3;

/// Order in which colour channels are written into the input tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub height: usize,
    pub width: usize,
    pub channel_order: ChannelOrder,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            mean: [0.0, 0.0, 0.0],
            std: [1.0, 1.0, 1.0],
            height: 224,
            width: 224,
            channel_order: ChannelOrder::Rgb,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            return Err(VisionError::Config(format!(
                "input size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(VisionError::Config(format!(
                "std entries must be finite and non-zero, got {:?}",
                self.std
            )));
        }
        Ok(())
    }

    /// Number of values in one NHWC input tensor.
    pub fn input_len(&self) -> usize {
        self.height * self.width * CHANNELS
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.height, self.width, CHANNELS]
    }
}

#[derive(Debug)]
pub struct Processor {
    pub config: PreprocessConfig,
}

impl Processor {
    /// Create a new instance of the Processor struct
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Decode an in-memory image file and build the model input.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<Array4<f32>> {
        let image = image::load_from_memory(bytes)?;
        self.preprocess(&image)
    }

    /// Read an image file from disk and build the model input.
    ///
    /// The format is guessed from the file contents, not its extension.
    pub fn preprocess_path(&self, path: &Path) -> Result<Array4<f32>> {
        let bytes = std::fs::read(path).map_err(|source| VisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.preprocess_bytes(&bytes)
    }

    /// Resize to the model input size (aspect ratio is not preserved) and
    /// normalize into a `[1, H, W, 3]` tensor.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Array4<f32>> {
        let input = self.preprocess_flat(image)?;
        let [n, h, w, c] = self.config.input_shape();
        Ok(Array4::from_shape_vec((n, h, w, c), input)?)
    }

    /// Same as [`Processor::preprocess`] but returns the row-major buffer.
    pub fn preprocess_flat(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let resized = self.resize(image)?;
        let mean = self.config.mean;
        let std = self.config.std;

        let mut input = Vec::with_capacity(self.config.input_len());
        for rgb in resized.buffer().chunks_exact(CHANNELS) {
            let ordered = match self.config.channel_order {
                ChannelOrder::Rgb => [rgb[0], rgb[1], rgb[2]],
                ChannelOrder::Bgr => [rgb[2], rgb[1], rgb[0]],
            };
            for (c, value) in ordered.into_iter().enumerate() {
                input.push((value as f32 / 255.0 - mean[c]) / std[c]);
            }
        }
        Ok(input)
    }

    fn resize(&self, image: &DynamicImage) -> Result<Image<'static>> {
        let src = DynamicImage::ImageRgb8(flatten_onto_black(image));
        let mut dst_image = Image::new(
            self.config.width as u32,
            self.config.height as u32,
            PixelType::U8x3,
        );

        // Box convolution averages every source pixel covering a target pixel.
        let resize_options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Box));
        let mut resizer = Resizer::new();
        resizer.resize(&src, &mut dst_image, Some(&resize_options))?;
        Ok(dst_image)
    }
}

/// Drop the alpha channel, compositing translucent pixels over black.
fn flatten_onto_black(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let scale = |c: u8| (u16::from(c) * u16::from(a) / 255) as u8;
        Rgb([scale(r), scale(g), scale(b)])
    })
}
