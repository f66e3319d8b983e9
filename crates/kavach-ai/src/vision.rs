//! Image preprocessing for ViT-style classifiers.
//!
//! Mirrors the settings in a HuggingFace `preprocessor_config.json`: resize,
//! rescale to `[0, 1]`, normalize per channel, and lay out as `[1, 3, H, W]`.

use std::path::Path;

use image::DynamicImage;
use image::imageops::{self, FilterType};
use serde::Deserialize;

use crate::Batch;

const DEFAULT_SIZE: u32 = 224;

/// Processor settings. Missing fields take the ViT image processor defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageProcessorConfig {
    #[serde(default = "default_true")]
    pub do_resize: bool,
    #[serde(default)]
    pub size: Size,
    /// PIL resample code: 0 nearest, 1 lanczos, 2 bilinear, 3 bicubic.
    #[serde(default = "default_resample")]
    pub resample: u32,
    #[serde(default = "default_true")]
    pub do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default = "default_true")]
    pub do_normalize: bool,
    #[serde(default = "default_half")]
    pub image_mean: Vec<f32>,
    #[serde(default = "default_half")]
    pub image_std: Vec<f32>,
}

/// Target size. Shortest-edge configs resize to a square of that edge.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Size {
    HeightWidth { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

impl Default for Size {
    fn default() -> Self {
        Self::HeightWidth {
            height: DEFAULT_SIZE,
            width: DEFAULT_SIZE,
        }
    }
}

impl Size {
    fn dims(self) -> (u32, u32) {
        match self {
            Self::HeightWidth { height, width } => (height, width),
            Self::ShortestEdge { shortest_edge } => (shortest_edge, shortest_edge),
            Self::Square(edge) => (edge, edge),
        }
    }
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: Size::default(),
            resample: default_resample(),
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: default_half(),
            image_std: default_half(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_resample() -> u32 {
    2
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_half() -> Vec<f32> {
    vec![0.5, 0.5, 0.5]
}

/// Converts decoded images into a `pixel_values` batch.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: ImageProcessorConfig,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(ImageProcessorConfig::default())
    }
}

impl ImageProcessor {
    pub fn new(config: ImageProcessorConfig) -> Self {
        let mean = per_channel(&config.image_mean, 0.0);
        let std = per_channel(&config.image_std, 1.0);
        Self { config, mean, std }
    }

    /// Load settings from a `preprocessor_config.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
        let config: ImageProcessorConfig = serde_json::from_str(&json)
            .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))?;
        anyhow::ensure!(
            config.image_std.iter().all(|s| *s != 0.0),
            "image_std must be non-zero in {}",
            path.display()
        );
        Ok(Self::new(config))
    }

    /// Output `(height, width)` after resizing.
    pub fn target_size(&self) -> (u32, u32) {
        self.config.size.dims()
    }

    /// Resize, rescale, and normalize into a `[1, 3, H, W]` tensor.
    pub fn preprocess(&self, image: &DynamicImage) -> Batch {
        let mut rgb = image.to_rgb8();
        if self.config.do_resize {
            let (height, width) = self.target_size();
            if rgb.dimensions() != (width, height) {
                rgb = imageops::resize(&rgb, width, height, self.filter());
            }
        }

        let (width, height) = rgb.dimensions();
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; 3 * plane];

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let offset = (y * width + x) as usize;
            for c in 0..3 {
                let mut v = f32::from(pixel[c]);
                if self.config.do_rescale {
                    v *= self.config.rescale_factor;
                }
                if self.config.do_normalize {
                    v = (v - self.mean[c]) / self.std[c];
                }
                data[c * plane + offset] = v;
            }
        }

        Batch::new().with_f32(
            "pixel_values",
            vec![1, 3, i64::from(height), i64::from(width)],
            data,
        )
    }

    fn filter(&self) -> FilterType {
        match self.config.resample {
            0 => FilterType::Nearest,
            1 => FilterType::Lanczos3,
            3 => FilterType::CatmullRom,
            _ => FilterType::Triangle,
        }
    }
}

/// Expand a 1- or 3-element list to three channels.
fn per_channel(values: &[f32], fallback: f32) -> [f32; 3] {
    match values {
        [v] => [*v; 3],
        [r, g, b, ..] => [*r, *g, *b],
        _ => [fallback; 3],
    }
}
