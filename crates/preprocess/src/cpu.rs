use crate::config::PreprocessConfig;
use crate::errors::PreprocessError;
use common::{span, span_debug};
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{Array, IxDyn};

/// Maps encoded image bytes to the `[1, 3, side, side]` tensor the classifier
/// expects.
///
/// Stateless and `Sync`: one instance can serve concurrent invocations.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Result<Self, PreprocessError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Decode, coerce to RGB, stretch to the configured square and normalize.
    ///
    /// Output is deterministic for a given input and configuration.
    pub fn preprocess(&self, raw: &[u8]) -> Result<Array<f32, IxDyn>, PreprocessError> {
        let _s = span!("preprocess_image");

        if raw.is_empty() {
            return Err(PreprocessError::Empty);
        }

        let rgb = Self::decode_rgb(raw)?;

        tracing::trace!(
            width = rgb.width(),
            height = rgb.height(),
            encoded_bytes = raw.len(),
            "Decoded image"
        );

        let resized = self.resize(rgb)?;
        self.normalize(&resized)
    }

    fn decode_rgb(raw: &[u8]) -> Result<RgbImage, PreprocessError> {
        let _s = span_debug!("decode_rgb");
        // Palette, grey, alpha and 16-bit inputs all collapse to 8-bit RGB;
        // alpha is dropped, not composited.
        Ok(image::load_from_memory(raw)?.to_rgb8())
    }

    fn resize(&self, rgb: RgbImage) -> Result<Vec<u8>, PreprocessError> {
        let _s = span_debug!("resize");

        let side = self.config.input_size;
        let (width, height) = rgb.dimensions();
        if width == side && height == side {
            return Ok(rgb.into_raw());
        }

        let src = ImageRef::new(width, height, rgb.as_raw(), PixelType::U8x3)?;
        let mut dst = Image::new(side, side, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut dst,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom)),
        )?;

        Ok(dst.buffer().to_vec())
    }

    fn normalize(&self, pixels: &[u8]) -> Result<Array<f32, IxDyn>, PreprocessError> {
        let _s = span_debug!("normalize");

        let side = self.config.input_size as usize;
        let spatial = side * side;
        let PreprocessConfig { mean, std, .. } = &self.config;

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in pixels.chunks_exact(3).enumerate() {
            let r = px[0] as f32 / 255.0;
            let g = px[1] as f32 / 255.0;
            let b = px[2] as f32 / 255.0;

            output[i] = (r - mean[0]) / std[0];
            output[i + spatial] = (g - mean[1]) / std[1];
            output[i + 2 * spatial] = (b - mean[2]) / std[2];
        }

        Ok(Array::from_shape_vec(
            IxDyn(&self.config.output_shape()),
            output,
        )?)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self {
            config: PreprocessConfig::default(),
        }
    }
}
