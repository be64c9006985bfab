use crate::errors::PreprocessError;

/// Side length of the square model input.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Per-channel RGB statistics of the training set the deployed model was fit on.
pub const DEFAULT_MEAN: [f32; 3] = [0.554, 0.450, 0.343];
pub const DEFAULT_STD: [f32; 3] = [0.231, 0.241, 0.241];

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl PreprocessConfig {
    pub fn new(input_size: u32, mean: [f32; 3], std: [f32; 3]) -> Result<Self, PreprocessError> {
        let config = Self {
            input_size,
            mean,
            std,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PreprocessError> {
        if self.input_size == 0 {
            return Err(PreprocessError::InvalidConfig(
                "input size must be positive".to_string(),
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(PreprocessError::InvalidConfig(format!(
                "mean must be finite, got {:?}",
                self.mean
            )));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(PreprocessError::InvalidConfig(format!(
                "std must be finite and positive, got {:?}",
                self.std
            )));
        }
        Ok(())
    }

    /// Shape of the produced tensor: `[1, 3, side, side]`.
    pub fn output_shape(&self) -> [usize; 4] {
        let side = self.input_size as usize;
        [1, 3, side, side]
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
        }
    }
}
