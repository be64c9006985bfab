pub mod config;
pub mod cpu;
pub mod errors;

pub use config::{DEFAULT_INPUT_SIZE, DEFAULT_MEAN, DEFAULT_STD, PreprocessConfig};
pub use cpu::ImagePreprocessor;
pub use errors::PreprocessError;
