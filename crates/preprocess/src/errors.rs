use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("empty image payload")]
    Empty,

    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("invalid preprocessing config: {0}")]
    InvalidConfig(String),
}

impl From<fast_image_resize::ResizeError> for PreprocessError {
    fn from(e: fast_image_resize::ResizeError) -> Self {
        PreprocessError::Resize(e.to_string())
    }
}

impl From<fast_image_resize::ImageBufferError> for PreprocessError {
    fn from(e: fast_image_resize::ImageBufferError) -> Self {
        PreprocessError::Resize(e.to_string())
    }
}
