//! Deterministic object keys and image identifier rules
//!
//! The intake side writes uploads under these keys and the worker derives the
//! image identifier back from them, so both ends must agree on this module.

/// Default bucket for raw uploads.
pub const UPLOAD_BUCKET: &str = "image-recog-user-uploads";

/// Default bucket holding the model artifact.
pub const MODEL_BUCKET: &str = "image-recog-model";

/// Default key of the model artifact within [`MODEL_BUCKET`].
pub const MODEL_KEY: &str = "model.onnx";

pub const UPLOAD_KEY_PREFIX: &str = "upload_";
pub const UPLOAD_KEY_EXTENSION: &str = "jpg";

pub const MAX_IMAGE_ID_LEN: usize = 128;

/// True when `image_id` is non-empty, at most [`MAX_IMAGE_ID_LEN`] bytes and
/// made of ASCII alphanumerics, `-` and `_`.
pub fn is_valid_image_id(image_id: &str) -> bool {
    !image_id.is_empty()
        && image_id.len() <= MAX_IMAGE_ID_LEN
        && image_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Object key the upload for `image_id` is stored under.
pub fn upload_key(image_id: &str) -> String {
    format!("{UPLOAD_KEY_PREFIX}{image_id}.{UPLOAD_KEY_EXTENSION}")
}

/// Inverse of [`upload_key`]: strips the prefix and the final extension.
///
/// Returns `None` when the key does not carry the upload prefix or the
/// remaining stem is not a valid image identifier.
pub fn image_id_from_key(key: &str) -> Option<&str> {
    let file_name = key.rsplit('/').next()?;
    let rest = file_name.strip_prefix(UPLOAD_KEY_PREFIX)?;
    let stem = match rest.rfind('.') {
        Some(0) | None => rest,
        Some(idx) => &rest[..idx],
    };
    is_valid_image_id(stem).then_some(stem)
}

/// True when `segment` is safe to use as a bucket name or a key path segment.
pub(crate) fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('\\')
        && !segment.contains('\0')
}
