use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the style-transfer pipeline.
///
/// Each variant captures context specific to its error domain (filesystem,
/// image processing, model operations, etc.). The `ResourceExhausted` variant
/// is special: it is the only recoverable condition, consumed once by the
/// device-fallback path and fatal on any further occurrence.
#[derive(Error, Debug)]
pub enum QuickPaintError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Device resource exhausted: {detail}")]
    ResourceExhausted { detail: String },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, QuickPaintError>;

impl QuickPaintError {
    /// Classifies an ONNX Runtime error, routing allocator failures into
    /// `ResourceExhausted` so the device-fallback path can catch them.
    pub(crate) fn from_ort(operation: &str, err: ort::Error) -> Self {
        let detail = err.to_string();
        if is_resource_exhausted_message(&detail) {
            Self::ResourceExhausted { detail }
        } else {
            Self::Model {
                operation: operation.to_string(),
                source: Box::new(err),
            }
        }
    }
}

/// ONNX Runtime reports allocator failures as plain strings, so the
/// out-of-memory condition has to be recognized by message content.
fn is_resource_exhausted_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    [
        "out of memory",
        "cuda_error_out_of_memory",
        "cudamalloc",
        "failed to allocate",
        "allocation failed",
        "bad_alloc",
        "resource exhausted",
    ]
    .iter()
    .any(|needle| message.contains(needle))
}

/// Convert I/O errors to filesystem errors.
///
/// Code that has context should construct `QuickPaintError::FileSystem`
/// directly with the specific path and operation; this conversion is the
/// fallback for errors that occur without one.
impl From<std::io::Error> for QuickPaintError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// Convert image crate errors to image processing errors.
impl From<image::ImageError> for QuickPaintError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ONNX Runtime errors to model errors, classifying allocator
/// failures as `ResourceExhausted`.
impl From<ort::Error> for QuickPaintError {
    fn from(err: ort::Error) -> Self {
        Self::from_ort("ort operation", err)
    }
}

/// Convert ndarray shape errors to model errors. Shape errors occur during
/// tensor operations which are part of model inference, so they belong to the
/// model error domain.
impl From<ndarray::ShapeError> for QuickPaintError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}
