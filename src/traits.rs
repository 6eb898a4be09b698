use std::path::Path;

use ndarray::prelude::*;

use crate::device::ComputeDevice;
use crate::errors::Result;

/// The style network as an opaque forward pass.
///
/// The architecture and trained weights live entirely behind this trait; the
/// orchestration layer only feeds batches through it.
pub trait StyleTransferModel: Send + Sync {
    /// Runs the forward computation on an `(N, H, W, 3)` batch of pixel
    /// values in `0..=255` and returns raw predictions of the same rank.
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>>;
}

/// Constructs a fresh model session per device attempt.
///
/// The fallback controller needs to rebuild the model from its checkpoint
/// when it switches devices, so it depends on a loader rather than on a
/// single loaded model.
pub trait StyleModelLoader {
    type Model: StyleTransferModel;

    fn load(&self, checkpoint: &Path, device: ComputeDevice) -> Result<Self::Model>;
}
