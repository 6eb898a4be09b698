use std::path::Path;

use ndarray::prelude::*;
use parking_lot::Mutex;

use crate::device::ComputeDevice;
use crate::errors::{QuickPaintError, Result};
use crate::traits::{StyleModelLoader, StyleTransferModel};

/// Mock style network for tests: a fixed elementwise transform of the batch.
#[derive(Debug, Clone, Copy)]
pub enum MockStyleModel {
    /// Returns the batch unchanged.
    Identity,
    /// Scales every value, exercising the clip path.
    Scale(f32),
    /// Pads each prediction by `margin` pixels on the bottom/right,
    /// exercising the shape-mismatch crop rule.
    Grow(usize),
}

impl StyleTransferModel for MockStyleModel {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        match *self {
            Self::Identity => Ok(batch.to_owned()),
            Self::Scale(factor) => Ok(batch.mapv(|v| v * factor)),
            Self::Grow(margin) => {
                let (n, height, width, channels) = batch.dim();
                let mut grown =
                    Array4::from_elem((n, height + margin, width + margin, channels), 127.0);
                grown
                    .slice_mut(s![.., ..height, ..width, ..])
                    .assign(&batch);
                Ok(grown)
            }
        }
    }
}

/// Mock loader handing out `MockStyleModel`s. Records every device attempt
/// and can refuse accelerator devices with a resource-exhaustion error to
/// exercise the CPU fallback path.
#[derive(Debug)]
pub struct MockModelLoader {
    model: MockStyleModel,
    exhaust_on_accelerator: bool,
    attempts: Mutex<Vec<ComputeDevice>>,
}

impl MockModelLoader {
    pub const fn new(model: MockStyleModel) -> Self {
        Self {
            model,
            exhaust_on_accelerator: false,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub const fn exhaust_on_accelerator(mut self) -> Self {
        self.exhaust_on_accelerator = true;
        self
    }

    /// Devices passed to `load`, in call order.
    pub fn attempts(&self) -> Vec<ComputeDevice> {
        self.attempts.lock().clone()
    }
}

impl StyleModelLoader for MockModelLoader {
    type Model = MockStyleModel;

    fn load(&self, _checkpoint: &Path, device: ComputeDevice) -> Result<MockStyleModel> {
        self.attempts.lock().push(device);
        if self.exhaust_on_accelerator && device.is_accelerator() {
            return Err(QuickPaintError::ResourceExhausted {
                detail: format!("mock allocator refused {device}"),
            });
        }
        Ok(self.model)
    }
}

/// A model that fails its first `failures` forward passes with resource
/// exhaustion and succeeds afterwards, for exercising mid-run fallback.
#[derive(Debug)]
pub struct ExhaustingModel {
    remaining_failures: Mutex<usize>,
}

impl ExhaustingModel {
    pub const fn new(failures: usize) -> Self {
        Self {
            remaining_failures: Mutex::new(failures),
        }
    }
}

impl StyleTransferModel for ExhaustingModel {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        let mut remaining = self.remaining_failures.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(QuickPaintError::ResourceExhausted {
                detail: "mock arena exhausted during forward pass".to_string(),
            });
        }
        Ok(batch.to_owned())
    }
}
