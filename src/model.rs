use std::path::Path;

use ndarray::prelude::*;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, TensorRTExecutionProvider,
};
use ort::session::{builder::SessionBuilder, Session};
use ort::value::TensorRef;
use parking_lot::Mutex;

use crate::device::ComputeDevice;
use crate::errors::{QuickPaintError, Result};
use crate::traits::{StyleModelLoader, StyleTransferModel};

/// A pre-trained style network restored from an ONNX checkpoint and pinned to
/// one compute device. The network is opaque: input and output tensor names
/// are read from the session metadata, and the forward pass is the only
/// operation.
pub struct Model {
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

impl Model {
    /// Restores the checkpoint into a fresh session.
    ///
    /// Accelerator sessions register the TensorRT and CUDA execution
    /// providers; operations either provider cannot place stay on the CPU
    /// (ONNX Runtime's soft placement). A missing or unreadable checkpoint is
    /// fatal for the run.
    pub fn load(checkpoint: &Path, device: ComputeDevice) -> Result<Self> {
        let builder = SessionBuilder::new()
            .map_err(|e| QuickPaintError::from_ort("session builder initialization", e))?;

        let builder = match device {
            ComputeDevice::Cuda { device_id } => builder.with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ]),
            ComputeDevice::Cpu => {
                builder.with_execution_providers([CPUExecutionProvider::default().build()])
            }
        }
        .map_err(|e| QuickPaintError::from_ort("execution provider registration", e))?;

        let session = builder
            .with_memory_pattern(true)
            .map_err(|e| QuickPaintError::from_ort("memory pattern configuration", e))?
            .commit_from_file(checkpoint)
            .map_err(|e| {
                QuickPaintError::from_ort(&format!("restore checkpoint {}", checkpoint.display()), e)
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| QuickPaintError::Model {
                operation: format!("inspect checkpoint {}", checkpoint.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "model has no inputs",
                )),
            })?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| QuickPaintError::Model {
                operation: format!("inspect checkpoint {}", checkpoint.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "model has no outputs",
                )),
            })?;

        Ok(Self {
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }
}

impl StyleTransferModel for Model {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<Array4<f32>> {
        let batch = batch.as_standard_layout();
        let tensor = TensorRef::from_array_view(&batch)
            .map_err(|e| QuickPaintError::from_ort("input tensor creation", e))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| QuickPaintError::from_ort("forward pass", e))?;

        Ok(outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| QuickPaintError::from_ort("prediction extraction", e))?
            .into_dimensionality::<Ix4>()?
            .to_owned())
    }
}

/// Loads ONNX sessions. One fresh session per device attempt, so a failed
/// accelerator attempt cannot leak state into the CPU fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrtModelLoader;

impl StyleModelLoader for OrtModelLoader {
    type Model = Model;

    fn load(&self, checkpoint: &Path, device: ComputeDevice) -> Result<Model> {
        Model::load(checkpoint, device)
    }
}
