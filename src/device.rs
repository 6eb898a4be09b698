use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indicatif::ProgressBar;
use tracing::warn;

use crate::batch::BatchRunner;
use crate::config::PostProcessConfig;
use crate::errors::{QuickPaintError, Result};
use crate::grouping::ShapeKey;
use crate::traits::StyleModelLoader;

/// Compute device an inference session is pinned to for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cuda { device_id: i32 },
    Cpu,
}

impl ComputeDevice {
    pub const fn is_accelerator(&self) -> bool {
        matches!(self, Self::Cuda { .. })
    }
}

impl FromStr for ComputeDevice {
    type Err = String;

    /// Accepts `cpu`, `cuda`, `cuda:N` and the legacy `gpu:N` / `/gpu:N`
    /// spellings.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('/').to_ascii_lowercase();
        let (kind, id) = match normalized.split_once(':') {
            Some((kind, id)) => {
                let id = id
                    .parse::<i32>()
                    .map_err(|_| format!("invalid device id in `{s}`"))?;
                (kind, id)
            }
            None => (normalized.as_str(), 0),
        };
        match kind {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda { device_id: id }),
            _ => Err(format!("unknown device `{s}`, expected `cuda[:N]` or `cpu`")),
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda { device_id } => write!(f, "cuda:{device_id}"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Runs shape-homogeneous groups through a model with single-shot device
/// fallback: a resource-exhaustion failure on the configured accelerator is
/// retried once, from scratch, on the CPU. Any other error, and any failure
/// of the CPU attempt itself, is fatal.
pub struct Evaluator<'a, L> {
    loader: &'a L,
    device: ComputeDevice,
    batch_size: usize,
    post: PostProcessConfig,
}

impl<'a, L: StyleModelLoader> Evaluator<'a, L> {
    pub const fn new(
        loader: &'a L,
        device: ComputeDevice,
        batch_size: usize,
        post: PostProcessConfig,
    ) -> Self {
        Self {
            loader,
            device,
            batch_size,
            post,
        }
    }

    /// Evaluates one shape group end to end.
    ///
    /// Outputs written before a primary-attempt failure are left in place;
    /// the fallback re-runs the identical request and overwrites them, since
    /// writes are idempotent per path.
    pub fn evaluate(
        &self,
        checkpoint: &Path,
        shape: ShapeKey,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        progress: &ProgressBar,
    ) -> Result<()> {
        if outputs.is_empty() {
            return Ok(());
        }
        let batch_size = self.batch_size.min(outputs.len());
        let position = progress.position();

        match self.attempt(self.device, checkpoint, shape, inputs, outputs, batch_size, progress) {
            Err(QuickPaintError::ResourceExhausted { detail }) if self.device.is_accelerator() => {
                warn!(
                    "not enough memory on {} ({detail}), re-running on cpu",
                    self.device
                );
                progress.set_position(position);
                self.attempt(
                    ComputeDevice::Cpu,
                    checkpoint,
                    shape,
                    inputs,
                    outputs,
                    batch_size,
                    progress,
                )
            }
            result => result,
        }
    }

    /// One device attempt: a fresh session restored from the checkpoint, so
    /// no state leaks between the primary and fallback attempts.
    #[allow(clippy::too_many_arguments)]
    fn attempt(
        &self,
        device: ComputeDevice,
        checkpoint: &Path,
        shape: ShapeKey,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        batch_size: usize,
        progress: &ProgressBar,
    ) -> Result<()> {
        let model = self.loader.load(checkpoint, device)?;
        BatchRunner::new(&model, self.post).run(shape, inputs, outputs, batch_size, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_parsing() {
        assert_eq!("cpu".parse::<ComputeDevice>().unwrap(), ComputeDevice::Cpu);
        assert_eq!(
            "cuda".parse::<ComputeDevice>().unwrap(),
            ComputeDevice::Cuda { device_id: 0 }
        );
        assert_eq!(
            "cuda:2".parse::<ComputeDevice>().unwrap(),
            ComputeDevice::Cuda { device_id: 2 }
        );
        assert_eq!(
            "/gpu:1".parse::<ComputeDevice>().unwrap(),
            ComputeDevice::Cuda { device_id: 1 }
        );
        assert!("tpu:0".parse::<ComputeDevice>().is_err());
        assert!("cuda:x".parse::<ComputeDevice>().is_err());
    }

    #[test]
    fn device_display_roundtrips() {
        for device in [ComputeDevice::Cpu, ComputeDevice::Cuda { device_id: 3 }] {
            assert_eq!(device.to_string().parse::<ComputeDevice>().unwrap(), device);
        }
    }
}
