pub mod batch;
pub mod config;
pub mod device;
pub mod errors;
pub mod grouping;
pub mod image_io;
pub mod model;
pub mod postprocess;
pub mod traits;

pub mod mocks;

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use walkdir::WalkDir;

pub use batch::BatchRunner;
pub use config::{Config, PostProcessConfig, ALL_MODELS, MODEL_EXTENSION};
pub use device::{ComputeDevice, Evaluator};
pub use errors::{QuickPaintError, Result};
pub use grouping::{group_by_shape, ShapeGroup, ShapeKey};
pub use model::{Model, OrtModelLoader};
pub use traits::{StyleModelLoader, StyleTransferModel};

/// Top-level driver: resolves checkpoints, pairs inputs with outputs, groups
/// the pairs by pixel shape, and evaluates every group with device fallback.
/// Strictly sequential: one model, one device, one batch at a time.
pub struct StylePipeline<L> {
    loader: L,
    config: Config,
}

impl StylePipeline<OrtModelLoader> {
    pub const fn with_onnx_models(config: Config) -> Self {
        Self::new(OrtModelLoader, config)
    }
}

impl<L: StyleModelLoader> StylePipeline<L> {
    pub const fn new(loader: L, config: Config) -> Self {
        Self { loader, config }
    }

    /// Runs every resolved model over the configured input set. Errors abort
    /// the whole run; already-written outputs remain on disk.
    pub fn run(&self) -> Result<()> {
        let checkpoints = self.resolve_checkpoints()?;
        let tag_model = checkpoints.len() > 1;

        for checkpoint in &checkpoints {
            info!("painting with model {}", checkpoint.display());

            let (inputs, outputs) = self.collect_io(checkpoint, tag_model)?;
            if inputs.is_empty() {
                warn!("no images found under {}", self.config.input.display());
                continue;
            }

            let progress = ProgressBar::new(inputs.len() as u64);
            progress.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
                )
                .map_err(|e| QuickPaintError::Configuration {
                    message: format!("invalid progress template: {e}"),
                })?
                .progress_chars("#>-"),
            );

            let evaluator = Evaluator::new(
                &self.loader,
                self.config.device,
                self.config.batch_size as usize,
                self.config.post(),
            );
            for group in group_by_shape(&inputs, &outputs)? {
                info!(
                    "evaluating {} images of shape {}",
                    group.inputs.len(),
                    group.shape
                );
                evaluator.evaluate(
                    checkpoint,
                    group.shape,
                    &group.inputs,
                    &group.outputs,
                    &progress,
                )?;
            }
            progress.finish();
        }
        Ok(())
    }

    /// A named model maps to `<models-dir>/<name>.onnx`; the reserved name
    /// `all` maps every style reference image to its same-stem checkpoint,
    /// in sorted order.
    fn resolve_checkpoints(&self) -> Result<Vec<PathBuf>> {
        if self.config.model != ALL_MODELS {
            return Ok(vec![self
                .config
                .models_dir
                .join(&self.config.model)
                .with_extension(MODEL_EXTENSION)]);
        }

        let entries = fs::read_dir(&self.config.styles_dir).map_err(|e| {
            QuickPaintError::FileSystem {
                path: self.config.styles_dir.clone(),
                operation: "list style references".to_string(),
                source: e,
            }
        })?;

        let mut stems: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuickPaintError::FileSystem {
                path: self.config.styles_dir.clone(),
                operation: "list style references".to_string(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_file() && ImageFormat::from_path(&path).is_ok() {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();

        if stems.is_empty() {
            return Err(QuickPaintError::Configuration {
                message: format!(
                    "model `{ALL_MODELS}` requested but no style references found under {}",
                    self.config.styles_dir.display()
                ),
            });
        }

        Ok(stems
            .into_iter()
            .map(|stem| {
                self.config
                    .models_dir
                    .join(stem)
                    .with_extension(MODEL_EXTENSION)
            })
            .collect())
    }

    /// Builds the aligned (inputs, outputs) path lists for one model pass.
    ///
    /// A file input produces a single pair. A directory input is enumerated
    /// recursively in file-name order and flattened: outputs keep only the
    /// basename. With several models in flight the model stem is folded into
    /// every output name so the passes cannot overwrite each other.
    fn collect_io(&self, checkpoint: &Path, tag_model: bool) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let input = &self.config.input;
        let output = &self.config.output;
        let model_stem = checkpoint
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| QuickPaintError::Configuration {
                message: format!("checkpoint {} has no usable name", checkpoint.display()),
            })?;

        if !input.is_dir() {
            let out = if output.is_dir() {
                output.join(stylized_name(input, model_stem)?)
            } else {
                output.clone()
            };
            return Ok((vec![input.clone()], vec![out]));
        }

        if output.exists() && !output.is_dir() {
            return Err(QuickPaintError::Configuration {
                message: format!(
                    "output {} must be a directory when the input is a directory",
                    output.display()
                ),
            });
        }

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for entry in WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();
            if !path.is_file() || ImageFormat::from_path(path).is_err() {
                continue;
            }
            let name = if tag_model {
                stylized_name(path, model_stem)?
            } else {
                PathBuf::from(entry.file_name())
            };
            inputs.push(path.to_path_buf());
            outputs.push(output.join(name));
        }
        Ok((inputs, outputs))
    }
}

/// `content.jpg` stylized with model `cubist` becomes `content_cubist.jpg`.
fn stylized_name(input: &Path, model_stem: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| QuickPaintError::Validation {
            field: "input".to_string(),
            reason: format!("{} has no usable file name", input.display()),
        })?;
    let name = match input.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}_{model_stem}.{ext}"),
        None => format!("{stem}_{model_stem}"),
    };
    Ok(PathBuf::from(name))
}
