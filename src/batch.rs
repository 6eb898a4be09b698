use std::path::PathBuf;

use indicatif::ProgressBar;
use ndarray::prelude::*;

use crate::config::PostProcessConfig;
use crate::errors::{QuickPaintError, Result};
use crate::grouping::ShapeKey;
use crate::image_io;
use crate::postprocess;
use crate::traits::StyleTransferModel;

/// Executes fixed-size batches of one shape-homogeneous group through a model
/// and writes post-processed results to their destination paths.
pub struct BatchRunner<'a, M> {
    model: &'a M,
    post: PostProcessConfig,
}

impl<'a, M: StyleTransferModel> BatchRunner<'a, M> {
    pub const fn new(model: &'a M, post: PostProcessConfig) -> Self {
        Self { model, post }
    }

    /// Drains the whole group.
    ///
    /// Each step processes every full batch of `min(batch_size, remaining)`
    /// consecutive images; the leftover slice becomes the next step with its
    /// own smaller effective batch size. Every step consumes at least one
    /// image, so the loop terminates without recursion.
    pub fn run(
        &self,
        shape: ShapeKey,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        batch_size: usize,
        progress: &ProgressBar,
    ) -> Result<()> {
        if inputs.len() != outputs.len() {
            return Err(QuickPaintError::Validation {
                field: "inputs/outputs".to_string(),
                reason: format!(
                    "misaligned path lists ({} inputs, {} outputs)",
                    inputs.len(),
                    outputs.len()
                ),
            });
        }
        if batch_size == 0 {
            return Err(QuickPaintError::Validation {
                field: "batch_size".to_string(),
                reason: "needs to be a positive integer".to_string(),
            });
        }

        let mut start = 0;
        while start < inputs.len() {
            let remaining = inputs.len() - start;
            let effective = remaining.min(batch_size);
            let end = start + remaining - remaining % effective;
            self.run_batches(
                shape,
                &inputs[start..end],
                &outputs[start..end],
                effective,
                progress,
            )?;
            start = end;
        }
        Ok(())
    }

    /// Runs consecutive full batches of exactly `batch_size` images. The
    /// batch buffer is allocated once and repopulated per iteration; the
    /// forward pass executes once per filled batch.
    fn run_batches(
        &self,
        shape: ShapeKey,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        batch_size: usize,
        progress: &ProgressBar,
    ) -> Result<()> {
        let (height, width) = (shape.height as usize, shape.width as usize);
        let mut batch = Array4::<f32>::zeros((batch_size, height, width, shape.channels as usize));

        for (batch_in, batch_out) in inputs
            .chunks_exact(batch_size)
            .zip(outputs.chunks_exact(batch_size))
        {
            for (slot, path) in batch_in.iter().enumerate() {
                let image = image_io::read_img(path)?;
                let (image_height, image_width, _) = image.dim();
                if (image_height, image_width) != (height, width) {
                    return Err(QuickPaintError::ImageProcessing {
                        path: path.display().to_string(),
                        operation: "batch fill".to_string(),
                        source: Box::new(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!(
                                "expected shape {shape}, decoded {image_height}x{image_width}x3"
                            ),
                        )),
                    });
                }
                batch.slice_mut(s![slot, .., .., ..]).assign(&image);
            }

            let preds = self.model.predict(batch.view())?;
            if preds.dim().0 != batch_size {
                return Err(QuickPaintError::Validation {
                    field: "predictions".to_string(),
                    reason: format!(
                        "model returned {} predictions for a batch of {batch_size}",
                        preds.dim().0
                    ),
                });
            }

            for (slot, path_out) in batch_out.iter().enumerate() {
                let input = batch.slice(s![slot, .., .., ..]);
                let mut image = postprocess::clip_to_u8(preds.slice(s![slot, .., .., ..]));
                if self.post.mask {
                    image = postprocess::apply_mask(input, image)?;
                }
                if self.post.blend > 0.0 {
                    image = postprocess::apply_blend(input, image, self.post.blend)?;
                }
                image_io::write_img(path_out, image.view())?;
                progress.inc(1);
            }
        }
        Ok(())
    }
}
