use std::fmt;
use std::path::PathBuf;

use crate::errors::{QuickPaintError, Result};
use crate::image_io;

/// Exact pixel-tensor shape a batch is keyed on. No tolerance: two images
/// belong to the same group only when every axis matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    pub height: u32,
    pub width: u32,
    pub channels: u32,
}

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// One shape-homogeneous slice of the run. Inputs and outputs stay
/// positionally aligned and keep their original relative order.
#[derive(Debug, Clone)]
pub struct ShapeGroup {
    pub shape: ShapeKey,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

/// Partitions aligned input/output path lists into shape-homogeneous groups,
/// probing one image header at a time. Groups appear in first-seen order;
/// zero inputs produce zero groups.
pub fn group_by_shape(inputs: &[PathBuf], outputs: &[PathBuf]) -> Result<Vec<ShapeGroup>> {
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

    let mut groups: Vec<ShapeGroup> = Vec::new();
    for (input, output) in inputs.iter().zip(outputs) {
        let shape = image_io::image_shape(input)?;
        match groups.iter_mut().find(|group| group.shape == shape) {
            Some(group) => {
                group.inputs.push(input.clone());
                group.outputs.push(output.clone());
            }
            None => groups.push(ShapeGroup {
                shape,
                inputs: vec![input.clone()],
                outputs: vec![output.clone()],
            }),
        }
    }

    Ok(groups)
}
