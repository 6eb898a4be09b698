use ndarray::prelude::*;
use ndarray::Zip;

use crate::errors::{QuickPaintError, Result};

/// Fraction of the input's maximum value below which a pixel is considered
/// background when masking.
const MASK_THRESHOLD_RATIO: f32 = 0.01;

/// Clamps raw predictions to the 8-bit range with a truncating cast.
pub fn clip_to_u8(pred: ArrayView3<'_, f32>) -> Array3<u8> {
    pred.mapv(|v| v.clamp(0.0, 255.0) as u8)
}

/// Binary foreground mask of the input: 1 where a value exceeds 1% of the
/// input's own maximum, 0 elsewhere. Elementwise over all three channels.
fn binary_mask(input: ArrayView3<'_, f32>) -> Array3<u8> {
    let max = input.fold(0.0_f32, |acc, &v| acc.max(v));
    let threshold = max * MASK_THRESHOLD_RATIO;
    input.mapv(|v| u8::from(v > threshold))
}

/// Crops a prediction to the top-left `(height, width)` region when its
/// spatial dimensions disagree with the target. No resampling; a prediction
/// smaller than the target cannot be cropped and is an error.
fn crop_to(pred: Array3<u8>, height: usize, width: usize) -> Result<Array3<u8>> {
    let (pred_height, pred_width, _) = pred.dim();
    if (pred_height, pred_width) == (height, width) {
        return Ok(pred);
    }
    if pred_height < height || pred_width < width {
        return Err(QuickPaintError::Validation {
            field: "prediction".to_string(),
            reason: format!(
                "prediction {pred_height}x{pred_width} is smaller than the {height}x{width} input"
            ),
        });
    }
    Ok(pred.slice(s![..height, ..width, ..]).to_owned())
}

/// Zeroes every predicted value whose input counterpart is at most 1% of the
/// input's maximum. The prediction is cropped to the mask's spatial extent on
/// shape mismatch.
pub fn apply_mask(input: ArrayView3<'_, f32>, pred: Array3<u8>) -> Result<Array3<u8>> {
    let (height, width, _) = input.dim();
    let mask = binary_mask(input);
    let mut pred = crop_to(pred, height, width)?;
    Zip::from(&mut pred).and(&mask).for_each(|p, &m| *p *= m);
    Ok(pred)
}

/// Multiplies the `blend`-scaled input into the prediction elementwise. This
/// is a product, not a linear interpolation: `out = input * blend * pred`,
/// clipped back to the 8-bit range. Same top-left crop rule as masking.
pub fn apply_blend(input: ArrayView3<'_, f32>, pred: Array3<u8>, blend: f32) -> Result<Array3<u8>> {
    let (height, width, _) = input.dim();
    let pred = crop_to(pred, height, width)?;
    let mut out = Array3::<u8>::zeros(pred.raw_dim());
    Zip::from(&mut out)
        .and(&pred)
        .and(&input)
        .for_each(|o, &p, &i| {
            *o = (i * blend * f32::from(p)).clamp(0.0, 255.0) as u8;
        });
    Ok(out)
}
