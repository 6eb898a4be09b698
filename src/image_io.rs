use std::path::Path;

use image::RgbImage;
use ndarray::prelude::*;

use crate::errors::{QuickPaintError, Result};
use crate::grouping::ShapeKey;

/// Header-only probe of an image's pixel dimensions.
///
/// Channels are always 3: decoding normalizes grayscale and alpha images to
/// RGB before any tensor is built, so the shape key can be computed without
/// materializing the pixel data.
pub fn image_shape(path: &Path) -> Result<ShapeKey> {
    let (width, height) =
        image::image_dimensions(path).map_err(|e| QuickPaintError::ImageProcessing {
            path: path.display().to_string(),
            operation: "read dimensions".to_string(),
            source: Box::new(e),
        })?;
    Ok(ShapeKey {
        height,
        width,
        channels: 3,
    })
}

/// Decodes an image into an HWC `f32` tensor with values in `0..=255`.
///
/// Grayscale images have their single channel replicated and alpha channels
/// are dropped, so every tensor has exactly 3 channels.
pub fn read_img(path: &Path) -> Result<Array3<f32>> {
    let image = image::open(path)
        .map_err(|e| QuickPaintError::ImageProcessing {
            path: path.display().to_string(),
            operation: "decode image".to_string(),
            source: Box::new(e),
        })?
        .into_rgb8();

    let (width, height) = image.dimensions();
    let tensor = Array3::from_shape_vec((height as usize, width as usize, 3), image.into_raw())?;
    Ok(tensor.mapv(f32::from))
}

/// Writes an HWC `u8` tensor as an 8-bit RGB raster image, inferring the
/// format from the output path's extension.
pub fn write_img(path: &Path, image: ArrayView3<'_, u8>) -> Result<()> {
    let (height, width, _) = image.dim();
    let data = image.as_standard_layout().to_owned().into_raw_vec_and_offset().0;

    let buffer = RgbImage::from_raw(width as u32, height as u32, data).ok_or_else(|| {
        QuickPaintError::ImageProcessing {
            path: path.display().to_string(),
            operation: "build output buffer".to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "pixel buffer does not match image dimensions",
            )),
        }
    })?;

    buffer.save(path).map_err(|e| QuickPaintError::ImageProcessing {
        path: path.display().to_string(),
        operation: "save image".to_string(),
        source: Box::new(e),
    })
}
