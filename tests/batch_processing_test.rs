use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use indicatif::ProgressBar;
use ndarray::prelude::*;
use parking_lot::Mutex;
use tempfile::TempDir;

use quickpaint_rs::mocks::{MockModelLoader, MockStyleModel};
use quickpaint_rs::{
    BatchRunner, ComputeDevice, Evaluator, PostProcessConfig, ShapeKey, StyleModelLoader,
    StyleTransferModel,
};

/// Identity model that records the shape of every batch fed through it.
struct RecordingModel {
    batches: Arc<Mutex<Vec<[usize; 4]>>>,
}

impl StyleTransferModel for RecordingModel {
    fn predict(&self, batch: ArrayView4<'_, f32>) -> quickpaint_rs::Result<Array4<f32>> {
        let (n, height, width, channels) = batch.dim();
        self.batches.lock().push([n, height, width, channels]);
        Ok(batch.to_owned())
    }
}

struct RecordingLoader {
    batches: Arc<Mutex<Vec<[usize; 4]>>>,
}

impl RecordingLoader {
    fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn batches(&self) -> Vec<[usize; 4]> {
        self.batches.lock().clone()
    }
}

impl StyleModelLoader for RecordingLoader {
    type Model = RecordingModel;

    fn load(
        &self,
        _checkpoint: &Path,
        _device: ComputeDevice,
    ) -> quickpaint_rs::Result<RecordingModel> {
        Ok(RecordingModel {
            batches: Arc::clone(&self.batches),
        })
    }
}

fn write_gradient_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
    .save(path)
    .unwrap();
}

fn make_pairs(dir: &Path, count: usize, width: u32, height: u32) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for i in 0..count {
        let input = dir.join(format!("in{i}.png"));
        write_gradient_png(&input, width, height);
        inputs.push(input);
        outputs.push(dir.join(format!("out{i}.png")));
    }
    (inputs, outputs)
}

const NO_POST: PostProcessConfig = PostProcessConfig::new(false, 0.0);

#[test]
fn five_images_batch_two_drain_the_remainder() {
    let dir = TempDir::new().unwrap();
    let (inputs, outputs) = make_pairs(dir.path(), 5, 256, 256);
    let shape = ShapeKey {
        height: 256,
        width: 256,
        channels: 3,
    };

    let loader = RecordingLoader::new();
    let model = loader.load(Path::new("style.onnx"), ComputeDevice::Cpu).unwrap();
    BatchRunner::new(&model, NO_POST)
        .run(shape, &inputs, &outputs, 2, &ProgressBar::hidden())
        .unwrap();

    // Two full batches, then the single leftover image as its own batch.
    assert_eq!(
        loader.batches(),
        vec![[2, 256, 256, 3], [2, 256, 256, 3], [1, 256, 256, 3]]
    );
    for output in &outputs {
        assert!(output.exists(), "missing output {}", output.display());
    }
}

#[test]
fn every_batch_has_the_group_shape() {
    let dir = TempDir::new().unwrap();
    let (inputs, outputs) = make_pairs(dir.path(), 7, 12, 6);
    let shape = ShapeKey {
        height: 6,
        width: 12,
        channels: 3,
    };

    let loader = RecordingLoader::new();
    let model = loader.load(Path::new("style.onnx"), ComputeDevice::Cpu).unwrap();
    BatchRunner::new(&model, NO_POST)
        .run(shape, &inputs, &outputs, 3, &ProgressBar::hidden())
        .unwrap();

    let batches = loader.batches();
    assert_eq!(batches.len(), 3);
    for batch in &batches {
        assert_eq!(batch[1..], [6, 12, 3]);
    }
    // No image dropped: batch sizes sum to the input count.
    assert_eq!(batches.iter().map(|b| b[0]).sum::<usize>(), inputs.len());
}

#[test]
fn runs_are_idempotent_without_postprocessing() {
    let dir = TempDir::new().unwrap();
    let (inputs, outputs) = make_pairs(dir.path(), 3, 10, 10);
    let shape = ShapeKey {
        height: 10,
        width: 10,
        channels: 3,
    };

    let model = MockStyleModel::Identity;
    let runner = BatchRunner::new(&model, NO_POST);
    runner
        .run(shape, &inputs, &outputs, 2, &ProgressBar::hidden())
        .unwrap();
    let first: Vec<Vec<u8>> = outputs.iter().map(|p| std::fs::read(p).unwrap()).collect();

    runner
        .run(shape, &inputs, &outputs, 2, &ProgressBar::hidden())
        .unwrap();
    let second: Vec<Vec<u8>> = outputs.iter().map(|p| std::fs::read(p).unwrap()).collect();

    assert_eq!(first, second);
}

#[test]
fn masking_zeroes_background_pixels() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");

    // One bright pixel; everything else sits below 1% of the maximum.
    let mut image = RgbImage::from_pixel(4, 4, Rgb([1, 1, 1]));
    image.put_pixel(0, 0, Rgb([255, 255, 255]));
    image.save(&input).unwrap();

    let shape = ShapeKey {
        height: 4,
        width: 4,
        channels: 3,
    };
    let model = MockStyleModel::Identity;
    BatchRunner::new(&model, PostProcessConfig::new(true, 0.0))
        .run(
            shape,
            &[input],
            std::slice::from_ref(&output),
            1,
            &ProgressBar::hidden(),
        )
        .unwrap();

    let result = quickpaint_rs::image_io::read_img(&output).unwrap();
    assert_eq!(result[[0, 0, 0]], 255.0);
    for ((y, x, c), &value) in result.indexed_iter() {
        if (y, x) != (0, 0) {
            assert_eq!(value, 0.0, "pixel ({y},{x},{c}) not masked");
        }
    }
}

#[test]
fn blending_is_multiplicative() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    RgbImage::from_pixel(3, 3, Rgb([10, 10, 10])).save(&input).unwrap();

    let shape = ShapeKey {
        height: 3,
        width: 3,
        channels: 3,
    };
    let model = MockStyleModel::Identity;
    BatchRunner::new(&model, PostProcessConfig::new(false, 0.5))
        .run(
            shape,
            &[input],
            std::slice::from_ref(&output),
            1,
            &ProgressBar::hidden(),
        )
        .unwrap();

    // 10 * 0.5 * 10 = 50 per value, not a point between input and prediction.
    let result = quickpaint_rs::image_io::read_img(&output).unwrap();
    assert!(result.iter().all(|&v| v == 50.0));
}

#[test]
fn oversized_predictions_are_cropped_when_masking() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    RgbImage::from_pixel(5, 4, Rgb([200, 200, 200])).save(&input).unwrap();

    let shape = ShapeKey {
        height: 4,
        width: 5,
        channels: 3,
    };
    let model = MockStyleModel::Grow(2);
    BatchRunner::new(&model, PostProcessConfig::new(true, 0.0))
        .run(
            shape,
            &[input],
            std::slice::from_ref(&output),
            1,
            &ProgressBar::hidden(),
        )
        .unwrap();

    let result = quickpaint_rs::image_io::read_img(&output).unwrap();
    assert_eq!(result.dim(), (4, 5, 3));
    assert!(result.iter().all(|&v| v == 200.0));
}

#[test]
fn accelerator_exhaustion_falls_back_to_cpu_once() {
    let dir = TempDir::new().unwrap();
    let (inputs, outputs) = make_pairs(dir.path(), 4, 8, 8);
    let shape = ShapeKey {
        height: 8,
        width: 8,
        channels: 3,
    };

    let loader = MockModelLoader::new(MockStyleModel::Identity).exhaust_on_accelerator();
    let gpu = ComputeDevice::Cuda { device_id: 0 };
    Evaluator::new(&loader, gpu, 2, NO_POST)
        .evaluate(
            Path::new("style.onnx"),
            shape,
            &inputs,
            &outputs,
            &ProgressBar::hidden(),
        )
        .unwrap();

    assert_eq!(loader.attempts(), vec![gpu, ComputeDevice::Cpu]);
    let fallback_bytes: Vec<Vec<u8>> =
        outputs.iter().map(|p| std::fs::read(p).unwrap()).collect();

    // A direct CPU run must produce identical outputs.
    let direct = MockModelLoader::new(MockStyleModel::Identity);
    let direct_outputs: Vec<PathBuf> = (0..inputs.len())
        .map(|i| dir.path().join(format!("direct{i}.png")))
        .collect();
    Evaluator::new(&direct, ComputeDevice::Cpu, 2, NO_POST)
        .evaluate(
            Path::new("style.onnx"),
            shape,
            &inputs,
            &direct_outputs,
            &ProgressBar::hidden(),
        )
        .unwrap();
    assert_eq!(direct.attempts(), vec![ComputeDevice::Cpu]);

    let direct_bytes: Vec<Vec<u8>> = direct_outputs
        .iter()
        .map(|p| std::fs::read(p).unwrap())
        .collect();
    assert_eq!(fallback_bytes, direct_bytes);
}

#[test]
fn cpu_exhaustion_is_fatal() {
    let dir = TempDir::new().unwrap();
    let (inputs, outputs) = make_pairs(dir.path(), 1, 4, 4);
    let shape = ShapeKey {
        height: 4,
        width: 4,
        channels: 3,
    };

    struct AlwaysExhausted;
    impl StyleModelLoader for AlwaysExhausted {
        type Model = MockStyleModel;

        fn load(
            &self,
            _checkpoint: &Path,
            _device: ComputeDevice,
        ) -> quickpaint_rs::Result<MockStyleModel> {
            Err(quickpaint_rs::QuickPaintError::ResourceExhausted {
                detail: "mock allocator refused every device".to_string(),
            })
        }
    }

    let err = Evaluator::new(&AlwaysExhausted, ComputeDevice::Cuda { device_id: 0 }, 1, NO_POST)
        .evaluate(
            Path::new("style.onnx"),
            shape,
            &inputs,
            &outputs,
            &ProgressBar::hidden(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        quickpaint_rs::QuickPaintError::ResourceExhausted { .. }
    ));
}
