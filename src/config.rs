use std::path::PathBuf;

use clap::Parser;

use crate::device::ComputeDevice;

/// Reserved model name that expands to every checkpoint named by a style
/// reference image.
pub const ALL_MODELS: &str = "all";

/// File extension of trained checkpoint bundles.
pub const MODEL_EXTENSION: &str = "onnx";

#[derive(Parser, Clone, Debug)]
#[command(
    version,
    about = "Paint (transfer style to) images using a pre-trained neural network model.",
    long_about = None
)]
pub struct Config {
    /// Model name to load, or `all` for every style under the styles directory
    #[arg(short, long)]
    pub model: String,

    /// File or directory to transform (content)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Destination (file or directory) of the stylized content
    #[arg(short, long)]
    pub output: PathBuf,

    /// Device to perform compute on
    #[arg(short, long, default_value = "cuda:0")]
    pub device: ComputeDevice,

    /// Number of images per feed-forward batch
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: u32,

    /// Create a binary mask from the input (at 1 percent of its maximum) and
    /// mask the output with it
    #[arg(long)]
    pub mask: bool,

    /// Multiply the original image into the output using this weighting factor
    #[arg(long, default_value_t = 0.0, value_parser = check_blend)]
    pub blend: f32,

    /// Directory of style reference images backing the `all` model set
    #[arg(long, default_value = "styles")]
    pub styles_dir: PathBuf,

    /// Directory of pre-trained checkpoints
    #[arg(long, default_value = "pre-trained_models")]
    pub models_dir: PathBuf,
}

impl Config {
    /// Post-processing settings, fixed for the whole run.
    pub const fn post(&self) -> PostProcessConfig {
        PostProcessConfig {
            mask: self.mask,
            blend: self.blend,
        }
    }
}

/// Immutable per-run post-processing settings, applied uniformly to every
/// image in the run.
#[derive(Debug, Clone, Copy)]
pub struct PostProcessConfig {
    pub mask: bool,
    pub blend: f32,
}

impl PostProcessConfig {
    pub const fn new(mask: bool, blend: f32) -> Self {
        Self { mask, blend }
    }
}

fn check_blend(s: &str) -> Result<f32, String> {
    let blend: f32 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a number"))?;
    if blend > 1.0 {
        return Err("blend needs to be a float equal or less than 1".to_string());
    }
    Ok(blend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        let base = ["quickpaint", "-m", "cubist", "-i", "in", "-o", "out"];
        Config::try_parse_from(base.iter().copied().chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.device, ComputeDevice::Cuda { device_id: 0 });
        assert_eq!(config.batch_size, 1);
        assert!(!config.mask);
        assert_eq!(config.blend, 0.0);
        assert_eq!(config.styles_dir, PathBuf::from("styles"));
        assert_eq!(config.models_dir, PathBuf::from("pre-trained_models"));
    }

    #[test]
    fn batch_size_zero_is_rejected() {
        assert!(parse(&["-b", "0"]).is_err());
        assert_eq!(parse(&["-b", "4"]).unwrap().batch_size, 4);
    }

    #[test]
    fn blend_above_one_is_rejected() {
        assert!(parse(&["--blend", "1.5"]).is_err());
        assert_eq!(parse(&["--blend", "0.5"]).unwrap().blend, 0.5);
        // Negative factors are allowed; only the upper bound is enforced.
        assert_eq!(parse(&["--blend", "-2"]).unwrap().blend, -2.0);
    }

    #[test]
    fn device_strings_are_parsed() {
        assert_eq!(
            parse(&["-d", "cpu"]).unwrap().device,
            ComputeDevice::Cpu
        );
        assert_eq!(
            parse(&["-d", "cuda:1"]).unwrap().device,
            ComputeDevice::Cuda { device_id: 1 }
        );
        assert!(parse(&["-d", "npu"]).is_err());
    }

    #[test]
    fn post_config_mirrors_flags() {
        let config = parse(&["--mask", "--blend", "0.25"]).unwrap();
        let post = config.post();
        assert!(post.mask);
        assert_eq!(post.blend, 0.25);
    }
}
