use std::fs;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quickpaint_rs::{Config, StylePipeline};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    ensure!(
        config.input.exists(),
        "Input path {} does not exist",
        config.input.display()
    );

    // An extensionless output path is a directory by convention.
    if config.output.extension().is_none() && !config.output.exists() {
        println!("creating output dir");
        fs::create_dir_all(&config.output)
            .with_context(|| format!("Failed to create output dir {}", config.output.display()))?;
    }

    let start = Instant::now();
    StylePipeline::with_onnx_models(config).run()?;
    println!(
        "\n Painting done in {:.3} seconds ... Have a good day!\n",
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
