//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DemoConfig;
use crate::error::{FogError, Result};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Froxel volumetric fog demo with GPU range reports")]
pub struct Cli {
    /// JSON config file; missing fields take their defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the default config to this path and exit.
    #[arg(long, value_name = "PATH")]
    pub write_default_config: Option<PathBuf>,

    /// Root directory for performance reports.
    #[arg(long, default_value = "reports")]
    pub report_dir: PathBuf,

    /// Run the configuration sweep at start-up and exit when it finishes.
    #[arg(long, default_value_t = false)]
    pub sweep: bool,

    /// Frames sampled per report.
    #[arg(long)]
    pub sample_frames: Option<u32>,

    /// Write the scattering LUTs as PNGs into this directory and exit.
    #[arg(long, value_name = "DIR")]
    pub export_luts: Option<PathBuf>,

    /// Log filter, overridden by `RUST_LOG`.
    #[arg(long, default_value = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn")]
    pub log: String,
}

impl Cli {
    /// The config file named by `--config` (or the defaults) with command
    /// line overrides applied.
    pub fn resolve_config(&self) -> Result<DemoConfig> {
        let mut config = match &self.config {
            Some(path) => DemoConfig::load(path)?,
            None => DemoConfig::default(),
        };
        if let Some(frames) = self.sample_frames {
            config.perf.sample_frames = frames;
        }
        config
            .perf
            .validate()
            .map_err(FogError::InvalidConfig)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let cli = Cli::try_parse_from(["wronski-fog"]).unwrap();
        assert_eq!(cli.report_dir, PathBuf::from("reports"));
        assert!(!cli.sweep);
        assert!(cli.config.is_none());
        assert!(cli.export_luts.is_none());
    }

    #[test]
    fn sample_frames_override_the_config() {
        let cli = Cli::try_parse_from(["wronski-fog", "--sweep", "--sample-frames", "5"]).unwrap();
        assert!(cli.sweep);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.perf.sample_frames, 5);
    }

    #[test]
    fn zero_sample_frames_is_rejected() {
        let cli = Cli::try_parse_from(["wronski-fog", "--sample-frames", "0"]).unwrap();
        assert!(matches!(cli.resolve_config(), Err(FogError::InvalidConfig(_))));
    }

    #[test]
    fn export_luts_takes_a_directory() {
        let cli = Cli::try_parse_from(["wronski-fog", "--export-luts", "out"]).unwrap();
        assert_eq!(cli.export_luts, Some(PathBuf::from("out")));
    }
}
