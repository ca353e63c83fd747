use clap::Parser;
use tracing::{error, info};

use wronski_fog::{AppOptions, Cli, DemoConfig, Result, init_logging, lut};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log);

    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.write_default_config {
        DemoConfig::default().save(path)?;
        info!(path = %path.display(), "wrote default config");
        return Ok(());
    }

    let config = cli.resolve_config()?;

    if let Some(dir) = &cli.export_luts {
        for path in lut::export_png(dir, &config.lut, config.fog.phase_g)? {
            info!(path = %path.display(), "exported LUT");
        }
        return Ok(());
    }

    wronski_fog::run(AppOptions {
        config,
        config_path: cli.config,
        report_dir: cli.report_dir,
        sweep: cli.sweep,
    })
}
