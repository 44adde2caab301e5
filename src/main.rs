use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use runscan::config::{Cli, ScanConfig};
use runscan::scan::{write_run_list, Scanner};

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = ScanConfig::try_from(cli).context("invalid arguments")?;
    let scanner = Scanner::new(config);

    let stdout = std::io::stdout();
    let summary = scanner.run(&mut stdout.lock())?;

    let output = &scanner.config().output;
    write_run_list(output, &summary.selected)?;
    info!(
        "wrote {} run numbers to {}",
        summary.selected.len(),
        output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
