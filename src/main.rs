use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use identimetrics_downloader::client::HttpTransport;
use identimetrics_downloader::config::{self, Resolution, SystemEditor};
use identimetrics_downloader::pipeline::RunReport;
use identimetrics_downloader::{DownloaderError, Result, logging, pipeline};
use tracing::info;

/// Overrides the directory searched for `config.yml` and friends.
const CONFIG_DIR_ENV: &str = "IDENTIMETRICS_CONFIG_DIR";

/// Exit status when the run finished but logged recoverable errors.
const EXIT_COMPLETED_WITH_ERRORS: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    logging::init(logging::DEFAULT_LEVEL)?;
    info!("Identimetrics downloader");

    let config_dir = config_dir()?;
    let settings = match config::resolve(&config_dir, &SystemEditor)? {
        Resolution::Ready { settings, path } => {
            info!(path = %path.display(), "configuration loaded");
            settings
        }
        Resolution::Bootstrapped(path) => {
            info!(
                path = %path.display(),
                "edit the new configuration file and run the downloader again"
            );
            return Ok(ExitCode::SUCCESS);
        }
    };

    let transport = HttpTransport::new(settings.request_timeout)?;
    let report = pipeline::run(&settings, &transport, &cli.export_dir);

    Ok(exit_code(&report))
}

/// Entries were already logged as they were recorded; only the count is
/// repeated here.
fn exit_code(report: &RunReport) -> ExitCode {
    if report.errors.is_empty() {
        return ExitCode::SUCCESS;
    }
    eprintln!("completed with {} error(s)", report.errors.len());
    ExitCode::from(EXIT_COMPLETED_WITH_ERRORS)
}

fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(PathBuf::from)
        .ok_or_else(|| DownloaderError::MissingConfig(exe.clone()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Export PowerSchool students and staff as Identimetrics CSV files."
)]
struct Cli {
    /// Directory that receives students.csv and staff.csv.
    export_dir: PathBuf,
}
