use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use imgcomp::config::AppConfig;
use imgcomp::metadata::{self, Extracted};
use imgcomp::runner::{BatchOutcome, JobRunner, JobTemplate};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "imgcomp", version, about = "Compress JPEG photos while keeping their EXIF data")]
struct Cli {
    /// Extra configuration file, layered over config/ and IMGCOMP_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress one or more image files
    File {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        opts: CompressArgs,
    },
    /// Compress every JPEG in a folder
    Folder {
        folder: PathBuf,
        /// Descend into sub-directories
        #[arg(short, long)]
        recursive: bool,
        #[command(flatten)]
        opts: CompressArgs,
    },
    /// Print the EXIF tags of an image as JSON
    Inspect { path: PathBuf },
}

#[derive(Args, Debug)]
struct CompressArgs {
    /// JPEG quality, 1-95 (defaults to the configured value)
    #[arg(short, long)]
    quality: Option<u8>,
    /// Write `<name>_comp.<ext>` instead of keeping the original name
    #[arg(long)]
    rename: bool,
    /// Write output into this directory instead of next to the source
    #[arg(short, long)]
    dest: Option<PathBuf>,
    /// Allow replacing source files in place
    #[arg(long)]
    overwrite: bool,
    /// Print the batch outcome as JSON
    #[arg(long)]
    json: bool,
}

impl CompressArgs {
    fn template(&self, runner: &JobRunner) -> JobTemplate {
        let mut template = runner.template();
        if let Some(quality) = self.quality {
            template.quality = quality;
        }
        template.rename = self.rename;
        template.destination = self.dest.clone();
        template.allow_overwrite = self.overwrite;
        template
    }
}

fn report(outcome: &BatchOutcome, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!(
            "{} attempted, {} succeeded, {} failed",
            outcome.attempted(),
            outcome.succeeded(),
            outcome.failed()
        );
        for (source, failure) in outcome.failures() {
            println!("  {} ({:?}): {}", source.display(), failure.kind, failure.detail);
        }
        for failure in &outcome.log_failures {
            println!("  log not updated for {}: {}", failure.output.display(), failure.detail);
        }
        if outcome.cancelled {
            println!("cancelled, {} file(s) not processed", outcome.skipped.len());
        }
    }

    if outcome.failed() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    config.validate()?;

    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting imgcomp");
    let runner = JobRunner::new(&config);
    info!("Audit log: {:?}", runner.audit_log().path());

    let code = match cli.command {
        Command::File { paths, opts } => {
            let template = opts.template(&runner);
            let requests = paths.into_iter().map(|p| template.request_for(p)).collect();
            report(&runner.run_many(requests)?, opts.json)?
        }
        Command::Folder {
            folder,
            recursive,
            opts,
        } => {
            let template = opts.template(&runner);
            report(&runner.run_folder(&folder, recursive, &template)?, opts.json)?
        }
        Command::Inspect { path } => match metadata::extract(&path) {
            Extracted::Available(metadata) => {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
                ExitCode::SUCCESS
            }
            Extracted::NotAvailable => {
                println!("No metadata available for {}", path.display());
                ExitCode::SUCCESS
            }
        },
    };

    info!("imgcomp finished");
    Ok(code)
}
