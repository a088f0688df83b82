use anyhow::{Context, Result};
use clap::Parser;
use dcmjpg::cli::{Args, Command, ConvertArgs};
use dcmjpg::cleanup::TempCleaner;
use dcmjpg::convert::{convert_with_options, ConvertOptions};
use dcmjpg::dicom::{read_metadata, validate_dicom_file, MetadataRecord};
use dcmjpg::handler::{handle_request, health_check, HandlerConfig, Response};
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout only carries command output
fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .unwrap_or_else(|e| {
        eprintln!("[ERROR] Could not set up global logging subscriber: {e}");
    });
}

fn run(args: &Args) -> Result<ExitCode> {
    let config = args.handler_config();

    match &args.command {
        Command::Convert(convert) => run_convert(convert)?,
        Command::Metadata { file, text } => {
            let record = read_metadata(file);
            if *text {
                dcmjpg::print_metadata(&record);
            } else {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
            if matches!(record, MetadataRecord::Unreadable { .. }) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Validate { file } => {
            if validate_dicom_file(file) {
                println!("valid");
            } else {
                println!("invalid");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Handle { event } => {
            let response = run_handler(event.as_deref(), &config)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Health => println!("{}", serde_json::to_string_pretty(&health_check())?),
        Command::Cleanup { stats } => {
            let cleaner: TempCleaner = config.cleaner();
            if *stats {
                println!("{}", serde_json::to_string_pretty(&cleaner.usage_stats())?);
            } else {
                println!("{}", serde_json::to_string_pretty(&cleaner.cleanup_old_files())?);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => args
            .file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    let output_dir = if output_dir.as_os_str().is_empty() {
        Path::new(".").to_path_buf()
    } else {
        output_dir
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let options = ConvertOptions::new(args.quality).with_frame(args.frame);
    let output = convert_with_options(&args.file, &output_dir, options)?;
    println!("{}", output.display());

    Ok(())
}

fn run_handler(event: Option<&Path>, config: &HandlerConfig) -> Result<Response> {
    let raw = match event {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read event from stdin")?;
            raw
        }
    };
    let event: serde_json::Value =
        serde_json::from_str(&raw).context("Event is not valid JSON")?;

    Ok(handle_request(&event, config))
}
