use clap::Parser;
use smd2mid::tables::{file, ConversionTables};
use smd2mid::Converter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "smd2mid")]
#[command(version = "0.1.0")]
#[command(about = "Convert DSE sequences (.smd) to Standard MIDI Files", long_about = None)]
struct Args {
    /// Input DSE sequences
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output MIDI file (single input only; default replaces the extension with .mid)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 128-byte DSE program to MIDI program map
    #[arg(long, default_value = file::PROGRAM_MAP)]
    program_map: PathBuf,

    /// 128-byte drum key map used by program 127
    #[arg(long, default_value = file::DRUM_MAP)]
    drum_map: PathBuf,

    /// 128-byte signed per-program transpose table
    #[arg(long, default_value = file::TRANSPOSE)]
    transpose: PathBuf,

    /// Log decoding details
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.output.is_some() && args.inputs.len() > 1 {
        tracing::error!("--output can only be used with a single input");
        return ExitCode::FAILURE;
    }

    let tables = match ConversionTables::load(
        Some(args.program_map.as_path()),
        Some(args.drum_map.as_path()),
        Some(args.transpose.as_path()),
    ) {
        Ok(tables) => tables,
        Err(e) => {
            tracing::error!("failed to load side tables: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let converter = Converter::with_tables(tables);

    let mut failed = 0;
    for input in &args.inputs {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output(input));

        tracing::info!("Loading Sequence: {}", input.display());
        match converter.convert_file(input, &output) {
            Ok(loaded) => {
                for warning in &loaded.warnings {
                    tracing::warn!("{}: {}", input.display(), warning);
                }
            }
            Err(e) => {
                tracing::error!("{}: {}", input.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("mid")
}
