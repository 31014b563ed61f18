//! MIDI (or DSE sequence) to JSON dumper

use clap::Parser;
use smd2mid::midi::{SequenceJson, SmfReader};
use smd2mid::Converter;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mid2json")]
#[command(version = "0.1.0")]
#[command(about = "Dump MIDI files or DSE sequences as JSON", long_about = None)]
struct Args {
    /// Input MIDI file
    input: PathBuf,

    /// Treat the input as a DSE sequence and dump the converted events
    #[arg(long)]
    dse: bool,

    /// Output JSON file (writes to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output compact JSON (default is pretty-printed)
    #[arg(short, long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let data = std::fs::read(&args.input)?;

    let sequence = if args.dse {
        Converter::new().load_sequence(&data)?.sequence
    } else {
        SmfReader::new(&data).parse_sequence()?
    };

    let json = SequenceJson::new(&sequence);
    let json_string = if args.compact {
        serde_json::to_string(&json)?
    } else {
        serde_json::to_string_pretty(&json)?
    };

    match args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(json_string.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => {
            println!("{}", json_string);
        }
    }

    Ok(())
}
