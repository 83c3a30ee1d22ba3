use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use imgnorm::convert::normalize;
use imgnorm::logging::{init_logging, LogConfig};
use imgnorm::PROGRAM_BANNER;

const USAGE: &str = "usage: imgnorm <in-file> <out-file>";

#[derive(Parser)]
#[command(name = "imgnorm", about = "Image attachment normalizer", long_about = None)]
struct Cli {
    /// Input image file (JPEG, PNG or HEIC).
    #[arg(value_name = "IN_FILE")]
    input: Option<PathBuf>,

    /// Output JPEG file, created if absent.
    #[arg(value_name = "OUT_FILE")]
    output: Option<PathBuf>,

    /// Show version info.
    #[arg(short = 'v', long = "version")]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    // Callers may invoke with bad arguments just to test for runability, so
    // any argument mismatch prints usage and exits 0.
    let cli = Cli::try_parse().unwrap_or_else(|err| {
        if err.kind() == clap::error::ErrorKind::DisplayHelp {
            let _ = err.print();
        } else {
            eprintln!("{USAGE}");
        }
        std::process::exit(0);
    });

    if cli.version {
        eprintln!("{PROGRAM_BANNER}");
    }

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        eprintln!("{USAGE}");
        return Ok(());
    };

    let _ = init_logging("imgnorm", LogConfig::default());

    // Input must be opened before the output is touched: a missing input
    // terminates without creating or modifying the output path.
    let mut reader = match File::open(&input) {
        Ok(file) => file,
        Err(e) => {
            error!(file = %input.display(), error = %e, "Failed to open input file");
            std::process::exit(1);
        }
    };

    let output_file = match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&output)
    {
        Ok(file) => file,
        Err(e) => {
            // Nothing further to attempt; exit cleanly with no output.
            error!(file = %output.display(), error = %e, "Failed to create output file");
            return Ok(());
        }
    };

    let display_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let mut writer = BufWriter::new(output_file);
    match normalize(&mut reader, &display_name, &mut writer).and_then(|outcome| {
        writer.flush()?;
        Ok(outcome)
    }) {
        Ok(_) => {
            info!(input = %input.display(), output = %output.display(), "conversion complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to produce JPEG output");
            std::process::exit(1);
        }
    }
}
