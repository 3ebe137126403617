//! emx-dfb CLI
//!
//! Create, extract and list DFB V1 documents (similar to tar command).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emx_dfb::fs::{collect_directory, collect_file, extract_entries};
use emx_dfb::{Archive, Decoded, Decoder, Encoder, EncoderConfig};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emx-dfb")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "DFB V1 archive format tool")]
struct Cli {
    /// Verbose output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a DFB document from files/directories
    Create {
        /// Files and directories to pack
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output document (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Record SIZE metadata for each file
        #[arg(long)]
        size: bool,

        /// Record a MIME hint guessed from the file extension
        #[arg(long)]
        mime: bool,

        /// Wrap base64 payloads at this many characters
        #[arg(long, value_name = "WIDTH")]
        wrap: Option<usize>,
    },

    /// Extract a DFB document
    #[command(name = "x")]
    Extract {
        /// Document to extract (default: stdin)
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Directory to extract to (default: current directory)
        #[arg(short = 'C', long, default_value = ".")]
        directory: PathBuf,
    },

    /// List contents of a DFB document
    #[command(name = "t")]
    List {
        /// Document to list (default: stdin)
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,

        /// Show encoding and size
        #[arg(short, long)]
        long: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Create { inputs, output, size, mime, wrap } => {
            let config = EncoderConfig::default()
                .with_size(size)
                .with_mime(mime)
                .with_base64_wrap(wrap);
            create_archive(inputs, output, config)?;
        }
        Commands::Extract { input, directory } => {
            extract_archive(input, directory)?;
        }
        Commands::List { input, long } => {
            list_archive(input, long)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn create_archive(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    config: EncoderConfig,
) -> Result<()> {
    let mut archive = Archive::new();
    let mut skipped = 0;

    for input in &inputs {
        if input.is_dir() {
            let collected = collect_directory(input)?;
            skipped += collected.skipped.len();
            for skip in &collected.skipped {
                eprintln!("Skipped: {} ({:#})", skip.path.display(), skip.error);
            }
            archive.entries.extend(collected.archive.entries);
        } else {
            let entry = collect_file(input)?;
            info!(file = %entry.path, bytes = entry.content.len(), "added");
            archive.add_entry(entry);
        }
    }

    let encoder = Encoder::new().with_config(config);
    let document = encoder.encode(&archive)?;

    if let Some(output_path) = output {
        fs::write(&output_path, &document)
            .with_context(|| format!("Failed to write: {}", output_path.display()))?;
        info!(path = %output_path.display(), files = archive.len(), skipped, "created");
    } else {
        print!("{}", document);
    }

    Ok(())
}

fn read_document(input: Option<PathBuf>) -> Result<Decoded> {
    let decoder = Decoder::new();
    match input {
        Some(input_path) => {
            let text = fs::read_to_string(&input_path)
                .with_context(|| format!("Failed to read: {}", input_path.display()))?;
            Ok(decoder.decode(&text)?)
        }
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(decoder.decode(&buffer)?)
        }
    }
}

fn report_entry_errors(decoded: &Decoded) {
    for err in &decoded.errors {
        eprintln!("Skipped: {}", err);
    }
}

fn extract_archive(input: Option<PathBuf>, directory: PathBuf) -> Result<()> {
    let decoded = read_document(input)?;
    report_entry_errors(&decoded);

    let report = extract_entries(decoded.entries(), &directory)?;
    for failure in &report.failed {
        eprintln!("Failed: {} ({:#})", failure.path, failure.error);
    }

    let failed = decoded.errors.len() + report.failed.len();
    eprintln!(
        "Extracted {} files to {} ({} failed)",
        report.written.len(),
        directory.display(),
        failed
    );

    if failed > 0 {
        anyhow::bail!("{} entries could not be extracted", failed);
    }
    Ok(())
}

fn list_archive(input: Option<PathBuf>, long: bool) -> Result<()> {
    let decoded = read_document(input)?;
    report_entry_errors(&decoded);

    for entry in decoded.entries() {
        if long {
            println!("{}  {}  {}", entry.path, entry.encoding, entry.content.len());
        } else {
            println!("{}", entry.path);
        }
    }

    Ok(())
}
