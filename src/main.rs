//! Command-line interface for nexson

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use nexson::{convert_document, detect, ConvertOptions, NexsonFormat};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "nexson")]
#[command(author, version, about = "NexSON phylogenetic study conversion tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a study document between encodings
    Convert {
        /// Path to the input document (NeXML or NexSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target format: nexml, badgerfish, nexson-1.0, nexson-1.2
        #[arg(short, long)]
        to: String,

        /// Source format (detected from the document when omitted)
        #[arg(short, long)]
        from: Option<String>,

        /// Keep source-format structures alongside the converted ones
        #[arg(long)]
        keep_old: bool,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report the encoding of a study document
    Detect {
        /// Path to the document to inspect
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            file,
            to,
            from,
            keep_old,
            output,
        } => cmd_convert(file, to, from, keep_old, output),
        Commands::Detect { file } => cmd_detect(file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn cmd_convert(
    file: PathBuf,
    to: String,
    from: Option<String>,
    keep_old: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let target: NexsonFormat = to.parse()?;
    let source = match from {
        Some(name) => Some(name.parse::<NexsonFormat>()?),
        None => None,
    };

    let text = fs::read_to_string(&file)?;
    let opts = ConvertOptions::new().with_remove_old_structures(!keep_old);
    let converted = convert_document(&text, source, target, &opts)?;

    match output {
        Some(path) => fs::write(path, converted)?,
        None => print!("{}", converted),
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_detect(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(&file)?;
    let format = if text.trim_start().starts_with('<') {
        NexsonFormat::Nexml
    } else {
        detect(&serde_json::from_str(&text)?)?
    };
    println!("{}", format);
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
