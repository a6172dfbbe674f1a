//! Command-line tool for comparing Word documents.
//!
//! Writes a copy of the target document in which every insertion, deletion
//! and change is highlighted.
//!
//! # Usage
//!
//! Basic comparison:
//! ```sh
//! cargo run --example compare -- source.docx target.docx -o result.docx
//! ```
//!
//! Password-protected inputs, encrypted result:
//! ```sh
//! cargo run --example compare -- source.docx target.docx -o result.docx \
//!     --source-password s3cret --target-password s3cret \
//!     --output-password out --encryption standard
//! ```
//!
//! Custom styles from a YAML file:
//! ```sh
//! cargo run --example compare -- source.docx target.docx -o result.docx \
//!     --config styles.yaml --no-summary
//! ```
//!
//! Set `RUST_LOG=litchi_compare=debug` for stage statistics.

use clap::{Parser, ValueEnum};
use litchi_compare::{CancellationToken, ComparisonOptions, Comparer, EncryptionScheme};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Compare two Word documents
#[derive(Parser, Debug)]
#[command(
    name = "compare",
    about = "Compare two Word documents and write a document with the differences highlighted",
    version
)]
struct Args {
    /// Original document
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Revised document
    #[arg(value_name = "TARGET")]
    target: PathBuf,

    /// Result document; its directory is created when missing
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// YAML file with comparison options
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Password of the source document
    #[arg(long)]
    source_password: Option<String>,

    /// Password of the target document
    #[arg(long)]
    target_password: Option<String>,

    /// Encrypt the result with this password
    #[arg(long)]
    output_password: Option<String>,

    /// Encryption scheme of the result
    #[arg(long, value_enum, default_value = "agile")]
    encryption: EncryptionArg,

    /// Do not prepend the summary page
    #[arg(long)]
    no_summary: bool,

    /// Abort after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Print every change instead of writing a result
    #[arg(long, conflicts_with = "output")]
    list: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Encryption scheme options for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum EncryptionArg {
    /// Agile encryption (AES-256, SHA-512)
    Agile,
    /// Standard 2007 encryption (AES-128, SHA-1)
    Standard,
}

impl From<EncryptionArg> for EncryptionScheme {
    fn from(arg: EncryptionArg) -> Self {
        match arg {
            EncryptionArg::Agile => EncryptionScheme::Agile,
            EncryptionArg::Standard => EncryptionScheme::Standard,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG overrides; --verbose => debug; else info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose {
            "litchi_compare=debug"
        } else {
            "litchi_compare=info"
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut options = match &args.config {
        Some(path) => ComparisonOptions::from_yaml_file(path)?,
        None => ComparisonOptions::default(),
    };
    if args.no_summary {
        options.generate_summary_page = false;
    }
    if let Some(password) = &args.source_password {
        options = options.with_source_password(password);
    }
    if let Some(password) = &args.target_password {
        options = options.with_target_password(password);
    }
    if let Some(password) = &args.output_password {
        options = options.with_output_password(password, args.encryption.into());
    }

    let cancel = match args.timeout {
        Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
        None => CancellationToken::new(),
    };
    let comparer = Comparer::new(options).with_cancel(cancel);

    if args.list {
        let result = comparer.compare_paths(&args.source, &args.target)?;
        for op in &result.operations {
            println!("{op}");
        }
        let s = result.summary;
        println!(
            "{} inserted, {} deleted, {} moved, {} changed",
            s.inserted, s.deleted, s.moved, s.changed
        );
        return Ok(());
    }

    let output = args.output.clone().unwrap_or_else(|| {
        let stem = args
            .target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "result".to_string());
        args.target.with_file_name(format!("{stem}_compared.docx"))
    });

    match comparer.compare(&args.source, &args.target, &output) {
        Ok(path) => {
            println!("✓ Result saved to: {}", path.display());
            Ok(())
        },
        Err(e) if e.is_password_error() => {
            eprintln!("Error: {e}");
            eprintln!("       Check --source-password / --target-password");
            std::process::exit(2);
        },
        Err(e) => Err(e.into()),
    }
}
