use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish a bundle and its packages to an OCI registry
    Publish {
        /// Path to the bundle file
        #[arg(value_name = "BUNDLE_FILE")]
        bundle: PathBuf,

        /// Registry location to publish under (e.g. ghcr.io/example/bundles)
        #[arg(value_name = "DESTINATION", env = "STOWAGE_REPO")]
        destination: Option<String>,

        /// Detached signature of the bundle file
        #[arg(long, value_name = "FILE")]
        signature: Option<PathBuf>,

        /// Talk to the registry over plain HTTP
        #[arg(long)]
        insecure: bool,
    },
    /// Print the index or manifest stored at a reference
    Inspect {
        /// Bundle reference (e.g. ghcr.io/example/bundles/core:0.1.0)
        #[arg(value_name = "REFERENCE")]
        reference: String,

        /// Talk to the registry over plain HTTP
        #[arg(long)]
        insecure: bool,
    },
    /// Download a published bundle's manifest, metadata and signature
    Pull {
        /// Bundle reference (e.g. ghcr.io/example/bundles/core:0.1.0)
        #[arg(value_name = "REFERENCE")]
        reference: String,

        /// Architecture to pull (defaults to the host's)
        #[arg(long)]
        arch: Option<String>,

        /// Directory to write into
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Talk to the registry over plain HTTP
        #[arg(long)]
        insecure: bool,
    },
    /// Show version information
    Version,
}
