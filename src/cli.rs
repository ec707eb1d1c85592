//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Download Hugging Face models into a ComfyUI models directory.
///
/// The model type (checkpoint, LoRA, VAE, ...) is inferred from hub metadata
/// and the file itself, and decides which `models/` subdirectory the file
/// lands in.
#[derive(Parser, Debug)]
#[command(name = "comfyfetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Maximum download attempts, including the first (1-20)
    #[arg(short = 'r', long, global = true, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve, classify and download a model
    Download(DownloadArgs),
    /// Resolve and classify a model without downloading
    Inspect(InspectArgs),
    /// List models installed in a models directory
    List(ListArgs),
}

/// Arguments for `download`.
#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// Hub model id, e.g. `stabilityai/sdxl-vae`
    pub model_id: String,

    /// Exact file in the repository (picked automatically if omitted)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Models directory to download into
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// ComfyUI installation whose `models/` directory is used
    #[arg(long)]
    pub comfyui_path: Option<PathBuf>,

    /// Do not search for a ComfyUI installation
    #[arg(long)]
    pub no_auto_detect: bool,

    /// Replace an existing file
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for `inspect`.
#[derive(clap::Args, Debug)]
pub struct InspectArgs {
    /// Hub model id
    pub model_id: String,

    /// Exact file in the repository (picked automatically if omitted)
    #[arg(short, long)]
    pub file: Option<String>,
}

/// Arguments for `list`.
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Models directory to scan
    #[arg(short, long)]
    pub models_dir: Option<PathBuf>,

    /// ComfyUI installation whose `models/` directory is scanned
    #[arg(long)]
    pub comfyui_path: Option<PathBuf>,

    /// Only scan one type, e.g. `lora` or `checkpoints`
    #[arg(short = 't', long = "type")]
    pub model_type: Option<String>,
}
