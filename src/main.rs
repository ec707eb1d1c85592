//! CLI entry point for comfyfetch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use comfyfetch_core::download::constants::DEFAULT_RETRY_DELAY;
use comfyfetch_core::hub::DEFAULT_HUB_ENDPOINT;
use comfyfetch_core::layout::{ScanStatus, detect, detect_installation, scan_inventory};
use comfyfetch_core::{
    CancellationToken, DEFAULT_MAX_RETRIES, DownloadEngine, DownloadProgress, EngineConfig,
    FetchOutcome, FetchRequest, HttpClient, HubClient, HubConfig, ModelFetcher, ResolvedModel,
    RetryPolicy,
};
use indicatif::HumanBytes;
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress_ui;

use app_config::FileConfig;
use cli::{Cli, Command, DownloadArgs, InspectArgs, ListArgs};
use progress_ui::TransferBar;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    let file_config = app_config::load_default_file_config()?;
    debug!(?file_config, "configuration loaded");

    match cli.command {
        Command::Download(ref args) => run_download(&cli, args, &file_config).await,
        Command::Inspect(ref args) => run_inspect(args, &file_config).await,
        Command::List(ref args) => run_list(args, &file_config).await,
    }
}

async fn run_download(cli: &Cli, args: &DownloadArgs, config: &FileConfig) -> Result<()> {
    let models_dir = resolve_models_dir(
        args.output_dir.as_deref(),
        args.comfyui_path.as_deref(),
        config,
        !args.no_auto_detect,
    )?;
    info!(models_dir = %models_dir.display(), "using models directory");

    let fetcher = ModelFetcher::new(build_hub_client(config), build_engine(cli, config));
    let request = FetchRequest {
        model_id: args.model_id.clone(),
        filename: args.file.clone(),
        models_dir,
        overwrite: args.overwrite,
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling download");
            signal_token.cancel();
        }
    });

    let bar = TransferBar::new(&args.model_id, cli.quiet);
    let on_progress = |progress: &DownloadProgress| bar.update(progress);
    let result = fetcher
        .fetch_model(&request, Some(&on_progress), Some(&cancel))
        .await;
    bar.finish();

    let outcome = result.with_context(|| format!("Failed to fetch '{}'", args.model_id))?;
    match &outcome {
        FetchOutcome::Downloaded {
            path,
            resolved,
            report,
        } => {
            if report.size_mismatch {
                warn!(
                    written = report.bytes_written,
                    declared = ?report.declared_size,
                    "downloaded size differs from the declared size"
                );
            }
            println!(
                "Downloaded {} ({}) as {} to {} in {} attempt(s)",
                resolved.descriptor.name,
                HumanBytes(report.bytes_written),
                resolved.model_type,
                path.display(),
                report.attempts
            );
        }
        FetchOutcome::AlreadyExists { path, resolved } => {
            println!(
                "{} already exists at {} (use --overwrite to replace it)",
                resolved.descriptor.name,
                path.display()
            );
        }
    }
    Ok(())
}

async fn run_inspect(args: &InspectArgs, config: &FileConfig) -> Result<()> {
    let hub = build_hub_client(config);
    let resolved = hub
        .resolve_and_classify(&args.model_id, args.file.as_deref())
        .await
        .with_context(|| format!("Failed to resolve '{}'", args.model_id))?;
    print!("{}", describe_resolution(&args.model_id, &resolved));
    Ok(())
}

async fn run_list(args: &ListArgs, config: &FileConfig) -> Result<()> {
    let models_dir = resolve_models_dir(
        args.models_dir.as_deref(),
        args.comfyui_path.as_deref(),
        config,
        true,
    )?;
    let inventory = scan_inventory(&models_dir, args.model_type.as_deref()).await?;

    println!("Models in {}", inventory.models_dir.display());
    for scan in &inventory.scans {
        match &scan.status {
            ScanStatus::Missing => println!("  {}/ (missing)", scan.directory),
            ScanStatus::Failed(reason) => {
                println!("  {}/ (unreadable: {reason})", scan.directory);
            }
            ScanStatus::Scanned => {
                println!("  {}/ ({} files)", scan.directory, scan.files.len());
                for file in &scan.files {
                    println!("    {file}");
                }
            }
        }
    }
    println!("Total: {} model files", inventory.total_files());
    Ok(())
}

fn describe_resolution(model_id: &str, resolved: &ResolvedModel) -> String {
    let mut out = format!(
        "Model:     {model_id}\nFile:      {}\nSize:      {}\nType:      {} (decided by {:?} tier)\nDirectory: {}\nURL:       {}\n",
        resolved.descriptor.name,
        if resolved.descriptor.byte_size == 0 {
            "unknown".to_string()
        } else {
            HumanBytes(resolved.descriptor.byte_size).to_string()
        },
        resolved.model_type,
        resolved.tier,
        resolved.model_type.directory_name(),
        resolved.descriptor.download_url,
    );
    if let Some(description) = resolved.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("About:     {description}\n"));
    }
    out
}

/// Picks the `models/` root: explicit directory, explicit ComfyUI path,
/// configured directory, then installation detection.
fn resolve_models_dir(
    explicit_dir: Option<&Path>,
    comfyui_path: Option<&Path>,
    config: &FileConfig,
    auto_detect: bool,
) -> Result<PathBuf> {
    if let Some(dir) = explicit_dir {
        return Ok(dir.to_path_buf());
    }

    if let Some(path) = comfyui_path {
        if auto_detect {
            if let Some(found) = detect_installation(Some(path)) {
                return Ok(found.models_dir);
            }
        } else if detect::inspect_path(path).is_some() {
            return Ok(path.join("models"));
        }
        bail!("'{}' is not a ComfyUI installation", path.display());
    }

    if let Some(dir) = &config.models_dir {
        return Ok(dir.clone());
    }

    if auto_detect
        && let Some(found) = detect_installation(config.comfyui_path.as_deref())
    {
        return Ok(found.models_dir);
    }

    bail!(
        "No models directory: pass --output-dir or --comfyui-path, set `models_dir` in the config file, or run next to a ComfyUI installation"
    )
}

fn build_engine(cli: &Cli, config: &FileConfig) -> DownloadEngine {
    let max_attempts = cli
        .max_retries
        .or(config.max_attempts)
        .unwrap_or(DEFAULT_MAX_RETRIES);
    let delay = config
        .retry_delay_ms
        .map_or(DEFAULT_RETRY_DELAY, Duration::from_millis);

    let defaults = EngineConfig::default();
    let engine_config = EngineConfig {
        retry_policy: RetryPolicy::new(max_attempts, delay),
        size_tolerance_bytes: config
            .size_tolerance_bytes
            .unwrap_or(defaults.size_tolerance_bytes),
        progress_step_percent: config
            .progress_step_percent
            .unwrap_or(defaults.progress_step_percent),
    };

    let client = match (config.connect_timeout_secs, config.read_timeout_secs) {
        (None, None) => HttpClient::new(),
        (connect, read) => HttpClient::with_timeouts(
            connect.unwrap_or(comfyfetch_core::download::constants::CONNECT_TIMEOUT_SECS),
            read.unwrap_or(comfyfetch_core::download::constants::READ_TIMEOUT_SECS),
        ),
    };
    DownloadEngine::new(client, engine_config)
}

fn build_hub_client(config: &FileConfig) -> HubClient {
    let mut hub_config = HubConfig::with_endpoint(
        config
            .hub_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_HUB_ENDPOINT.to_string()),
    );
    if let Some(revision) = &config.revision {
        hub_config.revision.clone_from(revision);
    }
    if let Some(secs) = config.connect_timeout_secs {
        hub_config.connect_timeout = Duration::from_secs(secs);
    }
    HubClient::new(hub_config)
}
