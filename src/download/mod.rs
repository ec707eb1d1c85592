//! HTTP download engine for streaming model files to disk.
//!
//! This module provides the transfer half of the system: redirect
//! resolution, streamed writes with progress accounting, whole-attempt retry
//! with partial-file cleanup, and post-transfer size verification.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for multi-gigabyte files)
//! - Manual redirect resolution (up to 5 hops) so the CDN URL is known
//! - Fixed-delay retry (3 attempts, 2 s apart by default)
//! - Cancellation through [`tokio_util::sync::CancellationToken`]
//! - `HTTPS_PROXY` / `https_proxy` routing
//!
//! # Example
//!
//! ```no_run
//! use comfyfetch_core::download::{DownloadEngine, DownloadProgress};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::with_defaults();
//! let on_progress = |p: &DownloadProgress| println!("{:.0}% at {}", p.percentage, p.speed_label());
//! let report = engine
//!     .download(
//!         "https://huggingface.co/org/model/resolve/main/model.safetensors",
//!         Path::new("./models/checkpoints/model.safetensors"),
//!         Some(&on_progress),
//!     )
//!     .await?;
//! println!("Downloaded: {}", report.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod progress;
mod retry;

pub(crate) use client::apply_env_proxy;
pub use client::HttpClient;
pub use engine::{DownloadEngine, DownloadReport, EngineConfig};
pub use error::DownloadError;
pub use progress::{DownloadProgress, ProgressCallback};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
