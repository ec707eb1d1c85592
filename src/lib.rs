//! comfyfetch core library
//!
//! Downloads model weights from the Hugging Face Hub, works out what kind of
//! model each file is, and files it into the matching ComfyUI `models/`
//! subdirectory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`hub`] - Hub metadata client and file resolver
//! - [`classify`] - Evidence collection and the model-type classifier cascade
//! - [`download`] - Streaming download engine with retry and verification
//! - [`layout`] - Type-to-directory mapping, ComfyUI detection, installed models
//! - [`orchestrator`] - Resolve, classify and download in one call

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod download;
mod error;
pub mod hub;
pub mod layout;
pub mod orchestrator;
mod user_agent;

// Re-export commonly used types
pub use classify::{ClassificationEvidence, ModelType, Tier, classify, classify_with_tier};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadEngine, DownloadError, DownloadProgress, DownloadReport,
    EngineConfig, HttpClient, RetryPolicy,
};
pub use error::Error;
pub use hub::{HubClient, HubConfig, RemoteFileDescriptor, ResolveError, ResolvedModel};
pub use layout::{Installation, LayoutError, directory_for_label, model_directory};
pub use orchestrator::{FetchOutcome, FetchRequest, ModelFetcher};

// Re-exported so callers can cancel transfers without a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
