//! Hugging Face Hub access: model metadata and file resolution.
//!
//! [`HubClient::resolve_and_classify`] is the usual entry point: it fetches
//! the model document, picks the file to download and runs the classifier
//! over the gathered evidence.
//!
//! # Example
//!
//! ```no_run
//! use comfyfetch_core::hub::HubClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = HubClient::default();
//! let resolved = hub
//!     .resolve_and_classify("runwayml/stable-diffusion-v1-5", None)
//!     .await?;
//! println!("{} -> {}", resolved.descriptor.name, resolved.model_type);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod metadata;
mod resolve;

pub use client::{
    DEFAULT_HUB_ENDPOINT, DEFAULT_REVISION, HubClient, HubConfig, ResolvedModel, validate_model_id,
};
pub use error::ResolveError;
pub use metadata::{ModelMetadata, SiblingFile};
pub use resolve::{FileLocation, RemoteFileDescriptor, describe, select_file};
