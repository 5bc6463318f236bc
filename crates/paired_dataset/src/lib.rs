//! Paired frame dataset for domain-randomized image-to-image training.
//!
//! This crate provides utilities for:
//! - Indexing canonical, randomized, segmentation and depth renderings
//! - Resolving `(seed, frame)` keys from canonical filenames
//! - Loading per-seed privileged-information arrays
//! - Image preprocessing/augmentation pipelines
//! - Burn-compatible batch collation (feature `burn-runtime`)

// Module declarations
pub mod aug;
pub mod config;
pub mod index;
pub mod key;
pub mod listing;
pub mod privileged;
pub mod types;

#[cfg(feature = "burn-runtime")]
pub mod batch;

// Re-export public API
pub use aug::{Preprocess, TransformConfig, TransformPipeline, TransformPipelineBuilder};
pub use config::DatasetOptions;
pub use index::PairedFrameIndex;
pub use key::FrameKey;
pub use listing::{list_files_with_extension, list_images_descending};
pub use privileged::PrivilegedInfoStore;
pub use types::*;

#[cfg(feature = "burn-runtime")]
pub use batch::{collate, PairedBatch};
