//! Core types, error definitions, and data structures for paired_dataset.

use crate::key::FrameKey;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, PairedDatasetError>;

#[derive(Debug, Error)]
pub enum PairedDatasetError {
    #[error("invalid dataset configuration at {path}: {msg}")]
    Config { path: PathBuf, msg: String },
    #[error("config parse error at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse frame key from {path}: {msg}")]
    KeyParse { path: PathBuf, msg: String },
    #[error("privileged info for seed {seed} not found at {path}")]
    PrivilegedInfoMissing { seed: u64, path: PathBuf },
    #[error("frame {frame_index} out of range for {path} ({len} frames)")]
    FrameOutOfRange {
        path: PathBuf,
        frame_index: usize,
        len: usize,
    },
    #[error("npy read error at {path}: {source}")]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },
    #[error("privileged info at {path} must be 1-D or 2-D, found {ndim}-D")]
    PrivilegedInfoShape { path: PathBuf, ndim: usize },
    #[error("image file missing: {path}")]
    MissingImageFile { path: PathBuf },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("transform failed for {path}: {msg}")]
    Transform { path: PathBuf, msg: String },
    #[error("no images indexed under {dir}")]
    EmptyCollection { dir: PathBuf },
    #[error("{0}")]
    Other(String),
}

/// One of the four image collections a [`crate::PairedFrameIndex`] lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Canonical,
    Random,
    Segmentation,
    Depth,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Canonical,
        Modality::Random,
        Modality::Segmentation,
        Modality::Depth,
    ];

    /// Directory suffix appended to the phase name (`train` + `random`).
    pub fn dir_suffix(&self) -> &'static str {
        match self {
            Modality::Canonical => "canonical",
            Modality::Random => "random",
            Modality::Segmentation => "segmentation",
            Modality::Depth => "depth",
        }
    }

    /// Segmentation and depth maps are decoded as single channel.
    pub fn is_grayscale(&self) -> bool {
        matches!(self, Modality::Segmentation | Modality::Depth)
    }
}

/// Transformed image in CHW layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    pub channels: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageTensor {
    pub fn shape(&self) -> [usize; 3] {
        [
            self.channels as usize,
            self.height as usize,
            self.width as usize,
        ]
    }
}

/// Paths derived for one canonical frame. Sibling paths follow the naming
/// convention and are not checked for existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePaths {
    pub canonical: PathBuf,
    pub random: PathBuf,
    pub segmentation: PathBuf,
    pub depth: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PairedSample {
    pub key: FrameKey,
    pub canonical: ImageTensor,
    /// Second canonical image drawn uniformly from the whole collection.
    pub sampled_canonical: ImageTensor,
    pub random: ImageTensor,
    pub segmentation: ImageTensor,
    pub depth: ImageTensor,
    pub privileged_info: Vec<f64>,
    pub paths: SamplePaths,
    pub sampled_canonical_path: PathBuf,
}

impl PairedSample {
    pub fn canonical_path(&self) -> &PathBuf {
        &self.paths.canonical
    }

    pub fn random_path(&self) -> &PathBuf {
        &self.paths.random
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub canonical: usize,
    pub random: usize,
    pub segmentation: usize,
    pub depth: usize,
    pub privileged_info_files: usize,
}
