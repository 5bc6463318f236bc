//! Paired frame index: canonical images keyed by `(seed, frame)` and their
//! randomized, segmentation, depth and privileged-info counterparts.
//!
//! Construction lists every collection once; queries re-read images from disk.
//! Sibling files are derived from the canonical key by naming convention and
//! are not checked until a query needs them.

use crate::aug::TransformPipeline;
use crate::config::DatasetOptions;
use crate::key::FrameKey;
use crate::listing::list_images_descending;
use crate::privileged::PrivilegedInfoStore;
use crate::types::{
    DatasetResult, ImageTensor, IndexSummary, Modality, PairedDatasetError, PairedSample,
    SamplePaths,
};
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct PairedFrameIndex {
    options: DatasetOptions,
    canonical: Vec<PathBuf>,
    random: Vec<PathBuf>,
    segmentation: Vec<PathBuf>,
    depth: Vec<PathBuf>,
    random_dir: PathBuf,
    segmentation_dir: PathBuf,
    depth_dir: PathBuf,
    privileged: PrivilegedInfoStore,
    transform_rgb: TransformPipeline,
    transform_gray: TransformPipeline,
}

impl PairedFrameIndex {
    /// List all collections. Fails fast if any directory is missing.
    pub fn new(options: DatasetOptions) -> DatasetResult<Self> {
        let cap = options.max_dataset_size;
        let canonical = list_images_descending(&options.modality_dir(Modality::Canonical), cap)?;
        let random_dir = options.modality_dir(Modality::Random);
        let segmentation_dir = options.modality_dir(Modality::Segmentation);
        let depth_dir = options.modality_dir(Modality::Depth);
        let random = list_images_descending(&random_dir, cap)?;
        let segmentation = list_images_descending(&segmentation_dir, cap)?;
        let depth = list_images_descending(&depth_dir, cap)?;
        let privileged = PrivilegedInfoStore::open(&options.pi_dir, options.cache_privileged_info)?;
        let transform_rgb = TransformPipeline::rgb(&options.transform);
        let transform_gray = TransformPipeline::grayscale(&options.transform);

        let index = Self {
            options,
            canonical,
            random,
            segmentation,
            depth,
            random_dir,
            segmentation_dir,
            depth_dir,
            privileged,
            transform_rgb,
            transform_gray,
        };
        let summary = index.summary();
        info!(
            canonical = summary.canonical,
            random = summary.random,
            segmentation = summary.segmentation,
            depth = summary.depth,
            privileged_info_files = summary.privileged_info_files,
            transform = %index.transform_rgb.describe(),
            "indexed paired frame dataset"
        );
        Ok(index)
    }

    /// Nominal dataset size: the canonical collection's count.
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    pub fn privileged(&self) -> &PrivilegedInfoStore {
        &self.privileged
    }

    /// Paths listed for `modality`, in descending order.
    pub fn collection(&self, modality: Modality) -> &[PathBuf] {
        match modality {
            Modality::Canonical => &self.canonical,
            Modality::Random => &self.random,
            Modality::Segmentation => &self.segmentation,
            Modality::Depth => &self.depth,
        }
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            canonical: self.canonical.len(),
            random: self.random.len(),
            segmentation: self.segmentation.len(),
            depth: self.depth.len(),
            privileged_info_files: self.privileged.files().len(),
        }
    }

    /// Canonical path for `index` (wrapping) and its derived sibling paths.
    /// Does no I/O.
    pub fn resolve(&self, index: usize) -> DatasetResult<(FrameKey, SamplePaths)> {
        if self.canonical.is_empty() {
            return Err(PairedDatasetError::EmptyCollection {
                dir: self.options.canonical_dir.clone(),
            });
        }
        let canonical = self.canonical[index % self.canonical.len()].clone();
        let key = FrameKey::from_path(&canonical)?;
        let sibling = key.sibling_file_name();
        let paths = SamplePaths {
            random: self.random_dir.join(&sibling),
            segmentation: self.segmentation_dir.join(&sibling),
            depth: self.depth_dir.join(&sibling),
            canonical,
        };
        Ok((key, paths))
    }

    /// Assemble the sample for `index`. Indices past `len()` wrap around.
    pub fn get(&self, index: usize) -> DatasetResult<PairedSample> {
        let (key, paths) = self.resolve(index)?;
        debug!(index, %key, canonical = %paths.canonical.display(), "resolving sample");
        let privileged_info = self.privileged.lookup(&key)?;

        // Seeded: reproducible per index. Otherwise thread-local.
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn rand::RngCore = if let Some(seed) = self.options.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ index as u64);
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };

        let sampled_canonical_path =
            self.canonical[rng.random_range(0..self.canonical.len())].clone();

        let canonical = self.load_transformed(&paths.canonical, Modality::Canonical, rng)?;
        let sampled_canonical =
            self.load_transformed(&sampled_canonical_path, Modality::Canonical, rng)?;
        let random = self.load_transformed(&paths.random, Modality::Random, rng)?;
        let segmentation =
            self.load_transformed(&paths.segmentation, Modality::Segmentation, rng)?;
        let depth = self.load_transformed(&paths.depth, Modality::Depth, rng)?;

        Ok(PairedSample {
            key,
            canonical,
            sampled_canonical,
            random,
            segmentation,
            depth,
            privileged_info,
            paths,
            sampled_canonical_path,
        })
    }

    /// Assemble several samples in parallel, preserving order. The first
    /// failure aborts the whole call.
    pub fn get_many(&self, indices: &[usize]) -> DatasetResult<Vec<PairedSample>> {
        indices.par_iter().map(|&i| self.get(i)).collect()
    }

    /// Pipeline applied to images of `modality`.
    pub fn pipeline(&self, modality: Modality) -> &TransformPipeline {
        if modality.is_grayscale() {
            &self.transform_gray
        } else {
            &self.transform_rgb
        }
    }

    fn load_transformed(
        &self,
        path: &Path,
        modality: Modality,
        rng: &mut dyn rand::RngCore,
    ) -> DatasetResult<ImageTensor> {
        if !path.is_file() {
            return Err(PairedDatasetError::MissingImageFile {
                path: path.to_path_buf(),
            });
        }
        let img = image::open(path).map_err(|e| PairedDatasetError::Image {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.pipeline(modality).apply(&img, path, rng)
    }
}
