//! Dataset options: directory layout, size cap, seed, and transforms.

use crate::aug::TransformConfig;
use crate::types::{DatasetResult, Modality, PairedDatasetError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "paired-dataset.toml";
pub const CONFIG_ENV: &str = "PAIRED_DATASET_CONFIG";
pub const SEED_ENV: &str = "PAIRED_DATASET_SEED";

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetOptions {
    /// Root holding `<phase>random`, `<phase>segmentation` and `<phase>depth`.
    pub dataroot: PathBuf,
    #[serde(default = "default_phase")]
    pub phase: String,
    /// Canonical renderings; rooted independently of `dataroot`.
    pub canonical_dir: PathBuf,
    /// Directory of `canonical_pi<seed>.npy` arrays.
    pub pi_dir: PathBuf,
    /// Cap on each image listing.
    #[serde(default = "default_max_dataset_size")]
    pub max_dataset_size: usize,
    /// Seeds per-query randomness (sampled canonical and augmentation).
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_true")]
    pub cache_privileged_info: bool,
    #[serde(default)]
    pub transform: TransformConfig,
}

fn default_phase() -> String {
    "train".to_string()
}

fn default_max_dataset_size() -> usize {
    usize::MAX
}

fn default_true() -> bool {
    true
}

impl DatasetOptions {
    pub fn new(
        dataroot: impl Into<PathBuf>,
        canonical_dir: impl Into<PathBuf>,
        pi_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dataroot: dataroot.into(),
            phase: default_phase(),
            canonical_dir: canonical_dir.into(),
            pi_dir: pi_dir.into(),
            max_dataset_size: default_max_dataset_size(),
            seed: None,
            cache_privileged_info: true,
            transform: TransformConfig::default(),
        }
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    pub fn with_max_dataset_size(mut self, max: usize) -> Self {
        self.max_dataset_size = max;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_transform(mut self, transform: TransformConfig) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_privileged_cache(mut self, enabled: bool) -> Self {
        self.cache_privileged_info = enabled;
        self
    }

    /// Directory listed for `modality`. Canonical images live in
    /// `canonical_dir`; the others in `<dataroot>/<phase><modality>`.
    pub fn modality_dir(&self, modality: Modality) -> PathBuf {
        match modality {
            Modality::Canonical => self.canonical_dir.clone(),
            other => self
                .dataroot
                .join(format!("{}{}", self.phase, other.dir_suffix())),
        }
    }

    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| PairedDatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut opts: Self = toml::from_str(&raw).map_err(|e| PairedDatasetError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        opts.resolve_relative_to(path.parent().unwrap_or(Path::new(".")));
        Ok(opts)
    }

    /// Load from `$PAIRED_DATASET_CONFIG`, falling back to
    /// `paired-dataset.toml` in the working directory.
    pub fn load() -> DatasetResult<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        Ok(Self::from_path(&path)?.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(seed) = std::env::var(SEED_ENV)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            self.seed = Some(seed);
        }
        self
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for dir in [&mut self.dataroot, &mut self.canonical_dir, &mut self.pi_dir] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::aug::Preprocess;
    use std::fs;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_minimal(dir: &Path) -> PathBuf {
        let path = dir.join("cfg.toml");
        fs::write(
            &path,
            "dataroot = \"data\"\ncanonical_dir = \"canonical\"\npi_dir = \"pi\"\nseed = 5\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn modality_dirs_follow_phase() {
        let opts = DatasetOptions::new("/data", "/renders/canonical", "/renders/pi")
            .with_phase("test");
        assert_eq!(opts.modality_dir(Modality::Random), PathBuf::from("/data/testrandom"));
        assert_eq!(
            opts.modality_dir(Modality::Segmentation),
            PathBuf::from("/data/testsegmentation")
        );
        assert_eq!(opts.modality_dir(Modality::Depth), PathBuf::from("/data/testdepth"));
        assert_eq!(
            opts.modality_dir(Modality::Canonical),
            PathBuf::from("/renders/canonical")
        );
    }

    #[test]
    fn loads_minimal_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("paired-dataset.toml");
        fs::write(
            &path,
            "dataroot = \"/data\"\ncanonical_dir = \"/canon\"\npi_dir = \"/pi\"\n",
        )
        .unwrap();
        let opts = DatasetOptions::from_path(&path).unwrap();
        assert_eq!(opts.phase, "train");
        assert_eq!(opts.max_dataset_size, usize::MAX);
        assert!(opts.cache_privileged_info);
        assert_eq!(opts.seed, None);
        assert_eq!(opts.transform.preprocess, Preprocess::ResizeAndCrop);
    }

    #[test]
    fn loads_full_toml_with_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cfg.toml");
        fs::write(
            &path,
            r#"
dataroot = "data"
phase = "val"
canonical_dir = "canonical"
pi_dir = "/abs/pi"
max_dataset_size = 100
seed = 9
cache_privileged_info = false

[transform]
preprocess = "scale_width_and_crop"
load_size = 128
crop_size = 64
no_flip = true
"#,
        )
        .unwrap();
        let opts = DatasetOptions::from_path(&path).unwrap();
        assert_eq!(opts.dataroot, tmp.path().join("data"));
        assert_eq!(opts.canonical_dir, tmp.path().join("canonical"));
        assert_eq!(opts.pi_dir, PathBuf::from("/abs/pi"));
        assert_eq!(opts.max_dataset_size, 100);
        assert_eq!(opts.seed, Some(9));
        assert!(!opts.cache_privileged_info);
        assert_eq!(opts.transform.preprocess, Preprocess::ScaleWidthAndCrop);
        assert_eq!(opts.transform.load_size, 128);
        assert!(opts.transform.no_flip);
        assert!(opts.transform.normalize);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "dataroot = [").unwrap();
        let err = DatasetOptions::from_path(&path).unwrap_err();
        assert!(matches!(err, PairedDatasetError::ConfigParse { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = DatasetOptions::from_path(Path::new("/nonexistent/paired.toml")).unwrap_err();
        assert!(matches!(err, PairedDatasetError::Io { .. }));
    }

    #[test]
    fn seed_env_overrides_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let opts = DatasetOptions::new("/data", "/canon", "/pi").with_seed(Some(5));

        std::env::set_var(SEED_ENV, " 42 ");
        assert_eq!(opts.clone().with_env_overrides().seed, Some(42));

        std::env::set_var(SEED_ENV, "not-a-seed");
        assert_eq!(opts.clone().with_env_overrides().seed, Some(5));

        std::env::remove_var(SEED_ENV);
        assert_eq!(opts.with_env_overrides().seed, Some(5));
    }

    #[test]
    fn load_reads_config_env_and_applies_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let path = write_minimal(tmp.path());

        std::env::set_var(CONFIG_ENV, &path);
        std::env::remove_var(SEED_ENV);
        let opts = DatasetOptions::load().unwrap();
        assert_eq!(opts.dataroot, tmp.path().join("data"));
        assert_eq!(opts.pi_dir, tmp.path().join("pi"));
        assert_eq!(opts.seed, Some(5));

        std::env::set_var(SEED_ENV, "11");
        assert_eq!(DatasetOptions::load().unwrap().seed, Some(11));

        std::env::set_var(CONFIG_ENV, tmp.path().join("absent.toml"));
        let err = DatasetOptions::load().unwrap_err();
        assert!(matches!(err, PairedDatasetError::Io { .. }));

        std::env::remove_var(CONFIG_ENV);
        std::env::remove_var(SEED_ENV);
    }
}
