//! Per-seed privileged-information arrays (`canonical_pi<seed>.npy`).

use crate::key::FrameKey;
use crate::listing::list_files_with_extension;
use crate::types::{DatasetResult, PairedDatasetError};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use ndarray_npy::ReadNpyExt;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Rows are frames, columns are features.
pub type PrivilegedTable = Array2<f64>;

#[derive(Debug)]
pub struct PrivilegedInfoStore {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cache: Option<RwLock<HashMap<String, Arc<PrivilegedTable>>>>,
}

impl PrivilegedInfoStore {
    /// List `.npy` files in `dir`. Fails if the directory is unusable.
    pub fn open(dir: &Path, cache: bool) -> DatasetResult<Self> {
        let files = list_files_with_extension(dir, "npy")?;
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cache: cache.then(|| RwLock::new(HashMap::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `.npy` files found at construction, in directory order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn table_path(&self, key: &FrameKey) -> PathBuf {
        self.dir.join(key.privileged_file_name())
    }

    /// Vector stored for `key.frame_index()` in the seed's table.
    pub fn lookup(&self, key: &FrameKey) -> DatasetResult<Vec<f64>> {
        let table = self.table(key)?;
        let frame_index = key.frame_index();
        if frame_index >= table.nrows() {
            return Err(PairedDatasetError::FrameOutOfRange {
                path: self.table_path(key),
                frame_index,
                len: table.nrows(),
            });
        }
        Ok(table.row(frame_index).to_vec())
    }

    /// Whole table for the seed of `key`, cached when enabled.
    pub fn table(&self, key: &FrameKey) -> DatasetResult<Arc<PrivilegedTable>> {
        let Some(cache) = &self.cache else {
            return self.read_table(key).map(Arc::new);
        };
        let seed = key.seed_digits();
        if let Some(table) = cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(seed)
        {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(self.read_table(key)?);
        let mut guard = cache.write().unwrap_or_else(|e| e.into_inner());
        let entry = guard
            .entry(seed.to_string())
            .or_insert_with(|| Arc::clone(&table));
        debug!(seed, rows = entry.nrows(), "cached privileged info");
        Ok(Arc::clone(entry))
    }

    pub fn cached_seeds(&self) -> usize {
        self.cache
            .as_ref()
            .map(|c| c.read().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0)
    }

    fn read_table(&self, key: &FrameKey) -> DatasetResult<PrivilegedTable> {
        let path = self.table_path(key);
        if !path.is_file() {
            return Err(PairedDatasetError::PrivilegedInfoMissing {
                seed: key.seed(),
                path,
            });
        }
        let raw = std::fs::read(&path).map_err(|e| PairedDatasetError::Io {
            path: path.clone(),
            source: e,
        })?;
        let array = read_float_array(&raw).map_err(|source| PairedDatasetError::Npy {
            path: path.clone(),
            source,
        })?;
        let ndim = array.ndim();
        into_table(array).ok_or(PairedDatasetError::PrivilegedInfoShape { path, ndim })
    }
}

/// Decode an `.npy` payload stored as `f64` or `f32`.
fn read_float_array(raw: &[u8]) -> Result<ArrayD<f64>, ndarray_npy::ReadNpyError> {
    match ArrayD::<f64>::read_npy(Cursor::new(raw)) {
        Ok(array) => Ok(array),
        Err(f64_err) => ArrayD::<f32>::read_npy(Cursor::new(raw))
            .map(|a| a.mapv(f64::from))
            .map_err(|_| f64_err),
    }
}

/// 1-D arrays become a single feature column.
fn into_table(array: ArrayD<f64>) -> Option<PrivilegedTable> {
    match array.ndim() {
        1 => array.insert_axis(Axis(1)).into_dimensionality::<Ix2>().ok(),
        2 => array.into_dimensionality::<Ix2>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod privileged_tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};
    use ndarray_npy::write_npy;

    #[test]
    fn lookup_returns_stored_row() {
        let tmp = tempfile::tempdir().unwrap();
        write_npy(
            tmp.path().join("canonical_pi4.npy"),
            &arr2(&[[0.5f64, 1.5], [2.5, 3.5], [4.25, -1.0]]),
        )
        .unwrap();
        let store = PrivilegedInfoStore::open(tmp.path(), true).unwrap();
        assert_eq!(store.files().len(), 1);
        let row = store.lookup(&FrameKey::new(4, 2)).unwrap();
        assert_eq!(row, vec![4.25, -1.0]);
        assert_eq!(store.cached_seeds(), 1);
    }

    #[test]
    fn out_of_range_frame_is_lookup_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_npy(tmp.path().join("canonical_pi1.npy"), &arr2(&[[0.0f64], [1.0]])).unwrap();
        let store = PrivilegedInfoStore::open(tmp.path(), false).unwrap();
        let err = store.lookup(&FrameKey::new(1, 2)).unwrap_err();
        assert!(matches!(
            err,
            PairedDatasetError::FrameOutOfRange {
                frame_index: 2,
                len: 2,
                ..
            }
        ));
        assert_eq!(store.cached_seeds(), 0);
    }

    #[test]
    fn missing_seed_file_is_lookup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PrivilegedInfoStore::open(tmp.path(), true).unwrap();
        let err = store.lookup(&FrameKey::new(8, 0)).unwrap_err();
        assert!(matches!(err, PairedDatasetError::PrivilegedInfoMissing { seed: 8, .. }));
    }

    #[test]
    fn f32_and_1d_arrays_are_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        write_npy(tmp.path().join("canonical_pi2.npy"), &arr2(&[[0.25f32, 0.75]])).unwrap();
        write_npy(tmp.path().join("canonical_pi3.npy"), &arr1(&[1.0f64, 2.0, 3.0])).unwrap();
        let store = PrivilegedInfoStore::open(tmp.path(), true).unwrap();
        assert_eq!(store.lookup(&FrameKey::new(2, 0)).unwrap(), vec![0.25, 0.75]);
        assert_eq!(store.lookup(&FrameKey::new(3, 1)).unwrap(), vec![2.0]);
    }

    #[test]
    fn three_dimensional_table_is_shape_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cube = Array3::<f64>::zeros((2, 2, 2));
        write_npy(tmp.path().join("canonical_pi7.npy"), &cube).unwrap();
        let store = PrivilegedInfoStore::open(tmp.path(), true).unwrap();
        let err = store.lookup(&FrameKey::new(7, 0)).unwrap_err();
        match err {
            PairedDatasetError::PrivilegedInfoShape { path, ndim } => {
                assert_eq!(path, tmp.path().join("canonical_pi7.npy"));
                assert_eq!(ndim, 3);
            }
            other => panic!("expected PrivilegedInfoShape, got {other:?}"),
        }
        assert_eq!(store.cached_seeds(), 0);
    }

    #[test]
    fn cache_reuses_table() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("canonical_pi5.npy");
        write_npy(&path, &arr2(&[[1.0f64], [2.0]])).unwrap();
        let store = PrivilegedInfoStore::open(tmp.path(), true).unwrap();
        let first = store.table(&FrameKey::new(5, 0)).unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = store.table(&FrameKey::new(5, 1)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_directory_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = PrivilegedInfoStore::open(&tmp.path().join("nope"), true).unwrap_err();
        assert!(matches!(err, PairedDatasetError::Config { .. }));
    }
}
