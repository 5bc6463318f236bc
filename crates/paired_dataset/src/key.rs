//! Frame keys embedded in canonical filenames (`<seed>img<frame>.<ext>`).

use crate::types::{DatasetResult, PairedDatasetError};
use std::fmt;
use std::path::Path;

const KEY_MARKER: &str = "img";

/// `(seed, frame_index)` pair parsed from a canonical filename.
///
/// The digit runs are kept as written so derived names reproduce the canonical
/// spelling, including leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    seed: u64,
    frame_index: usize,
    seed_digits: String,
    frame_digits: String,
}

impl FrameKey {
    pub fn new(seed: u64, frame_index: usize) -> Self {
        Self {
            seed,
            frame_index,
            seed_digits: seed.to_string(),
            frame_digits: frame_index.to_string(),
        }
    }

    /// Parse the key from the file name of `path`.
    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PairedDatasetError::KeyParse {
                path: path.to_path_buf(),
                msg: "file name is missing or not UTF-8".to_string(),
            })?;
        Self::parse(name).map_err(|msg| PairedDatasetError::KeyParse {
            path: path.to_path_buf(),
            msg,
        })
    }

    /// Parse a bare file name. The seed is the digit run closest before the
    /// first `img`; the frame index is the first digit run at or after it.
    pub fn parse(name: &str) -> Result<Self, String> {
        let marker = name
            .find(KEY_MARKER)
            .ok_or_else(|| format!("no `{KEY_MARKER}` marker in {name:?}"))?;
        let (head, tail) = name.split_at(marker);
        let seed_digits = last_digit_run(head)
            .ok_or_else(|| format!("no seed digits before `{KEY_MARKER}` in {name:?}"))?;
        let frame_digits = first_digit_run(tail)
            .ok_or_else(|| format!("no frame digits after `{KEY_MARKER}` in {name:?}"))?;
        let seed = seed_digits
            .parse::<u64>()
            .map_err(|e| format!("seed {seed_digits:?}: {e}"))?;
        let frame_index = frame_digits
            .parse::<usize>()
            .map_err(|e| format!("frame index {frame_digits:?}: {e}"))?;
        Ok(Self {
            seed,
            frame_index,
            seed_digits: seed_digits.to_string(),
            frame_digits: frame_digits.to_string(),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn seed_digits(&self) -> &str {
        &self.seed_digits
    }

    /// Name of the sibling file in the random/segmentation/depth directories.
    pub fn sibling_file_name(&self) -> String {
        format!(
            "{}{KEY_MARKER}{}.png",
            self.seed_digits, self.frame_digits
        )
    }

    /// Name of the privileged-info array holding every frame of this seed.
    pub fn privileged_file_name(&self) -> String {
        format!("canonical_pi{}.npy", self.seed_digits)
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seed={} frame={}", self.seed, self.frame_index)
    }
}

fn first_digit_run(s: &str) -> Option<&str> {
    let rest = s.trim_start_matches(|c: char| !c.is_ascii_digit());
    let len = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    (len > 0).then(|| &rest[..len])
}

fn last_digit_run(s: &str) -> Option<&str> {
    let head = s.trim_end_matches(|c: char| !c.is_ascii_digit());
    let start = head.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    (start < head.len()).then(|| &head[start..])
}
