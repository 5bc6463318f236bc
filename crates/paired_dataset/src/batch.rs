//! Burn integration: batch collation and the `Dataset` adapter.

use crate::index::PairedFrameIndex;
use crate::types::{DatasetResult, ImageTensor, PairedDatasetError, PairedSample};
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use tracing::warn;

pub struct PairedBatch<B: Backend> {
    /// `[batch, 3, H, W]`
    pub canonical: Tensor<B, 4>,
    pub sampled_canonical: Tensor<B, 4>,
    pub random: Tensor<B, 4>,
    /// `[batch, 1, H, W]`
    pub segmentation: Tensor<B, 4>,
    pub depth: Tensor<B, 4>,
    /// `[batch, features]`
    pub privileged_info: Tensor<B, 2>,
}

/// Stack samples into batch tensors. All samples must share image shapes and
/// privileged-info width.
pub fn collate<B: Backend>(
    samples: &[PairedSample],
    device: &B::Device,
) -> DatasetResult<PairedBatch<B>> {
    let Some(first) = samples.first() else {
        return Err(PairedDatasetError::Other(
            "cannot collate empty batch".to_string(),
        ));
    };
    let features = first.privileged_info.len();
    let mut privileged = Vec::with_capacity(samples.len() * features);
    for sample in samples {
        if sample.privileged_info.len() != features {
            return Err(PairedDatasetError::Other(format!(
                "privileged info width {} differs from {} ({})",
                sample.privileged_info.len(),
                features,
                sample.paths.canonical.display()
            )));
        }
        privileged.extend(sample.privileged_info.iter().map(|&v| v as f32));
    }

    Ok(PairedBatch {
        canonical: stack_images(samples, |s| &s.canonical, device)?,
        sampled_canonical: stack_images(samples, |s| &s.sampled_canonical, device)?,
        random: stack_images(samples, |s| &s.random, device)?,
        segmentation: stack_images(samples, |s| &s.segmentation, device)?,
        depth: stack_images(samples, |s| &s.depth, device)?,
        privileged_info: Tensor::from_data(
            TensorData::new(privileged, [samples.len(), features]),
            device,
        ),
    })
}

fn stack_images<B: Backend>(
    samples: &[PairedSample],
    field: impl Fn(&PairedSample) -> &ImageTensor,
    device: &B::Device,
) -> DatasetResult<Tensor<B, 4>> {
    let shape = field(&samples[0]).shape();
    let mut buf = Vec::with_capacity(samples.len() * shape.iter().product::<usize>());
    for sample in samples {
        let img = field(sample);
        if img.shape() != shape {
            return Err(PairedDatasetError::Other(format!(
                "batch contains varying image shapes ({:?} vs {:?}); set a crop size to force consistency",
                img.shape(),
                shape
            )));
        }
        buf.extend_from_slice(&img.data);
    }
    let [c, h, w] = shape;
    Ok(Tensor::from_data(
        TensorData::new(buf, [samples.len(), c, h, w]),
        device,
    ))
}

impl PairedFrameIndex {
    /// Assemble `indices` in parallel and collate them into one batch.
    pub fn batch<B: Backend>(
        &self,
        indices: &[usize],
        device: &B::Device,
    ) -> DatasetResult<PairedBatch<B>> {
        let samples = self.get_many(indices)?;
        collate(&samples, device)
    }
}

impl Dataset<PairedSample> for PairedFrameIndex {
    fn get(&self, index: usize) -> Option<PairedSample> {
        match PairedFrameIndex::get(self, index) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(index, error = %e, "failed to assemble paired sample");
                None
            }
        }
    }

    fn len(&self) -> usize {
        PairedFrameIndex::len(self)
    }
}
