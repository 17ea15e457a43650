//! Batch types and batching for severity training.
//!
//! Image loading and augmentation live upstream; this module defines the
//! surface the training loop and evaluator consume: preprocessed items,
//! tensor batches, a Burn `Batcher`, and per-phase batch collections that
//! carry their own sample counts.

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use serde::{Deserialize, Serialize};

use crate::IMAGE_SIZE;

/// Channel means for input normalization (ImageNet statistics)
pub const NORMALIZE_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Channel standard deviations for input normalization
pub const NORMALIZE_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A single preprocessed sample ready for batching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeverityItem {
    /// Image data as flattened CHW float array `[3 * H * W]`, values in [0, 1]
    pub image: Vec<f32>,
    /// Severity label (0 = Low, 1 = Moderate, 2 = Severe)
    pub label: usize,
}

impl SeverityItem {
    /// Create an item from flattened CHW pixel data
    pub fn new(image: Vec<f32>, label: usize) -> Self {
        Self { image, label }
    }
}

/// A batch of images and targets on a backend
#[derive(Clone, Debug)]
pub struct SeverityBatch<B: Backend> {
    /// Images with shape `[batch_size, 3, height, width]`
    pub images: Tensor<B, 4>,
    /// Labels with shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> SeverityBatch<B> {
    /// Number of samples in this batch
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batcher producing normalized image batches
#[derive(Clone, Debug)]
pub struct SeverityBatcher {
    image_size: usize,
}

impl SeverityBatcher {
    /// Create a batcher for the default image size
    pub fn new() -> Self {
        Self {
            image_size: IMAGE_SIZE,
        }
    }

    /// Create a batcher with a custom image size
    pub fn with_image_size(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl Default for SeverityBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Batcher<B, SeverityItem, SeverityBatch<B>> for SeverityBatcher {
    fn batch(&self, items: Vec<SeverityItem>, device: &B::Device) -> SeverityBatch<B> {
        let batch_size = items.len();
        let channels = 3;
        let height = self.image_size;
        let width = self.image_size;

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(images_data, [batch_size, channels, height, width]),
            device,
        );

        // Normalize per channel
        let mean = Tensor::<B, 4>::from_data(
            TensorData::new(NORMALIZE_MEAN.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let std = Tensor::<B, 4>::from_data(
            TensorData::new(NORMALIZE_STD.to_vec(), [1, 3, 1, 1]),
            device,
        );
        let images = (images - mean) / std;

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        SeverityBatch { images, targets }
    }
}

/// Ordered batches for one phase ("train" or "val") plus the phase's total
/// sample count, used to normalize running loss and accuracy.
#[derive(Clone, Debug)]
pub struct PhaseData<B: Backend> {
    batches: Vec<SeverityBatch<B>>,
    num_samples: usize,
}

impl<B: Backend> PhaseData<B> {
    /// Wrap pre-built batches
    pub fn new(batches: Vec<SeverityBatch<B>>) -> Self {
        let num_samples = batches.iter().map(|b| b.len()).sum();
        Self {
            batches,
            num_samples,
        }
    }

    /// Batch items with the given batch size and wrap the result
    pub fn from_items(
        items: Vec<SeverityItem>,
        batch_size: usize,
        batcher: &SeverityBatcher,
        device: &B::Device,
    ) -> Self {
        let batches = items
            .chunks(batch_size.max(1))
            .map(|chunk| batcher.batch(chunk.to_vec(), device))
            .collect();
        Self::new(batches)
    }

    /// Iterate the phase's batches in order
    pub fn batches(&self) -> &[SeverityBatch<B>] {
        &self.batches
    }

    /// Total sample count across all batches
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Whether the phase has no data
    pub fn is_empty(&self) -> bool {
        self.num_samples == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn constant_item(size: usize, value: f32, label: usize) -> SeverityItem {
        SeverityItem::new(vec![value; 3 * size * size], label)
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let batcher = SeverityBatcher::with_image_size(8);

        let items = vec![constant_item(8, 0.5, 0), constant_item(8, 0.25, 2)];
        let batch: SeverityBatch<TestBackend> = batcher.batch(items, &device);

        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [2]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_batcher_normalizes_channels() {
        let device = Default::default();
        let batcher = SeverityBatcher::with_image_size(2);

        let batch: SeverityBatch<TestBackend> =
            batcher.batch(vec![constant_item(2, 0.5, 1)], &device);

        let values: Vec<f32> = batch.images.into_data().to_vec().unwrap();
        let expected = (0.5 - NORMALIZE_MEAN[0]) / NORMALIZE_STD[0];
        assert!((values[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_phase_data_counts() {
        let device = Default::default();
        let batcher = SeverityBatcher::with_image_size(4);

        let items: Vec<SeverityItem> = (0..10).map(|i| constant_item(4, 0.1, i % 3)).collect();
        let phase = PhaseData::<TestBackend>::from_items(items, 4, &batcher, &device);

        assert_eq!(phase.num_samples(), 10);
        assert_eq!(phase.batches().len(), 3); // 4 + 4 + 2
        assert!(!phase.is_empty());
    }
}
