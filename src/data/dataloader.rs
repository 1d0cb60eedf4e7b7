use crate::data::dataset::ClassificationDataset;
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

/// An `(images, labels)` pair ready for a classifier.
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// `[N, C, H, W]`
    pub images: Tensor<B, 4>,
    /// `[N]`
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> ClassificationBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.labels.dims()[0]
    }
}

pub struct ClassificationDataLoader<B: Backend, D: ClassificationDataset> {
    dataset: Arc<D>,
    batch_size: usize,
    device: B::Device,
    indices: Vec<usize>,
    current_idx: usize,
}

impl<B: Backend, D: ClassificationDataset> ClassificationDataLoader<B, D> {
    /// `shuffle` is a seed; `None` keeps dataset order.
    pub fn new(dataset: Arc<D>, batch_size: usize, shuffle: Option<u64>, device: B::Device) -> Self {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();

        if let Some(seed) = shuffle {
            let mut rng = StdRng::seed_from_u64(seed);
            indices.shuffle(&mut rng);
        }

        Self {
            dataset,
            batch_size: batch_size.max(1),
            device,
            indices,
            current_idx: 0,
        }
    }

    /// Number of batches in a full pass.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    fn collate(&self, batch_indices: &[usize]) -> Option<ClassificationBatch<B>> {
        let channels = self.dataset.channels();
        let size = self.dataset.image_size();

        let mut pixels = Vec::with_capacity(batch_indices.len() * channels * size * size);
        let mut labels = Vec::with_capacity(batch_indices.len());

        for &idx in batch_indices {
            match self.dataset.get(idx) {
                Ok(item) => {
                    pixels.extend(item.pixels);
                    labels.push(item.label as i64);
                }
                Err(e) => log::warn!("Skipping sample {}: {:#}", idx, e),
            }
        }

        if labels.is_empty() {
            return None;
        }

        let actual_batch_size = labels.len();
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [actual_batch_size, channels, size, size]),
            &self.device,
        );
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [actual_batch_size]),
            &self.device,
        );

        Some(ClassificationBatch { images, labels })
    }
}

impl<B: Backend, D: ClassificationDataset> Iterator for ClassificationDataLoader<B, D> {
    type Item = ClassificationBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_idx < self.indices.len() {
            let end_idx = (self.current_idx + self.batch_size).min(self.indices.len());
            let batch_indices = self.indices[self.current_idx..end_idx].to_vec();
            self.current_idx = end_idx;

            if let Some(batch) = self.collate(&batch_indices) {
                return Some(batch);
            }
        }

        None
    }
}
