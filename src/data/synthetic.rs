use crate::data::dataset::{ClassificationDataset, ClassificationItem};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic stand-in data: every image of class `k` is a flat field
/// at intensity `(k + 0.5) / num_classes` with uniform noise on top.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub num_samples: usize,
    pub num_classes: usize,
    pub img_size: usize,
    pub channels: usize,
    pub noise: f32,
    seed: u64,
}

impl SyntheticDataset {
    pub fn new(
        num_samples: usize,
        num_classes: usize,
        img_size: usize,
        channels: usize,
        seed: u64,
    ) -> Self {
        Self {
            num_samples,
            num_classes: num_classes.max(1),
            img_size,
            channels,
            noise: 0.1,
            seed,
        }
    }

    pub fn with_noise(mut self, noise: f32) -> Self {
        self.noise = noise;
        self
    }
}

impl ClassificationDataset for SyntheticDataset {
    fn len(&self) -> usize {
        self.num_samples
    }

    fn image_size(&self) -> usize {
        self.img_size
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn get(&self, idx: usize) -> Result<ClassificationItem> {
        if idx >= self.num_samples {
            anyhow::bail!(
                "index {} out of bounds. Dataset has {} samples",
                idx,
                self.num_samples
            );
        }

        let label = idx % self.num_classes;
        let level = (label as f32 + 0.5) / self.num_classes as f32;

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(idx as u64));
        let size = self.channels * self.img_size * self.img_size;
        let pixels = (0..size)
            .map(|_| {
                let jitter = if self.noise > 0.0 {
                    rng.gen_range(-self.noise..self.noise)
                } else {
                    0.0
                };
                (level + jitter).clamp(0.0, 1.0)
            })
            .collect();

        Ok(ClassificationItem { pixels, label })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_pixels() {
        let a = SyntheticDataset::new(10, 3, 4, 1, 7);
        let b = SyntheticDataset::new(10, 3, 4, 1, 7);

        assert_eq!(a.get(5).unwrap().pixels, b.get(5).unwrap().pixels);
    }

    #[test]
    fn test_labels_cycle_through_classes() {
        let dataset = SyntheticDataset::new(6, 3, 2, 3, 0).with_noise(0.0);

        let labels: Vec<usize> = (0..6).map(|i| dataset.get(i).unwrap().label).collect();
        assert_eq!(labels, vec![0, 1, 2, 0, 1, 2]);

        let item = dataset.get(1).unwrap();
        assert_eq!(item.pixels.len(), 3 * 2 * 2);
        assert!(item.pixels.iter().all(|&p| (p - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_out_of_bounds() {
        let dataset = SyntheticDataset::new(2, 2, 2, 1, 0);
        assert!(dataset.get(2).is_err());
    }
}
