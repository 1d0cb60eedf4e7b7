use crate::model::blocks::{ConvBlock, ConvBlockConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

/// A network that maps a batch of images `[N, C, H, W]` to class logits `[N, K]`.
///
/// Parameters are reached through [`Module`], so anything implementing this
/// trait can be handed to an optimizer as-is.
pub trait Classifier<B: Backend>: Module<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

#[derive(Module, Debug)]
pub struct SimpleCnn<B: Backend> {
    stem: ConvBlock<B>,
    stage: ConvBlock<B>,
    pool: AdaptiveAvgPool2d,
    head: Linear<B>,
}

impl<B: Backend> SimpleCnn<B> {
    pub const HIDDEN_CHANNELS: usize = 32;

    pub fn new(device: &B::Device, in_channels: usize, num_classes: usize) -> Self {
        Self {
            stem: ConvBlockConfig::new(in_channels, Self::HIDDEN_CHANNELS / 2)
                .with_stride(2)
                .init(device),
            stage: ConvBlockConfig::new(Self::HIDDEN_CHANNELS / 2, Self::HIDDEN_CHANNELS)
                .with_stride(2)
                .init(device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head: LinearConfig::new(Self::HIDDEN_CHANNELS, num_classes).init(device),
        }
    }
}

impl<B: Backend> Classifier<B> for SimpleCnn<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem.forward(images);
        let x = self.stage.forward(x);
        let x = self.pool.forward(x);

        let [batch_size, channels, _, _] = x.dims();
        self.head.forward(x.reshape([batch_size, channels]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_logits_shape() {
        let device = Default::default();
        let model = SimpleCnn::<TestBackend>::new(&device, 3, 5);

        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 16], &device);
        let logits = model.forward(images);

        assert_eq!(logits.dims(), [2, 5]);
    }

    #[test]
    fn test_parameters_are_enumerable() {
        let device = Default::default();
        let model = SimpleCnn::<TestBackend>::new(&device, 1, 3);

        // linear head alone: 32 * 3 weights + 3 biases
        assert!(model.num_params() > 32 * 3 + 3);
    }
}
