use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation;

#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 1)]
    pub stride: usize,
    /// Without BatchNorm the convolution carries its own bias.
    #[config(default = true)]
    pub batch_norm: bool,
}

impl ConvBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvBlock<B> {
        // "same" padding for odd kernels
        let padding = self.kernel_size / 2;

        let conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([self.stride, self.stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(!self.batch_norm)
        .init(device);

        let bn = self
            .batch_norm
            .then(|| BatchNormConfig::new(self.out_channels).init(device));

        ConvBlock { conv, bn }
    }
}

/// Conv2d, optional BatchNorm, SiLU.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: Option<BatchNorm<B>>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.bn {
            Some(bn) => bn.forward(x),
            None => x,
        };
        activation::silu(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_stride_halves_spatial_dims() {
        let device = Default::default();
        let block = ConvBlockConfig::new(3, 8)
            .with_stride(2)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::ones([2, 3, 9, 9], &device);

        assert_eq!(block.forward(x).dims(), [2, 8, 5, 5]);
    }

    #[test]
    fn test_bias_replaces_batch_norm() {
        let device = Default::default();
        let with_bn = ConvBlockConfig::new(4, 6).init::<TestBackend>(&device);
        let without_bn = ConvBlockConfig::new(4, 6)
            .with_batch_norm(false)
            .init::<TestBackend>(&device);

        // BatchNorm adds gamma and beta, the bias adds one value per channel
        assert_eq!(with_bn.num_params() - without_bn.num_params(), 6);
    }
}
