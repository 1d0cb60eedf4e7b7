use burn::module::{AutodiffModule, Module};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;

/// Adam bound to one model type, with the learning rate fixed up front.
pub struct ConfiguredOptimizer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    optimizer: OptimizerAdaptor<Adam, M, B>,
    learning_rate: f64,
    num_params: usize,
}

impl<B, M> ConfiguredOptimizer<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    pub fn adam(model: &M, learning_rate: f64) -> Self {
        let optimizer = AdamConfig::new().init::<B, M>();

        Self {
            optimizer,
            learning_rate,
            num_params: model.num_params(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Parameter count of the model this optimizer was configured for.
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    pub fn step(&mut self, model: M, grads: GradientsParams) -> M {
        self.optimizer.step(self.learning_rate, model, grads)
    }
}
