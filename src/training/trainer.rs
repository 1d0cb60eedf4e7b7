use crate::training::module::{Stage, StepInfo, StepOutput, TrainingModule};
use crate::training::optimizer::ConfiguredOptimizer;
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;

/// Mean step metrics over one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub stage: Stage,
    pub loss: f64,
    pub accuracy: f64,
    pub batches: usize,
}

impl EpochSummary {
    fn from_steps(stage: Stage, steps: &[StepInfo]) -> Self {
        let batches = steps.len();
        let mean = |f: fn(&StepInfo) -> f64| steps.iter().map(f).sum::<f64>() / batches as f64;

        Self {
            stage,
            loss: mean(|s| s.loss),
            accuracy: mean(|s| s.accuracy),
            batches,
        }
    }
}

/// Calls a [`TrainingModule`]'s hooks batch by batch and applies its
/// optimizer after each training step.
pub struct Trainer<B, T>
where
    B: AutodiffBackend,
    T: TrainingModule<B>,
{
    pub module: T,
    optimizer: ConfiguredOptimizer<B, T::Model>,
}

impl<B, T> Trainer<B, T>
where
    B: AutodiffBackend,
    T: TrainingModule<B>,
{
    pub fn new(module: T) -> Self {
        let optimizer = module.configure_optimizers();

        log::info!(
            "Configured Adam over {} parameters (lr={})",
            optimizer.num_params(),
            optimizer.learning_rate()
        );

        Self { module, optimizer }
    }

    pub fn optimizer(&self) -> &ConfiguredOptimizer<B, T::Model> {
        &self.optimizer
    }

    pub fn train_epoch<I>(&mut self, batches: I) -> EpochSummary
    where
        I: IntoIterator<Item = T::Batch>,
    {
        let mut steps = Vec::new();

        for (batch_idx, batch) in batches.into_iter().enumerate() {
            let output = self.module.training_step(batch, batch_idx);

            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, self.module.model());
            let model = self.optimizer.step(self.module.model().clone(), grads);
            self.module.set_model(model);

            log::debug!(
                "train batch {}: loss={:.4} accuracy={:.4}",
                batch_idx + 1,
                output.info.loss,
                output.info.accuracy
            );
            steps.push(output.info);
        }

        self.finish(Stage::Train, &steps)
    }

    /// Runs `validation_step` over the batches. The model is not updated.
    pub fn validate<I>(&mut self, batches: I) -> EpochSummary
    where
        I: IntoIterator<Item = T::ValidBatch>,
    {
        self.evaluate(batches, Stage::Val, T::validation_step)
    }

    pub fn test<I>(&mut self, batches: I) -> EpochSummary
    where
        I: IntoIterator<Item = T::ValidBatch>,
    {
        self.evaluate(batches, Stage::Test, T::test_step)
    }

    fn evaluate<I, F>(&mut self, batches: I, stage: Stage, mut hook: F) -> EpochSummary
    where
        I: IntoIterator<Item = T::ValidBatch>,
        F: FnMut(&mut T, T::ValidBatch, usize) -> StepOutput<B::InnerBackend>,
    {
        let steps: Vec<StepInfo> = batches
            .into_iter()
            .enumerate()
            .map(|(batch_idx, batch)| hook(&mut self.module, batch, batch_idx).info)
            .collect();

        self.finish(stage, &steps)
    }

    fn finish(&mut self, stage: Stage, steps: &[StepInfo]) -> EpochSummary {
        self.module.on_epoch_end(stage);

        let summary = EpochSummary::from_steps(stage, steps);
        if summary.batches == 0 {
            log::warn!("{} pass saw no batches", stage);
        }
        summary
    }
}
