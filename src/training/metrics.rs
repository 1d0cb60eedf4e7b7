use burn::prelude::*;

/// Multiclass accuracy with a running total across calls.
///
/// [`Accuracy::update`] returns the accuracy of the batch it was given and
/// folds that batch into the running counts read by [`Accuracy::compute`].
#[derive(Debug, Clone, Default)]
pub struct Accuracy {
    correct: usize,
    total: usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// `logits` is `[N, K]`, `targets` is `[N]` class indices.
    pub fn update<B: Backend>(&mut self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f64 {
        let [batch_size, _] = logits.dims();
        if batch_size == 0 {
            return 0.0;
        }

        let predictions: Tensor<B, 1, Int> = logits.argmax(1).reshape([batch_size]);
        let correct = predictions
            .equal(targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>() as usize;

        self.correct += correct;
        self.total += batch_size;

        correct as f64 / batch_size as f64
    }

    pub fn compute(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }

    pub fn seen(&self) -> usize {
        self.total
    }
}
