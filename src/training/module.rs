use crate::data::ClassificationBatch;
use crate::model::Classifier;
use crate::training::logger::{LogSink, MetricSink};
use crate::training::metrics::Accuracy;
use crate::training::optimizer::ConfiguredOptimizer;
use burn::module::AutodiffModule;
use burn::nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use std::fmt;

pub const DEFAULT_LEARNING_RATE: f64 = 3e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Train,
    Val,
    Test,
}

impl Stage {
    pub fn prefix(&self) -> &'static str {
        match self {
            Stage::Train => "train",
            Stage::Val => "val",
            Stage::Test => "test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Scalar metrics of one step, keyed `loss` and `accuracy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    pub loss: f64,
    pub accuracy: f64,
}

impl StepInfo {
    pub const KEYS: [&'static str; 2] = ["loss", "accuracy"];

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        Self::KEYS.into_iter().zip([self.loss, self.accuracy])
    }
}

/// What a step hands back: the loss still attached to its graph, plus the
/// detached scalars that were logged.
#[derive(Debug, Clone)]
pub struct StepOutput<B: Backend> {
    pub loss: Tensor<B, 1>,
    pub info: StepInfo,
}

/// Hooks a training driver calls on the module it runs.
///
/// Training steps run on the autodiff backend. Validation and test steps
/// receive batches for the inner backend and must leave the model as they
/// found it.
pub trait TrainingModule<B: AutodiffBackend> {
    type Model: AutodiffModule<B>;
    type Batch;
    type ValidBatch;

    fn model(&self) -> &Self::Model;

    /// Installs the model returned by an optimizer step.
    fn set_model(&mut self, model: Self::Model);

    fn training_step(&mut self, batch: Self::Batch, batch_idx: usize) -> StepOutput<B>;

    fn validation_step(
        &mut self,
        batch: Self::ValidBatch,
        batch_idx: usize,
    ) -> StepOutput<B::InnerBackend>;

    fn test_step(&mut self, batch: Self::ValidBatch, batch_idx: usize) -> StepOutput<B::InnerBackend>;

    fn configure_optimizers(&self) -> ConfiguredOptimizer<B, Self::Model>;

    fn on_epoch_end(&mut self, _stage: Stage) {}
}

/// Cross-entropy classification around any [`Classifier`].
pub struct ClassificationModule<B: Backend, M: Classifier<B>> {
    model: M,
    criterion: CrossEntropyLoss<B>,
    accuracy_metric: Accuracy,
    learning_rate: f64,
    sink: Box<dyn MetricSink>,
}

impl<B: Backend, M: Classifier<B>> ClassificationModule<B, M> {
    pub fn new(model: M, learning_rate: f64, device: &B::Device) -> Self {
        Self {
            model,
            criterion: CrossEntropyLossConfig::new().init(device),
            accuracy_metric: Accuracy::new(),
            learning_rate,
            sink: Box::new(LogSink),
        }
    }

    pub fn with_sink(mut self, sink: impl MetricSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn accuracy_metric(&self) -> &Accuracy {
        &self.accuracy_metric
    }

    pub fn sink_mut(&mut self) -> &mut dyn MetricSink {
        self.sink.as_mut()
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.model.forward(x)
    }

    pub fn step(&mut self, batch: ClassificationBatch<B>) -> StepOutput<B> {
        classify(&self.model, &self.criterion, &mut self.accuracy_metric, batch)
    }

    pub fn log_info(&mut self, info: &StepInfo, prefix: &str) {
        for (key, value) in info.iter() {
            self.sink.log(&format!("{prefix}/{key}"), value);
        }
    }
}

fn classify<B: Backend, M: Classifier<B>>(
    model: &M,
    criterion: &CrossEntropyLoss<B>,
    accuracy_metric: &mut Accuracy,
    batch: ClassificationBatch<B>,
) -> StepOutput<B> {
    let ClassificationBatch { images, labels } = batch;

    let predicts = model.forward(images);
    let loss = criterion.forward(predicts.clone(), labels.clone());
    let accuracy = accuracy_metric.update(predicts, labels);

    let info = StepInfo {
        loss: loss.clone().into_scalar().elem::<f64>(),
        accuracy,
    };

    StepOutput { loss, info }
}

impl<B, M> ClassificationModule<B, M>
where
    B: AutodiffBackend,
    M: Classifier<B> + AutodiffModule<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
{
    /// Runs the batch through `valid()` copies of the model and criterion.
    /// BatchNorm then reads its running statistics instead of updating them.
    fn eval_stage(
        &mut self,
        batch: ClassificationBatch<B::InnerBackend>,
        stage: Stage,
    ) -> StepOutput<B::InnerBackend> {
        let model = self.model.valid();
        let criterion = self.criterion.valid();

        let output = classify(&model, &criterion, &mut self.accuracy_metric, batch);
        self.log_info(&output.info, stage.prefix());
        output
    }
}

impl<B, M> TrainingModule<B> for ClassificationModule<B, M>
where
    B: AutodiffBackend,
    M: Classifier<B> + AutodiffModule<B>,
    M::InnerModule: Classifier<B::InnerBackend>,
{
    type Model = M;
    type Batch = ClassificationBatch<B>;
    type ValidBatch = ClassificationBatch<B::InnerBackend>;

    fn model(&self) -> &M {
        &self.model
    }

    fn set_model(&mut self, model: M) {
        self.model = model;
    }

    fn training_step(&mut self, batch: Self::Batch, _batch_idx: usize) -> StepOutput<B> {
        let output = self.step(batch);
        self.log_info(&output.info, Stage::Train.prefix());
        output
    }

    fn validation_step(
        &mut self,
        batch: Self::ValidBatch,
        _batch_idx: usize,
    ) -> StepOutput<B::InnerBackend> {
        self.eval_stage(batch, Stage::Val)
    }

    fn test_step(&mut self, batch: Self::ValidBatch, _batch_idx: usize) -> StepOutput<B::InnerBackend> {
        self.eval_stage(batch, Stage::Test)
    }

    fn configure_optimizers(&self) -> ConfiguredOptimizer<B, M> {
        ConfiguredOptimizer::adam(&self.model, self.learning_rate)
    }

    fn on_epoch_end(&mut self, stage: Stage) {
        if self.accuracy_metric.seen() > 0 {
            let name = format!("{}/accuracy_epoch", stage.prefix());
            self.sink.log(&name, self.accuracy_metric.compute());
        }
        self.accuracy_metric.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ClassificationDataLoader, SyntheticDataset};
    use crate::model::SimpleCnn;
    use crate::training::logger::MemorySink;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::{Linear, LinearConfig};
    use std::sync::Arc;

    type InnerBackend = NdArray;
    type TestBackend = Autodiff<InnerBackend>;

    /// No mode-dependent layers, so train and eval passes compute the same thing.
    #[derive(Module, Debug)]
    struct FlatLinear<B: Backend> {
        head: Linear<B>,
    }

    impl<B: Backend> FlatLinear<B> {
        fn new(device: &B::Device, features: usize, num_classes: usize) -> Self {
            Self {
                head: LinearConfig::new(features, num_classes).init(device),
            }
        }
    }

    impl<B: Backend> Classifier<B> for FlatLinear<B> {
        fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
            let [batch_size, channels, height, width] = images.dims();
            self.head.forward(images.reshape([batch_size, channels * height * width]))
        }
    }

    fn batch<Bk: Backend>(device: &Bk::Device) -> ClassificationBatch<Bk> {
        let dataset = Arc::new(SyntheticDataset::new(6, 3, 8, 3, 11));
        ClassificationDataLoader::<Bk, _>::new(dataset, 6, None, device.clone())
            .next()
            .unwrap()
    }

    fn module(
        sink: MemorySink,
    ) -> ClassificationModule<TestBackend, SimpleCnn<TestBackend>> {
        let device = Default::default();
        let model = SimpleCnn::new(&device, 3, 3);
        ClassificationModule::new(model, 1e-3, &device).with_sink(sink)
    }

    #[test]
    fn test_step_returns_loss_and_accuracy() {
        let device = Default::default();
        let mut module = module(MemorySink::new());

        let output = module.step(batch::<TestBackend>(&device));

        let keys: Vec<&str> = output.info.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["loss", "accuracy"]);
        assert_eq!(output.loss.dims(), [1]);
        assert!(output.info.loss.is_finite());
        assert!((0.0..=1.0).contains(&output.info.accuracy));
    }

    #[test]
    fn test_phases_share_values_and_differ_in_prefix() {
        let device = Default::default();
        let sink = MemorySink::new();
        let model = FlatLinear::<TestBackend>::new(&device, 3 * 8 * 8, 3);
        let mut module = ClassificationModule::new(model, 1e-3, &device).with_sink(sink.clone());

        let train = module.training_step(batch::<TestBackend>(&device), 0).info;
        let val = module.validation_step(batch::<InnerBackend>(&device), 0).info;
        let test = module.test_step(batch::<InnerBackend>(&device), 0).info;

        assert!((train.loss - val.loss).abs() < 1e-6);
        assert_eq!(train.accuracy, val.accuracy);
        assert_eq!(val, test);
        assert_eq!(
            sink.names(),
            vec![
                "train/loss",
                "train/accuracy",
                "val/loss",
                "val/accuracy",
                "test/loss",
                "test/accuracy",
            ]
        );
        assert_eq!(sink.values("val/loss"), vec![val.loss]);
    }

    #[test]
    fn test_eval_steps_keep_batch_norm_statistics() {
        let device = Default::default();
        let mut module = module(MemorySink::new());
        let images = batch::<InnerBackend>(&device).images;

        let before = module.model().valid().forward(images.clone()).into_data();
        module.validation_step(batch::<InnerBackend>(&device), 0);
        module.test_step(batch::<InnerBackend>(&device), 0);
        let after = module.model().valid().forward(images).into_data();

        after.assert_eq(&before, true);
    }

    #[test]
    fn test_configure_optimizers() {
        let module = module(MemorySink::new());

        let optimizer = module.configure_optimizers();

        assert_eq!(optimizer.learning_rate(), 1e-3);
        assert_eq!(optimizer.num_params(), module.model().num_params());
        assert_eq!(module.learning_rate(), 1e-3);
    }

    #[test]
    fn test_forward_delegates_to_model() {
        let device = Default::default();
        let module = module(MemorySink::new());
        let images = batch::<TestBackend>(&device).images;

        let expected = module.model().forward(images.clone());
        let actual = module.forward(images);

        actual.into_data().assert_eq(&expected.into_data(), true);
    }

    #[test]
    fn test_epoch_end_logs_running_accuracy_and_resets() {
        let device = Default::default();
        let sink = MemorySink::new();
        let mut module = module(sink.clone());

        let first = module.validation_step(batch::<InnerBackend>(&device), 0).info.accuracy;
        let second = module.validation_step(batch::<InnerBackend>(&device), 1).info.accuracy;
        module.on_epoch_end(Stage::Val);

        let epoch = sink.values("val/accuracy_epoch");
        assert_eq!(epoch.len(), 1);
        assert!((epoch[0] - (first + second) / 2.0).abs() < 1e-9);
        assert_eq!(module.accuracy_metric().seen(), 0);
    }

    #[test]
    fn test_default_learning_rate() {
        let device = Default::default();
        let model = SimpleCnn::<NdArray>::new(&device, 3, 2);
        let module = ClassificationModule::new(model, DEFAULT_LEARNING_RATE, &device);

        assert_eq!(module.learning_rate(), 3e-4);
    }
}
