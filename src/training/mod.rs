pub mod config;
pub mod logger;
pub mod metrics;
pub mod module;
pub mod optimizer;
pub mod trainer;

pub use config::TrainingConfig;
pub use logger::{JsonLinesSink, LogEntry, LogSink, MemorySink, MetricSink, MultiSink};
pub use metrics::Accuracy;
pub use module::{
    ClassificationModule, Stage, StepInfo, StepOutput, TrainingModule, DEFAULT_LEARNING_RATE,
};
pub use optimizer::ConfiguredOptimizer;
pub use trainer::{EpochSummary, Trainer};
