pub mod data;
pub mod model;
pub mod training;

// Re-exports for convenience
pub use data::{ClassificationBatch, ClassificationDataLoader, ImageFolderDataset, SyntheticDataset};
pub use model::{Classifier, SimpleCnn};
pub use training::{ClassificationModule, Trainer, TrainingConfig, TrainingModule};
