pub mod dataloader;
pub mod dataset;
pub mod synthetic;

pub use dataloader::{ClassificationBatch, ClassificationDataLoader};
pub use dataset::{ClassificationDataset, ClassificationItem, ImageFolderDataset};
pub use synthetic::SyntheticDataset;
