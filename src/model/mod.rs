pub mod blocks;
pub mod classifier;

pub use blocks::{ConvBlock, ConvBlockConfig};
pub use classifier::{Classifier, SimpleCnn};
