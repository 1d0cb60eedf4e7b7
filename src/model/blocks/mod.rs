pub mod conv;

pub use conv::{ConvBlock, ConvBlockConfig};
