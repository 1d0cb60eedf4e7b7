use crate::training::module::DEFAULT_LEARNING_RATE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    // Dataset
    /// Image-folder root with `train/`, `val/` and `test/`. Synthetic data when unset.
    pub data_dir: Option<String>,
    pub image_size: usize,
    pub channels: usize,
    pub num_classes: usize,
    pub synthetic_samples: usize,

    // Training
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub shuffle: bool,
    pub seed: u64,

    // Logging
    pub metrics_file: Option<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            image_size: 32,
            channels: 3,
            num_classes: 10,
            synthetic_samples: 256,
            epochs: 10,
            batch_size: 32,
            learning_rate: DEFAULT_LEARNING_RATE,
            shuffle: true,
            seed: 42,
            metrics_file: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_yaml(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        let config: TrainingConfig =
            serde_yaml::from_str(&content).with_context(|| format!("parsing config {path}"))?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).with_context(|| format!("writing config {path}"))?;
        Ok(())
    }
}
