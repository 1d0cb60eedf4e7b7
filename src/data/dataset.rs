use anyhow::{Context, Result};
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One decoded sample: CHW pixels in `[0, 1]` and its class index.
#[derive(Debug, Clone)]
pub struct ClassificationItem {
    pub pixels: Vec<f32>,
    pub label: usize,
}

pub trait ClassificationDataset: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Side length of the square images this dataset yields.
    fn image_size(&self) -> usize;

    fn channels(&self) -> usize;

    fn get(&self, idx: usize) -> Result<ClassificationItem>;
}

/// Images laid out one directory per class:
///
/// ```text
/// root/
/// ├── train/
/// │   ├── cat/*.png
/// │   └── dog/*.jpg
/// ├── val/
/// └── test/
/// ```
///
/// Class indices follow the sorted class directory names.
#[derive(Debug, Clone)]
pub struct ImageFolderDataset {
    samples: Vec<(PathBuf, usize)>,
    pub class_names: Vec<String>,
    pub img_size: usize,
}

impl ImageFolderDataset {
    pub fn new(root: impl AsRef<Path>, split: &str, img_size: usize) -> Result<Self> {
        let split_name = match split.to_lowercase().as_str() {
            "train" => "train",
            "val" => "val",
            "test" => "test",
            _ => anyhow::bail!("unknown split: {split}. Use 'train', 'val' or 'test'"),
        };

        let split_dir = root.as_ref().join(split_name);
        if !split_dir.is_dir() {
            anyhow::bail!("split directory not found: {}", split_dir.display());
        }

        let mut class_names = std::fs::read_dir(&split_dir)
            .with_context(|| format!("reading {}", split_dir.display()))?
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect::<Vec<_>>();
        class_names.sort();

        let mut samples = Vec::new();
        for (class_id, class_name) in class_names.iter().enumerate() {
            let class_dir = split_dir.join(class_name);

            let mut images = WalkDir::new(&class_dir)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.into_path())
                .filter(|path| path.is_file() && is_image(path))
                .collect::<Vec<_>>();
            images.sort();

            samples.extend(images.into_iter().map(|path| (path, class_id)));
        }

        if samples.is_empty() {
            anyhow::bail!("no images found under {}", split_dir.display());
        }

        log::info!(
            "Loaded {} {} samples across {} classes",
            samples.len(),
            split_name,
            class_names.len()
        );

        Ok(Self {
            samples,
            class_names,
            img_size,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

impl ClassificationDataset for ImageFolderDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn image_size(&self) -> usize {
        self.img_size
    }

    fn channels(&self) -> usize {
        3
    }

    fn get(&self, idx: usize) -> Result<ClassificationItem> {
        let (img_path, label) = self.samples.get(idx).with_context(|| {
            format!(
                "index {} out of bounds. Dataset has {} samples",
                idx,
                self.samples.len()
            )
        })?;

        let img = image::open(img_path)
            .with_context(|| format!("decoding {}", img_path.display()))?
            .resize_exact(
                self.img_size as u32,
                self.img_size as u32,
                FilterType::Lanczos3,
            );
        let rgb_img = img.to_rgb8();

        let mut pixels = Vec::with_capacity(3 * self.img_size * self.img_size);
        for c in 0..3 {
            for y in 0..self.img_size {
                for x in 0..self.img_size {
                    let pixel = rgb_img.get_pixel(x as u32, y as u32);
                    pixels.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        Ok(ClassificationItem {
            pixels,
            label: *label,
        })
    }
}
