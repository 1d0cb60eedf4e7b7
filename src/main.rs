use anyhow::Result;
use burn::backend::{Autodiff, NdArray};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use samogonka::data::{
    ClassificationDataLoader, ClassificationDataset, ImageFolderDataset, SyntheticDataset,
};
use samogonka::model::SimpleCnn;
use samogonka::training::{
    ClassificationModule, JsonLinesSink, LogSink, MultiSink, Trainer, TrainingConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

type MyBackend = NdArray;
type MyAutodiffBackend = Autodiff<MyBackend>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train an image classifier")]
struct Args {
    /// YAML training config
    #[arg(short, long)]
    config: Option<String>,

    #[arg(short, long)]
    epochs: Option<usize>,

    #[arg(short, long)]
    learning_rate: Option<f64>,

    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Image-folder root containing train/, val/ and test/
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Write every logged metric as JSON lines
    #[arg(short, long)]
    metrics_file: Option<String>,
}

fn load_config(args: &Args) -> Result<TrainingConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading config from {}", path);
            TrainingConfig::from_yaml(path)?
        }
        None => TrainingConfig::default(),
    };

    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(learning_rate) = args.learning_rate {
        config.learning_rate = learning_rate;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.data_dir.is_some() {
        config.data_dir = args.data_dir.clone();
    }
    if args.metrics_file.is_some() {
        config.metrics_file = args.metrics_file.clone();
    }

    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    log::info!(
        "epochs={} batch_size={} learning_rate={} image_size={}",
        config.epochs,
        config.batch_size,
        config.learning_rate,
        config.image_size
    );

    match config.data_dir.clone() {
        Some(dir) => {
            let root = Path::new(&dir);
            let train = ImageFolderDataset::new(root, "train", config.image_size)?;
            let val = ImageFolderDataset::new(root, "val", config.image_size)?;
            let test = ImageFolderDataset::new(root, "test", config.image_size)?;
            let num_classes = train.num_classes();

            run(config, Arc::new(train), Arc::new(val), Arc::new(test), num_classes)
        }
        None => {
            log::warn!("No data directory configured, training on synthetic data");

            let synthetic = |samples: usize, seed: u64| {
                Arc::new(SyntheticDataset::new(
                    samples,
                    config.num_classes,
                    config.image_size,
                    config.channels,
                    seed,
                ))
            };
            let eval_samples = (config.synthetic_samples / 4).max(1);
            let train = synthetic(config.synthetic_samples, config.seed);
            let val = synthetic(eval_samples, config.seed.wrapping_add(1_000_000));
            let test = synthetic(eval_samples, config.seed.wrapping_add(2_000_000));
            let num_classes = config.num_classes;

            run(config, train, val, test, num_classes)
        }
    }
}

fn run<D: ClassificationDataset>(
    config: TrainingConfig,
    train: Arc<D>,
    val: Arc<D>,
    test: Arc<D>,
    num_classes: usize,
) -> Result<()> {
    let device = Default::default();

    let mut sink = MultiSink::new().with(LogSink);
    if let Some(path) = &config.metrics_file {
        sink = sink.with(JsonLinesSink::create(path)?);
    }

    let model = SimpleCnn::<MyAutodiffBackend>::new(&device, train.channels(), num_classes);
    let module = ClassificationModule::new(model, config.learning_rate, &device).with_sink(sink);
    let mut trainer = Trainer::new(module);

    let train_loader = |shuffle: Option<u64>| {
        ClassificationDataLoader::<MyAutodiffBackend, D>::new(
            train.clone(),
            config.batch_size,
            shuffle,
            device.clone(),
        )
    };
    // evaluation runs on the inner backend with `valid()` models
    let eval_loader = |dataset: &Arc<D>| {
        ClassificationDataLoader::<MyBackend, D>::new(
            dataset.clone(),
            config.batch_size,
            None,
            device.clone(),
        )
    };

    let pb = ProgressBar::new(config.epochs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?,
    );

    for epoch in 1..=config.epochs {
        let epoch_start = Instant::now();
        let shuffle = config.shuffle.then(|| config.seed.wrapping_add(epoch as u64));

        let train_summary = trainer.train_epoch(train_loader(shuffle));
        let val_summary = trainer.validate(eval_loader(&val));

        pb.set_message(format!(
            "train loss={:.4} val loss={:.4} val acc={:.3}",
            train_summary.loss, val_summary.loss, val_summary.accuracy
        ));
        pb.inc(1);

        log::info!(
            "Epoch {}/{}: train loss={:.4} acc={:.3} | val loss={:.4} acc={:.3} ({:.2}s)",
            epoch,
            config.epochs,
            train_summary.loss,
            train_summary.accuracy,
            val_summary.loss,
            val_summary.accuracy,
            epoch_start.elapsed().as_secs_f32()
        );
    }

    pb.finish_with_message("Training completed");

    let test_summary = trainer.test(eval_loader(&test));
    log::info!(
        "Test: loss={:.4} acc={:.3} over {} batches",
        test_summary.loss,
        test_summary.accuracy,
        test_summary.batches
    );

    trainer.module.sink_mut().flush()?;
    Ok(())
}
