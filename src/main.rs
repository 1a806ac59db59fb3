//! mnist-board
//!
//! Decodes the MNIST IDX files and writes scalar, image and histogram
//! summaries for a visualization tool to pick up.
//!
//! Run with:
//!   cargo run --release -- --data-dir data inspect
//!   cargo run --release -- --data-dir data --logdir ./log summarize --epochs 2
//!   cargo run --release -- init-config board.json

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use mnist_board::callback::{format_name_value, metric_from_name};
use mnist_board::data::{read_data_with_dims, Dataset};
use mnist_board::{
    BatchIter, BoardConfig, Callbacks, DatasetPass, ImageHistogramCallback, LogWriter,
    ScalarCallback, Split, Trainer,
};

#[derive(Parser)]
#[command(name = "mnist-board", version, about)]
struct Cli {
    /// JSON config file; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the four IDX files.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory summaries are written to.
    #[arg(long, global = true)]
    logdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode both splits and report their contents.
    Inspect,
    /// Walk the training data with summary callbacks attached.
    Summarize {
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write the default configuration to FILE.
    InitConfig { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Command::Inspect => inspect(&config),
        Command::Summarize { .. } => {
            config.validate()?;
            summarize(&config)
        }
        Command::InitConfig { path } => {
            config
                .save_json(&path)
                .with_context(|| format!("writing config '{}'", path.display()))?;
            log::info!("wrote default config to '{}'", path.display());
            Ok(())
        }
    }
}

/// Config file (or defaults), then the global flags, then the flags of the
/// subcommand.
fn resolve_config(cli: &Cli) -> anyhow::Result<BoardConfig> {
    let mut config = match &cli.config {
        Some(path) => BoardConfig::load_json(path)
            .with_context(|| format!("loading config '{}'", path.display()))?,
        None => BoardConfig::default(),
    };
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut BoardConfig, cli: &Cli) {
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.logdir {
        config.logdir = dir.clone();
    }
    if let Command::Summarize { epochs, batch_size, seed } = &cli.command {
        if let Some(epochs) = *epochs {
            config.fit.num_epoch = epochs;
        }
        if let Some(batch_size) = *batch_size {
            config.batch_size = batch_size;
        }
        if seed.is_some() {
            config.seed = *seed;
        }
    }
}

fn load_split(config: &BoardConfig, split: Split) -> anyhow::Result<Dataset> {
    let (labels, images) = config.split_paths(split);
    let dataset = read_data_with_dims(&labels, &images, config.dims())
        .with_context(|| format!("loading {split} split from '{}'", config.data_dir.display()))?;
    log::info!("{split} split: {} examples of {}", dataset.len(), config.dims());
    Ok(dataset)
}

fn inspect(config: &BoardConfig) -> anyhow::Result<()> {
    for split in [Split::Train, Split::Test] {
        let dataset = load_split(config, split)?;
        let images = dataset.images().as_slice();
        let mean = if images.is_empty() {
            0.0
        } else {
            images.iter().map(|&v| v as f64).sum::<f64>() / images.len() as f64
        };
        println!(
            "{split}: {} examples, shape {:?}, mean intensity {mean:.4}",
            dataset.len(),
            dataset.images().shape()
        );
        for (class, count) in dataset.labels().class_counts().iter().enumerate() {
            println!("  class {class:>3}: {count}");
        }
    }
    Ok(())
}

fn summarize(config: &BoardConfig) -> anyhow::Result<()> {
    let train = load_split(config, Split::Train)?;
    let test = load_split(config, Split::Test)?;

    let mut train_iter =
        BatchIter::new(&train, config.batch_size)?.with_last_batch(config.last_batch);
    if config.shuffle {
        train_iter = train_iter.with_shuffle(config.seed);
    }
    let mut val_iter = BatchIter::new(&test, config.batch_size)?.with_last_batch(config.last_batch);

    let writer = LogWriter::create(&config.logdir, config.sync_cycle)
        .with_context(|| format!("creating log directory '{}'", config.logdir.display()))?;
    let scope = writer.mode(config.mode.as_str());
    let mut callbacks = Callbacks::new()
        .on_batch_end(ScalarCallback::new(scope.scalar(config.scalar_tag.as_str())))
        .on_epoch_end(ImageHistogramCallback::new(
            scope.image(config.image_tag.as_str(), config.image_samples),
            scope.histogram(config.histogram_tag.as_str(), config.num_buckets),
            config.image_param.as_str(),
            config.image_shape.clone(),
        ));

    let mut trainer = DatasetPass::new(config.log_every);
    let report = trainer.fit(&mut train_iter, Some(&mut val_iter), &config.fit, &mut callbacks)?;

    let mut metric = metric_from_name(&config.fit.eval_metric)?;
    let mut test_iter = BatchIter::new(&test, config.batch_size)?;
    trainer.score(&mut test_iter, &mut *metric)?;
    println!("test {}", format_name_value(&metric.name_value()));

    writer.flush()?;
    log::info!(
        "wrote {} epochs, {} scalar steps to '{}'",
        report.epochs.len(),
        callbacks.context.step(),
        config.logdir.display()
    );
    Ok(())
}
