use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use mnist_board::callback::{CallbackContext, EvalMetric};
use mnist_board::data::{encode_images, encode_labels, read_data};
use mnist_board::summary::{Entry, Record};
use mnist_board::{
    BatchIter, BoardConfig, Callbacks, DatasetPass, Dims, ImageHistogramCallback, ImageSet,
    LabelSet, LogWriter, ScalarCallback, Split, Trainer,
};

fn write_gz(path: &Path, bytes: &[u8]) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::fast());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap();
}

fn write_split(config: &BoardConfig, split: Split, count: usize) {
    let labels = LabelSet::new((0..count).map(|i| (i % 3) as u8).collect());
    let pixels = (0..count * 784).map(|i| (i % 251) as u8).collect();
    let images = ImageSet::from_raw(Dims::MNIST, pixels).unwrap();
    let (lbl, img) = config.split_paths(split);
    write_gz(&lbl, &encode_labels(&labels));
    write_gz(&img, &encode_images(&images));
}

fn read_entries(path: &Path) -> Vec<Entry> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn dataset_pass_writes_scalar_image_and_histogram_summaries() {
    let root = tempfile::tempdir().unwrap();
    let config = BoardConfig {
        data_dir: root.path().to_path_buf(),
        logdir: root.path().join("log"),
        batch_size: 4,
        seed: Some(3),
        sync_cycle: 3,
        num_buckets: 8,
        log_every: 0,
        ..BoardConfig::default()
    };
    write_split(&config, Split::Train, 10);
    write_split(&config, Split::Test, 4);

    let (lbl, img) = config.split_paths(Split::Train);
    let train = read_data(&lbl, &img).unwrap();
    let (lbl, img) = config.split_paths(Split::Test);
    let test = read_data(&lbl, &img).unwrap();

    let mut train_iter =
        BatchIter::new(&train, config.batch_size).unwrap().with_shuffle(config.seed);
    let mut val_iter = BatchIter::new(&test, config.batch_size).unwrap();

    let writer = LogWriter::create(&config.logdir, config.sync_cycle).unwrap();
    let scope = writer.mode(config.mode.as_str());
    let mut callbacks = Callbacks::with_context(CallbackContext::new())
        .on_batch_end(ScalarCallback::new(scope.scalar(config.scalar_tag.as_str())))
        .on_epoch_end(ImageHistogramCallback::new(
            scope.image(config.image_tag.as_str(), config.image_samples),
            scope.histogram(config.histogram_tag.as_str(), config.num_buckets),
            DatasetPass::PIXEL_MEAN,
            config.image_shape.clone(),
        ));

    let mut pass = DatasetPass::new(config.log_every);
    let report = pass
        .fit(&mut train_iter, Some(&mut val_iter), &config.fit, &mut callbacks)
        .unwrap();
    writer.flush().unwrap();

    assert_eq!(report.epochs.len(), 2);
    // 10 examples in batches of 4 with padding: 3 batches per epoch
    assert_eq!(callbacks.context.step(), 6);

    let entries = read_entries(&config.logdir.join("train.jsonl"));
    let scalar_steps: Vec<u64> = entries
        .iter()
        .filter(|e| e.tag == "scalars/scalar0")
        .map(|e| e.record.step())
        .collect();
    assert_eq!(scalar_steps, (0..6).collect::<Vec<_>>());

    let histograms: Vec<&Entry> =
        entries.iter().filter(|e| e.tag == "histogram/histogram0").collect();
    assert_eq!(histograms.len(), 2);
    for (epoch, entry) in histograms.iter().enumerate() {
        match &entry.record {
            Record::Histogram { step, histogram } => {
                assert_eq!(*step, epoch as u64);
                assert_eq!(histogram.total(), 784);
                assert!(histogram.min >= 0.0 && histogram.max <= 1.0);
            }
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    let images_dir = config.logdir.join("train").join("images").join("images");
    assert!(images_dir.join("image0_0_0.png").exists());
    assert!(images_dir.join("image0_1_0.png").exists());
}

#[test]
fn score_after_fit_uses_majority_class() {
    let labels = LabelSet::new(vec![2, 2, 2, 1]);
    let images = ImageSet::from_raw(Dims::MNIST, vec![0; 4 * 784]).unwrap();
    let dataset = mnist_board::Dataset::new(labels, &images).unwrap();

    let mut pass = DatasetPass::new(0);
    let mut train = BatchIter::new(&dataset, 2).unwrap();
    let config = mnist_board::FitConfig { num_epoch: 1, ..Default::default() };
    pass.fit(&mut train, None, &config, &mut Callbacks::new()).unwrap();
    assert_eq!(pass.majority_class(), 2);

    let mut acc = mnist_board::callback::Accuracy::default();
    pass.score(&mut BatchIter::new(&dataset, 3).unwrap(), &mut acc).unwrap();
    let (_, value) = acc.name_value().remove(0);
    assert!((value - 0.75).abs() < 1e-12);
}

#[test]
fn empty_training_split_still_writes_epoch_summaries() {
    let root = tempfile::tempdir().unwrap();
    let config = BoardConfig {
        data_dir: root.path().to_path_buf(),
        logdir: root.path().join("log"),
        log_every: 0,
        ..BoardConfig::default()
    };
    write_split(&config, Split::Train, 0);
    let (lbl, img) = config.split_paths(Split::Train);
    let train = read_data(&lbl, &img).unwrap();
    assert!(train.is_empty());

    let writer = LogWriter::create(&config.logdir, 1).unwrap();
    let scope = writer.mode("train");
    let mut callbacks = Callbacks::new().on_epoch_end(ImageHistogramCallback::new(
        scope.image("images/image0", 1),
        scope.histogram("histogram/histogram0", 4),
        DatasetPass::PIXEL_MEAN,
        vec![28, 28],
    ));

    let mut iter = BatchIter::new(&train, 4).unwrap();
    let fit = mnist_board::FitConfig { num_epoch: 1, ..Default::default() };
    let report = DatasetPass::new(0).fit(&mut iter, None, &fit, &mut callbacks).unwrap();
    writer.flush().unwrap();

    assert_eq!(report.epochs[0].batches, 0);
    let entries = read_entries(&config.logdir.join("train.jsonl"));
    assert_eq!(entries.len(), 2);
    match &entries[1].record {
        Record::Histogram { histogram, .. } => assert_eq!(histogram.total(), 784),
        other => panic!("expected histogram, got {other:?}"),
    }
}
