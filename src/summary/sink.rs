use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::summary::png;
use crate::summary::record::{Entry, Record};

/// Destination for summary entries; the visualization side reads whatever the
/// sink persists.
pub trait SummarySink {
    fn write(&mut self, entry: Entry) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Sink shared by every writer handle of a [`LogWriter`](crate::summary::LogWriter).
pub type SharedSink = Arc<Mutex<dyn SummarySink + Send>>;

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Vec<Entry>,
    flushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl SummarySink for MemorySink {
    fn write(&mut self, entry: Entry) -> Result<()> {
        self.entries.push(entry);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON-lines sink
// ---------------------------------------------------------------------------

/// Appends entries to `<logdir>/<mode>.jsonl`, one JSON object per line.
///
/// Entries are buffered and written once `sync_cycle` of them are pending.
/// Image samples are additionally rendered to
/// `<logdir>/<mode>/images/<tag>_<step>_<n>.png`, where each `/`-separated
/// part of the tag becomes a directory.
///
/// The JSON lines are the record of truth: a sample that fails to render is
/// logged and counted in [`JsonlSink::failed_images`] but never drops the
/// entries around it.
pub struct JsonlSink {
    logdir: PathBuf,
    sync_cycle: usize,
    pending: Vec<Entry>,
    failed_images: usize,
}

impl JsonlSink {
    pub fn create(logdir: impl AsRef<Path>, sync_cycle: usize) -> Result<Self> {
        if sync_cycle == 0 {
            return Err(Error::Config("sync_cycle must be at least 1".into()));
        }
        let logdir = logdir.as_ref().to_path_buf();
        fs::create_dir_all(&logdir)?;
        Ok(JsonlSink {
            logdir,
            sync_cycle,
            pending: Vec::new(),
            failed_images: 0,
        })
    }

    pub fn logdir(&self) -> &Path {
        &self.logdir
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Image samples that could not be rendered to PNG so far.
    pub fn failed_images(&self) -> usize {
        self.failed_images
    }

    /// Path of the JSON-lines file holding `mode`.
    pub fn records_path(&self, mode: &str) -> PathBuf {
        self.logdir.join(format!("{}.jsonl", escape_component(mode)))
    }

    /// Path of the `n`-th sample of the image record `tag` at `step`.
    pub fn image_path(&self, mode: &str, tag: &str, step: u64, n: usize) -> PathBuf {
        let mut path = self.logdir.join(escape_component(mode)).join("images");
        let mut parts = tag.split('/').map(escape_component).collect::<Vec<_>>();
        let stem = parts.pop().unwrap_or_default();
        path.extend(parts);
        path.join(format!("{stem}_{step}_{n}.png"))
    }

    fn append_lines(&self, mode: &str, entries: &[Entry]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.records_path(mode))?;
        let mut writer = BufWriter::new(file);
        for entry in entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_images(&mut self, entry: &Entry) {
        let Record::Image { step, samples } = &entry.record else {
            return;
        };
        for (n, sample) in samples.iter().enumerate() {
            let file = self.image_path(&entry.mode, &entry.tag, *step, n);
            let saved = match file.parent() {
                Some(dir) => fs::create_dir_all(dir)
                    .map_err(Error::from)
                    .and_then(|_| png::save_png(sample, &file)),
                None => png::save_png(sample, &file),
            };
            if let Err(e) = saved {
                self.failed_images += 1;
                log::warn!("'{}' step {step}: could not render sample {n}: {e}", entry.tag);
            }
        }
    }
}

impl SummarySink for JsonlSink {
    fn write(&mut self, entry: Entry) -> Result<()> {
        self.pending.push(entry);
        if self.pending.len() >= self.sync_cycle {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let total = self.pending.len();

        let mut by_mode: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
        for entry in std::mem::take(&mut self.pending) {
            by_mode.entry(entry.mode.clone()).or_default().push(entry);
        }

        let mut modes = by_mode.into_iter();
        while let Some((mode, entries)) = modes.next() {
            if let Err(e) = self.append_lines(&mode, &entries) {
                // keep what was not persisted for the next flush
                self.pending = entries
                    .into_iter()
                    .chain(modes.flat_map(|(_, rest)| rest))
                    .collect();
                return Err(e);
            }
            for entry in &entries {
                self.write_images(entry);
            }
        }

        log::debug!("flushed {total} summary entries to '{}'", self.logdir.display());
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("dropping unflushed summaries: {e}");
        }
    }
}

/// Maps a mode or tag part to one path component. ASCII letters, digits,
/// `-` and `_` are kept; every other byte becomes `%XX`, so distinct names
/// never share a path. The empty name maps to `%`.
fn escape_component(name: &str) -> String {
    if name.is_empty() {
        return "%".into();
    }
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::summary::histogram::Histogram;
    use crate::summary::record::ImageSample;

    #[test]
    fn escape_keeps_names_apart() {
        assert_eq!(escape_component("scalar0"), "scalar0");
        assert_eq!(escape_component("a b.c"), "a%20b%2Ec");
        assert_eq!(escape_component(".."), "%2E%2E");
        assert_ne!(escape_component("a/b"), escape_component("a_b"));
        assert_ne!(escape_component("a%2Fb"), escape_component("a/b"));
    }

    #[test]
    fn slash_and_underscore_tags_get_distinct_images() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::create(dir.path(), 1).unwrap();
        let nested = sink.image_path("train", "a/b", 0, 0);
        let flat = sink.image_path("train", "a_b", 0, 0);
        assert_ne!(nested, flat);
        assert_eq!(nested, dir.path().join("train/images/a/b_0_0.png"));
        assert_eq!(flat, dir.path().join("train/images/a_b_0_0.png"));
    }

    #[test]
    fn unrenderable_sample_keeps_the_rest_of_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::create(dir.path(), 3).unwrap();
        sink.write(Entry::new("train", "s", Record::Scalar { step: 0, value: 1.0 })).unwrap();
        let flat = ImageSample { shape: vec![4], data: vec![0.0, 0.5, 1.0, 0.5] };
        sink.write(Entry::new("train", "img", Record::Image { step: 0, samples: vec![flat] }))
            .unwrap();
        let histogram = Histogram::from_values(&[0.0, 0.5, 1.0, 0.5], 2);
        sink.write(Entry::new("train", "h", Record::Histogram { step: 0, histogram })).unwrap();

        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.failed_images(), 1);
        let text = fs::read_to_string(sink.records_path("train")).unwrap();
        let tags: Vec<String> = text
            .lines()
            .map(|line| serde_json::from_str::<Entry>(line).unwrap().tag)
            .collect();
        assert_eq!(tags, vec!["s", "img", "h"]);
    }

    #[test]
    fn failed_append_keeps_entries_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::create(dir.path(), 10).unwrap();
        // a directory where the records file should be makes the append fail
        fs::create_dir_all(sink.records_path("train")).unwrap();
        sink.write(Entry::new("train", "s", Record::Scalar { step: 0, value: 1.0 })).unwrap();
        sink.write(Entry::new("train", "s", Record::Scalar { step: 1, value: 1.0 })).unwrap();
        assert!(sink.flush().is_err());
        assert_eq!(sink.pending(), 2);

        fs::remove_dir(sink.records_path("train")).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.pending(), 0);
        let text = fs::read_to_string(sink.records_path("train")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn zero_sync_cycle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(JsonlSink::create(dir.path(), 0), Err(Error::Config(_))));
    }

    #[test]
    fn flushes_every_sync_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonlSink::create(dir.path(), 3).unwrap();
        let path = sink.records_path("train");
        for step in 0..2 {
            sink.write(Entry::new("train", "s", Record::Scalar { step, value: 1.0 })).unwrap();
        }
        assert_eq!(sink.pending(), 2);
        assert!(!path.exists());

        sink.write(Entry::new("train", "s", Record::Scalar { step: 2, value: 1.0 })).unwrap();
        assert_eq!(sink.pending(), 0);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn drop_flushes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut sink = JsonlSink::create(dir.path(), 100).unwrap();
            sink.write(Entry::new("test", "s", Record::Scalar { step: 0, value: 2.0 })).unwrap();
            sink.records_path("test")
        };
        let line = fs::read_to_string(path).unwrap();
        let entry: Entry = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(entry.record, Record::Scalar { step: 0, value: 2.0 });
    }
}
