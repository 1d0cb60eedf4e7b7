use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Destination for scalar metrics logged as `log(name, value)`.
pub trait MetricSink: Send {
    fn log(&mut self, name: &str, value: f64);

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub step: usize,
    pub name: String,
    pub value: f64,
}

/// Forwards every metric to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricSink for LogSink {
    fn log(&mut self, name: &str, value: f64) {
        log::info!(target: "samogonka::metrics", "{name}={value:.6}");
    }
}

/// Keeps every entry in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.name).collect()
    }

    pub fn values(&self, name: &str) -> Vec<f64> {
        self.entries()
            .into_iter()
            .filter(|e| e.name == name)
            .map(|e| e.value)
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl MetricSink for MemorySink {
    fn log(&mut self, name: &str, value: f64) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let step = entries.len();
        entries.push(LogEntry {
            step,
            name: name.to_string(),
            value,
        });
    }
}

/// One JSON object per line: `{"step":0,"name":"train/loss","value":1.23}`.
pub struct JsonLinesSink {
    writer: BufWriter<File>,
    step: usize,
}

impl JsonLinesSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)
            .with_context(|| format!("creating metrics file {}", path.display()))?;

        Ok(Self {
            writer: BufWriter::new(file),
            step: 0,
        })
    }

    fn write_entry(&mut self, entry: &LogEntry) -> Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl MetricSink for JsonLinesSink {
    fn log(&mut self, name: &str, value: f64) {
        let entry = LogEntry {
            step: self.step,
            name: name.to_string(),
            value,
        };
        self.step += 1;

        if let Err(e) = self.write_entry(&entry) {
            log::warn!("Failed to write metric {}: {:#}", name, e);
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("flushing metrics file")
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Sends each entry to every inner sink in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn MetricSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl MetricSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl MetricSink for MultiSink {
    fn log(&mut self, name: &str, value: f64) {
        for sink in &mut self.sinks {
            sink.log(name, value);
        }
    }

    fn flush(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_clones_share_entries() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        writer.log("train/loss", 0.5);
        writer.log("train/accuracy", 1.0);

        assert_eq!(sink.names(), vec!["train/loss", "train/accuracy"]);
        assert_eq!(sink.values("train/loss"), vec![0.5]);
        assert_eq!(sink.entries()[1].step, 1);

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_json_lines_sink() {
        let path = std::env::temp_dir().join(format!("samogonka-metrics-{}.jsonl", std::process::id()));

        {
            let mut sink = JsonLinesSink::create(&path).unwrap();
            sink.log("val/loss", 0.25);
            sink.log("val/accuracy", 0.75);
            sink.flush().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<LogEntry> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(
            entries,
            vec![
                LogEntry { step: 0, name: "val/loss".into(), value: 0.25 },
                LogEntry { step: 1, name: "val/accuracy".into(), value: 0.75 },
            ]
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        let mut sink = MultiSink::new().with(first.clone()).with(second.clone());

        sink.log("test/loss", 2.0);

        assert_eq!(first.values("test/loss"), vec![2.0]);
        assert_eq!(second.values("test/loss"), vec![2.0]);
    }
}
