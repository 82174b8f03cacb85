//! JSON lines output for batch events.
//!
//! Writes each `BatchEvent` as one JSON object per line, stamped with the
//! Unix time it was written, for consumption by external tools.

use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::BatchEvent;

#[derive(Serialize)]
struct Stamped<'a> {
    timestamp: u64,
    #[serde(flatten)]
    event: &'a BatchEvent,
}

/// Writes events as JSON lines to any writer (stdout by default).
pub struct JsonEventWriter {
    output: Box<dyn Write + Send>,
}

impl JsonEventWriter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self { output: writer }
    }

    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    pub fn write(&mut self, event: &BatchEvent) -> io::Result<()> {
        let stamped = Stamped {
            timestamp: Self::timestamp(),
            event,
        };
        let line = serde_json::to_string(&stamped).map_err(io::Error::other)?;
        writeln!(self.output, "{line}")?;
        self.output.flush()
    }
}

impl Default for JsonEventWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_one_line_per_event() {
        let buf = SharedBuf::default();
        let mut writer = JsonEventWriter::with_writer(Box::new(buf.clone()));

        writer.write(&BatchEvent::AggregateProgress { percent: 42 }).unwrap();
        writer
            .write(&BatchEvent::Info {
                message: "created output directory".into(),
            })
            .unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "aggregate_progress");
        assert_eq!(first["percent"], 42);
        assert!(first["timestamp"].as_u64().is_some());
    }
}
