use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines trace of render decisions, enabled per renderer with a path.
/// Cloning shares the same file.
#[derive(Clone)]
pub struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: BTreeMap<String, u64>,
}

impl std::fmt::Debug for DebugLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugLogger").finish_non_exhaustive()
    }
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: BTreeMap::new(),
            })),
        })
    }

    /// Writes one record `{"type": event, ...fields}`. Non-object `fields`
    /// land under a `"value"` key.
    pub fn log(&self, event: &str, fields: Value) {
        let mut record = Map::new();
        record.insert("type".to_string(), Value::String(event.to_string()));
        match fields {
            Value::Object(map) => record.extend(map),
            Value::Null => {}
            other => {
                record.insert("value".to_string(), other);
            }
        }
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{}", Value::Object(record));
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    /// Writes the accumulated counters and resets them.
    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let counters = std::mem::take(&mut state.counters);
            let record = json!({
                "type": "debug.summary",
                "context": context,
                "counts": counters,
            });
            let _ = writeln!(state.writer, "{record}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_json_lines_with_sorted_counters() {
        let path = std::env::temp_dir().join(format!(
            "quotedoc-debug-{}.jsonl",
            std::process::id()
        ));
        let logger = DebugLogger::new(&path).unwrap();
        logger.log("layout.page", json!({ "index": 0, "rows": 8 }));
        logger.log("font.fallback", json!("Helvetica"));
        logger.increment("pages", 1);
        logger.increment("fallbacks", 2);
        logger.increment("pages", 1);
        logger.emit_summary("render");
        logger.flush();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "layout.page");
        assert_eq!(lines[0]["rows"], 8);
        assert_eq!(lines[1]["value"], "Helvetica");
        assert_eq!(lines[2]["counts"]["pages"], 2);
        let keys: Vec<&String> = lines[2]["counts"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["fallbacks", "pages"]);
        let _ = std::fs::remove_file(&path);
    }
}
