/// Lightweight span log for cluster operations.
///
/// Spans record named intervals with optional parent links and string tags.
/// The log is append-only up to a capacity cap; at capacity the oldest spans
/// are dropped. All operations are a single short Mutex hold, so tracing
/// never stalls the search path.
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::core::errors::{ErrorCode, Result, SwarmError};

pub type SpanId = u64;

const DEFAULT_MAX_SPANS: usize = 1000;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Span {
    pub id: SpanId,
    pub name: String,
    pub parent_id: Option<SpanId>,
    /// Unix microseconds at span start
    pub start_us: u64,
    /// None while the span is open
    pub duration_us: Option<u64>,
    pub tags: Vec<(String, String)>,
}

fn unix_now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

pub struct Tracer {
    spans: Mutex<VecDeque<Span>>,
    next_id: AtomicU64,
    max_spans: usize,
}

impl Tracer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SPANS)
    }

    /// Capacity is clamped to at least 1: the retention loop always keeps
    /// the newest span.
    pub fn with_capacity(max_spans: usize) -> Self {
        let max_spans = max_spans.max(1);
        Tracer {
            spans: Mutex::new(VecDeque::with_capacity(max_spans.min(DEFAULT_MAX_SPANS))),
            next_id: AtomicU64::new(1),
            max_spans,
        }
    }

    /// Open a span. Ids are unique for the lifetime of the tracer.
    pub fn start_span(&self, name: impl Into<String>, parent: Option<SpanId>) -> SpanId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let span = Span {
            id,
            name: name.into(),
            parent_id: parent,
            start_us: unix_now_us(),
            duration_us: None,
            tags: Vec::new(),
        };

        let mut spans = self.spans.lock();
        if spans.len() >= self.max_spans {
            spans.pop_front();
        }
        spans.push_back(span);
        id
    }

    /// Close a span, recording its duration. Closing an unknown or already
    /// evicted id is a no-op.
    pub fn finish_span(&self, id: SpanId) {
        let now = unix_now_us();
        let mut spans = self.spans.lock();
        if let Some(span) = spans.iter_mut().rev().find(|s| s.id == id) {
            if span.duration_us.is_none() {
                span.duration_us = Some(now.saturating_sub(span.start_us));
            }
        }
    }

    /// Attach a key/value tag to a span. Unknown ids are ignored.
    pub fn add_tag(&self, id: SpanId, key: impl Into<String>, value: impl Into<String>) {
        let mut spans = self.spans.lock();
        if let Some(span) = spans.iter_mut().rev().find(|s| s.id == id) {
            span.tags.push((key.into(), value.into()));
        }
    }

    /// Snapshot of the retained spans, oldest first.
    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.lock().is_empty()
    }

    pub fn clear(&self) {
        self.spans.lock().clear();
    }

    /// Write the retained spans to `path` as a JSON array.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let spans = self.spans();
        let file = File::create(path).map_err(|e| SwarmError::StorageError {
            code: ErrorCode::StorageIOError,
            message: format!("trace export create error: {}", e),
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &spans).map_err(|e| SwarmError::StorageError {
            code: ErrorCode::StorageIOError,
            message: format!("trace export serialize error: {}", e),
        })?;
        Ok(())
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_finish_records_duration() {
        let tracer = Tracer::new();
        let id = tracer.start_span("search", None);
        tracer.finish_span(id);

        let spans = tracer.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "search");
        assert!(spans[0].duration_us.is_some());
    }

    #[test]
    fn test_parent_links_and_tags() {
        let tracer = Tracer::new();
        let root = tracer.start_span("parallel_search", None);
        let child = tracer.start_span("shard_search", Some(root));
        tracer.add_tag(child, "shard_id", "2");
        tracer.finish_span(child);
        tracer.finish_span(root);

        let spans = tracer.spans();
        assert_eq!(spans[1].parent_id, Some(root));
        assert_eq!(spans[1].tags, vec![("shard_id".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let tracer = Tracer::with_capacity(3);
        for i in 0..5 {
            tracer.start_span(format!("span_{}", i), None);
        }
        let spans = tracer.spans();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].name, "span_2");
        assert_eq!(spans[2].name, "span_4");
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let tracer = Tracer::with_capacity(0);
        tracer.start_span("first", None);
        tracer.start_span("second", None);

        let spans = tracer.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "second");
    }

    #[test]
    fn test_finish_unknown_span_is_noop() {
        let tracer = Tracer::new();
        tracer.finish_span(999);
        assert!(tracer.is_empty());
    }

    #[test]
    fn test_export_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");

        let tracer = Tracer::new();
        let id = tracer.start_span("search", None);
        tracer.add_tag(id, "k", "10");
        tracer.finish_span(id);
        tracer.export_json(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let array = parsed.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0]["name"], "search");
    }
}
