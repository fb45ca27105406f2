//! Incremental NDJSON frame parser for the search event stream.
//!
//! The backend writes one JSON object per line. Transport reads do not line
//! up with those boundaries, so the parser buffers partial input across
//! [`push`](FrameParser::push) calls and only decodes complete lines. A line
//! that fails to decode is counted, logged, and skipped; it never aborts
//! the stream.
//!
//! # Wire shapes
//!
//! ```text
//! {"type":"progress","source":"Ripley","outcome":"✓","resultCount":12,"elapsedSeconds":3.4,"completed":1,"total":9}
//! {"type":"results","results":[{"name":"...","price":199.9,"source":"ripley","detailUrl":"..."}]}
//! ```
//!
//! The legacy backend field names (`store`, `status`, `resultados`, `tiempo`,
//! `nombre`, `precio`, `tienda`, `descuento`, `imagen`, `link`) are accepted
//! as aliases. The backend's own `completed` counter is ignored; completion
//! is derived from the settled sources instead.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, SearchError};
use crate::models::{Outcome, ResultItem, SourceId};

/// Success marker the backend sends in `outcome` for a store that answered.
pub const DEFAULT_SUCCESS_MARKER: &str = "✓";

/// Upper bound on an unterminated line held between reads.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// A progress report for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub source: SourceId,
    /// Name as the backend spelled it, used for sources outside the catalog.
    pub display_name: String,
    pub outcome: Outcome,
    pub detail: Option<String>,
    pub result_count: u64,
    pub elapsed_seconds: f64,
    pub total: Option<u64>,
}

/// One decoded event record.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Progress(Progress),
    FinalResults(Vec<ResultItem>),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireFrame {
    Progress(WireProgress),
    Results(WireResults),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProgress {
    #[serde(alias = "store")]
    source: String,
    #[serde(alias = "status")]
    outcome: String,
    #[serde(default, alias = "resultados")]
    result_count: u64,
    #[serde(default, alias = "tiempo")]
    elapsed_seconds: f64,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Deserialize)]
struct WireResults {
    #[serde(default)]
    results: Vec<WireItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    #[serde(alias = "nombre")]
    name: String,
    #[serde(alias = "precio")]
    price: f64,
    #[serde(alias = "tienda")]
    source: String,
    #[serde(default, alias = "descuento")]
    discount_percent: Option<f64>,
    #[serde(default, alias = "imagen")]
    image_url: Option<String>,
    #[serde(default, alias = "link")]
    detail_url: String,
}

impl WireItem {
    fn into_item(self) -> Option<ResultItem> {
        if !self.price.is_finite() || self.price < 0.0 {
            warn!(name = %self.name, price = self.price, "skipping result item with invalid price");
            return None;
        }
        Some(ResultItem {
            name: self.name,
            price: self.price,
            source: SourceId::new(&self.source),
            discount_percent: self
                .discount_percent
                .filter(|d| d.is_finite())
                .map(|d| d.round() as i64),
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            detail_url: self.detail_url,
        })
    }
}

/// Buffers raw stream bytes and yields complete [`Frame`]s.
#[derive(Debug)]
pub struct FrameParser {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for a newline.
    scan_from: usize,
    success_marker: String,
    max_frame_bytes: usize,
    /// Set after an overlong line was dropped; the rest of it is skipped
    /// up to the next newline.
    discarding: bool,
    finished: bool,
    decode_errors: u64,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            scan_from: 0,
            success_marker: DEFAULT_SUCCESS_MARKER.to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            discarding: false,
            finished: false,
            decode_errors: 0,
        }
    }

    pub fn with_success_marker(mut self, marker: impl Into<String>) -> Self {
        self.success_marker = marker.into();
        self
    }

    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Number of lines dropped because they could not be decoded.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Feed one raw chunk and return every frame it completes.
    ///
    /// Returns nothing once [`finish`](Self::finish) has been called.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        let mut scan = self.scan_from;
        while let Some(rel) = self.buffer[scan..].iter().position(|b| *b == b'\n') {
            let end = scan + rel;
            if self.discarding {
                self.discarding = false;
            } else {
                decode_line(
                    &self.buffer[start..end],
                    &self.success_marker,
                    &mut self.decode_errors,
                    &mut frames,
                );
            }
            start = end + 1;
            scan = start;
        }
        self.buffer.drain(..start);
        self.scan_from = self.buffer.len();

        if self.buffer.len() > self.max_frame_bytes {
            // Count a dropped line once, however many reads it spans.
            if !self.discarding {
                self.decode_errors += 1;
                warn!(
                    buffered = self.buffer.len(),
                    limit = self.max_frame_bytes,
                    "dropping overlong frame"
                );
            }
            self.buffer.clear();
            self.scan_from = 0;
            self.discarding = true;
        }
        frames
    }

    /// Signal end of stream, decoding any trailing unterminated line.
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let rest = std::mem::take(&mut self.buffer);
        self.scan_from = 0;
        let mut frames = Vec::new();
        if !self.discarding {
            decode_line(
                &rest,
                &self.success_marker,
                &mut self.decode_errors,
                &mut frames,
            );
        }
        frames
    }
}

fn decode_line(line: &[u8], success_marker: &str, errors: &mut u64, frames: &mut Vec<Frame>) {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return;
    }
    match decode_frame(trimmed, success_marker) {
        Ok(frame) => frames.push(frame),
        Err(e) => {
            *errors += 1;
            warn!(error = %e, "skipping undecodable frame");
        }
    }
}

/// Decode one complete line into a [`Frame`].
pub fn decode_frame(line: &[u8], success_marker: &str) -> Result<Frame> {
    let text = std::str::from_utf8(line)
        .map_err(|e| SearchError::FrameDecode(format!("invalid UTF-8: {}", e)))?;
    let wire: WireFrame =
        serde_json::from_str(text).map_err(|e| SearchError::FrameDecode(e.to_string()))?;

    let frame = match wire {
        WireFrame::Progress(p) => {
            let ok = p.outcome == success_marker;
            Frame::Progress(Progress {
                source: SourceId::new(&p.source),
                display_name: p.source,
                outcome: if ok { Outcome::Ok } else { Outcome::Failed },
                detail: if ok { None } else { Some(p.outcome) },
                result_count: p.result_count,
                elapsed_seconds: p.elapsed_seconds.max(0.0),
                total: p.total,
            })
        }
        WireFrame::Results(r) => {
            let received = r.results.len();
            let items: Vec<ResultItem> =
                r.results.into_iter().filter_map(WireItem::into_item).collect();
            debug!(received, kept = items.len(), "decoded results frame");
            Frame::FinalResults(items)
        }
    };
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRESS: &str = r#"{"type":"progress","source":"Ripley","outcome":"✓","resultCount":12,"elapsedSeconds":3.5,"completed":1,"total":9}"#;

    fn progress_of(frame: &Frame) -> &Progress {
        match frame {
            Frame::Progress(p) => p,
            other => panic!("expected progress, got {:?}", other),
        }
    }

    #[test]
    fn decodes_one_line_per_frame() {
        let mut parser = FrameParser::new();
        let frames = parser.push(format!("{}\n", PROGRESS).as_bytes());
        assert_eq!(frames.len(), 1);
        let p = progress_of(&frames[0]);
        assert_eq!(p.source, SourceId::new("ripley"));
        assert_eq!(p.outcome, Outcome::Ok);
        assert_eq!(p.result_count, 12);
        assert_eq!(p.total, Some(9));
    }

    #[test]
    fn reassembles_frame_split_across_reads() {
        let mut parser = FrameParser::new();
        let line = format!("{}\n", PROGRESS);
        let (a, b) = line.as_bytes().split_at(40);
        assert!(parser.push(a).is_empty());
        let frames = parser.push(b);
        assert_eq!(frames.len(), 1);
        assert_eq!(parser.decode_errors(), 0);
    }

    #[test]
    fn splits_multiple_frames_in_one_read() {
        let mut parser = FrameParser::new();
        let chunk = format!(
            "{}\n{}\n{}\n",
            PROGRESS,
            r#"{"type":"progress","source":"Metro","outcome":"Error","resultCount":0,"elapsedSeconds":1.0,"completed":2,"total":9}"#,
            r#"{"type":"results","results":[]}"#
        );
        let frames = parser.push(chunk.as_bytes());
        assert_eq!(frames.len(), 3);
        assert_eq!(progress_of(&frames[1]).outcome, Outcome::Failed);
        assert_eq!(progress_of(&frames[1]).detail.as_deref(), Some("Error"));
        assert_eq!(frames[2], Frame::FinalResults(Vec::new()));
    }

    #[test]
    fn invalid_line_is_skipped_not_fatal() {
        let mut parser = FrameParser::new();
        let chunk = format!("not json at all\n{}\n", PROGRESS);
        let frames = parser.push(chunk.as_bytes());
        assert_eq!(frames.len(), 1);
        assert_eq!(parser.decode_errors(), 1);
    }

    #[test]
    fn unknown_type_counts_as_decode_error() {
        let mut parser = FrameParser::new();
        let frames = parser.push(b"{\"type\":\"heartbeat\"}\n");
        assert!(frames.is_empty());
        assert_eq!(parser.decode_errors(), 1);
    }

    #[test]
    fn finish_flushes_trailing_line_and_stops() {
        let mut parser = FrameParser::new();
        assert!(parser.push(PROGRESS.as_bytes()).is_empty());
        assert_eq!(parser.finish().len(), 1);
        assert!(parser.push(format!("{}\n", PROGRESS).as_bytes()).is_empty());
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn accepts_legacy_field_names() {
        let line = r#"{"type":"progress","store":"Real Plaza","status":"Sin resultados","resultados":0,"tiempo":2.1,"completed":3,"total":9}"#;
        let p = match decode_frame(line.as_bytes(), DEFAULT_SUCCESS_MARKER).unwrap() {
            Frame::Progress(p) => p,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(p.source.as_str(), "realplaza");
        assert_eq!(p.display_name, "Real Plaza");
        assert_eq!(p.outcome, Outcome::Failed);
        assert_eq!(p.detail.as_deref(), Some("Sin resultados"));

        let line = r#"{"type":"results","results":[{"nombre":"Zapatillas","precio":199.9,"tienda":"ripley","descuento":30,"imagen":"","link":"https://example.test/p/1"}],"notificacion_enviada":false}"#;
        match decode_frame(line.as_bytes(), DEFAULT_SUCCESS_MARKER).unwrap() {
            Frame::FinalResults(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].discount_percent, Some(30));
                assert_eq!(items[0].image_url, None);
                assert_eq!(items[0].detail_url, "https://example.test/p/1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn items_with_negative_price_are_dropped() {
        let line = r#"{"type":"results","results":[{"name":"a","price":-1,"source":"metro","detailUrl":"x"},{"name":"b","price":5,"source":"metro","detailUrl":"y"}]}"#;
        match decode_frame(line.as_bytes(), DEFAULT_SUCCESS_MARKER).unwrap() {
            Frame::FinalResults(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].name, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn overlong_line_is_discarded_up_to_newline() {
        let mut parser = FrameParser::new().with_max_frame_bytes(16);
        assert!(parser.push(b"{\"type\":\"progress\",\"source\"").is_empty());
        assert_eq!(parser.decode_errors(), 1);
        let frames = parser.push(format!(":\"x\"}}\n{}\n", PROGRESS).as_bytes());
        // the tail of the dropped line is skipped, the next line is kept
        assert_eq!(frames.len(), 1);
        assert_eq!(parser.decode_errors(), 1);
    }

    #[test]
    fn overlong_line_counts_once_across_reads() {
        let mut parser = FrameParser::new().with_max_frame_bytes(16);
        for _ in 0..5 {
            assert!(parser.push(&[b'x'; 20]).is_empty());
        }
        assert_eq!(parser.decode_errors(), 1);
        let frames = parser.push(format!("tail\n{}\n", PROGRESS).as_bytes());
        assert_eq!(frames.len(), 1);
        assert_eq!(parser.decode_errors(), 1);
    }

    #[test]
    fn large_results_line_in_small_reads() {
        let item = r#"{"name":"Televisor 55 pulgadas","price":1999.9,"source":"ripley","detailUrl":"https://example.test/p"}"#;
        let count = 40_000;
        let mut line = String::from(r#"{"type":"results","results":["#);
        for i in 0..count {
            if i > 0 {
                line.push(',');
            }
            line.push_str(item);
        }
        line.push_str("]}\n");
        assert!(line.len() > 4 * 1024 * 1024);

        let mut parser = FrameParser::new();
        let mut frames = Vec::new();
        for chunk in line.as_bytes().chunks(8 * 1024) {
            frames.extend(parser.push(chunk));
        }
        frames.extend(parser.push(format!("{}\n", PROGRESS).as_bytes()));

        assert_eq!(frames.len(), 2);
        match &frames[0] {
            Frame::FinalResults(items) => assert_eq!(items.len(), count),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(progress_of(&frames[1]).result_count, 12);
        assert_eq!(parser.decode_errors(), 0);
    }

    #[test]
    fn custom_success_marker() {
        let line = r#"{"type":"progress","source":"Metro","outcome":"ok","resultCount":1,"elapsedSeconds":0.2}"#;
        match decode_frame(line.as_bytes(), "ok").unwrap() {
            Frame::Progress(p) => assert_eq!(p.outcome, Outcome::Ok),
            other => panic!("unexpected {:?}", other),
        }
    }
}
