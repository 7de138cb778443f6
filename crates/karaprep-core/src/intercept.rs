//! Transparent diagnostic-stream proxy with progress extraction.
//!
//! The subordinate process (demucs, a tokenizer) draws tqdm-style progress
//! bars on its stderr. [`ProgressScanWriter`] sits between that stream and
//! its real destination: every chunk is forwarded first, byte for byte, then
//! scanned for percentage markers. The subordinate must never observe a
//! failure because of proxy internals, so everything on the parsing side is
//! best-effort and swallowed; only passthrough I/O errors propagate.

use crate::progress::PhaseTracker;
use regex::Regex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, LazyLock};

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)%\|").unwrap());

/// Unterminated noise is capped so a subordinate that never writes a line
/// terminator cannot grow the buffer without bound.
const MAX_PENDING_BYTES: usize = 8 * 1024;

/// Extract a tqdm-style percentage (`" 42%|"`) from one line of subordinate
/// output. The value is the subordinate's local percent, clamped to 100.
///
/// The whole knowledge of the subordinate's progress format lives here, so
/// format drift in a new demucs release is a one-line change.
pub fn extract_percent(line: &str) -> Option<u32> {
    let captures = PERCENT_RE.captures(line)?;
    let value: u32 = captures.get(1)?.as_str().parse().ok()?;
    Some(value.min(100))
}

/// Bounded ring of the most recent raw diagnostic lines, kept so `error`
/// events can carry a short tail for post-mortem diagnosis.
#[derive(Debug)]
pub struct RecentLines {
    lines: VecDeque<String>,
    cap: usize,
}

impl RecentLines {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, line: &str) {
        if self.cap == 0 || line.is_empty() {
            return;
        }
        if self.lines.len() == self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Newline-joined tail, oldest first.
    pub fn join(&self) -> String {
        let parts: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        parts.join("\n")
    }
}

/// Pass-through proxy for a subordinate's diagnostic stream.
///
/// Forwards every chunk to `inner` unmodified and in order, reassembles
/// logical lines (`\n` or `\r` terminated, so carriage-return bar redraws
/// count) across write boundaries, and feeds extracted percentages to the
/// shared [`PhaseTracker`].
pub struct ProgressScanWriter<W: Write> {
    inner: W,
    tracker: Arc<PhaseTracker>,
    pending: Vec<u8>,
    recent: RecentLines,
}

impl<W: Write> ProgressScanWriter<W> {
    pub fn new(inner: W, tracker: Arc<PhaseTracker>, tail_lines: usize) -> Self {
        Self {
            inner,
            tracker,
            pending: Vec::new(),
            recent: RecentLines::new(tail_lines),
        }
    }

    /// Newline-joined tail of recent diagnostic lines, if any were seen.
    pub fn recent_tail(&self) -> Option<String> {
        if self.recent.is_empty() {
            None
        } else {
            Some(self.recent.join())
        }
    }

    /// The wrapped destination.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn scan_pending(&mut self) {
        // Drain every terminated logical line first.
        while let Some(pos) = self
            .pending
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        {
            let line_bytes: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).into_owned();
            self.consume_line(&line);
        }

        // A bar redrawn with a leading `\r` and no trailing newline leaves its
        // percentage in the unterminated residue; match it there too, and
        // drain on a hit so the same update is not parsed again later.
        if self.pending.contains(&b'%') {
            let residue = String::from_utf8_lossy(&self.pending).into_owned();
            if let Some(percent) = extract_percent(&residue) {
                self.recent.push(residue.trim());
                self.pending.clear();
                self.tracker.report_local_percent(f64::from(percent));
            }
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            let excess = self.pending.len() - MAX_PENDING_BYTES;
            self.pending.drain(..excess);
        }
    }

    fn consume_line(&mut self, line: &str) {
        if !line.trim().is_empty() {
            self.recent.push(line);
        }
        if let Some(percent) = extract_percent(line) {
            self.tracker.report_local_percent(f64::from(percent));
        }
    }
}

impl<W: Write> Write for ProgressScanWriter<W> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        // Passthrough comes first and is the only fallible step; a chunk the
        // destination never saw is not buffered for parsing either.
        self.inner.write_all(chunk)?;
        self.pending.extend_from_slice(chunk);
        self.scan_pending();
        Ok(chunk.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Partial lines persist across flushes.
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusSink;

    fn scanner(sink: &StatusSink) -> ProgressScanWriter<Vec<u8>> {
        let tracker = Arc::new(PhaseTracker::new(sink.clone()));
        tracker.set_phase("work", 0.0, 100.0);
        ProgressScanWriter::new(Vec::new(), tracker, 20)
    }

    fn progress_events(sink: &StatusSink) -> Vec<u32> {
        sink.contents()
            .lines()
            .filter_map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                (value["status"] == "progress").then(|| value["progress"].as_u64().unwrap() as u32)
            })
            .collect()
    }

    #[test]
    fn extract_percent_tqdm_forms() {
        assert_eq!(extract_percent("  42%|██        | 12/28"), Some(42));
        assert_eq!(extract_percent("\r100%|██████████|"), Some(100));
        assert_eq!(extract_percent("epoch 3:  7%|▎"), Some(7));
        assert_eq!(extract_percent("999%|"), Some(100));
        assert_eq!(extract_percent("no bar here"), None);
        assert_eq!(extract_percent("50% done"), None);
        assert_eq!(extract_percent("99999999999999999999%|"), None);
    }

    #[test]
    fn split_line_yields_single_report() {
        let sink = StatusSink::buffer();
        let mut writer = scanner(&sink);
        writer.write_all(b"  4").unwrap();
        writer.write_all(b"2%|").unwrap();
        writer.write_all("██\n".as_bytes()).unwrap();

        assert_eq!(progress_events(&sink), vec![42]);
    }

    #[test]
    fn carriage_return_redraws_report_each_update() {
        let sink = StatusSink::buffer();
        let mut writer = scanner(&sink);
        writer.write_all(b"\r 10%|").unwrap();
        writer.write_all(b"\r 55%|").unwrap();

        assert_eq!(progress_events(&sink), vec![10, 55]);
    }

    #[test]
    fn passthrough_is_byte_identical() {
        let sink = StatusSink::buffer();
        let mut writer = scanner(&sink);
        let chunks: [&[u8]; 5] = [
            b"  4",
            b"2%|",
            b"\xff\xfe garbled",
            b"\rplain line\n",
            b"trailing without newline",
        ];
        let mut expected = Vec::new();
        for chunk in chunks {
            writer.write_all(chunk).unwrap();
            expected.extend_from_slice(chunk);
        }
        writer.flush().unwrap();

        assert_eq!(writer.get_ref().as_slice(), expected.as_slice());
    }

    #[test]
    fn non_matching_lines_are_ignored() {
        let sink = StatusSink::buffer();
        let mut writer = scanner(&sink);
        writer.write_all(b"loading model\n").unwrap();
        writer.write_all(b"50% done but no bar\n").unwrap();
        writer.write_all(b"\xff\xfe\n").unwrap();

        assert!(progress_events(&sink).is_empty());
    }

    #[test]
    fn recent_lines_keep_bounded_tail() {
        let sink = StatusSink::buffer();
        let mut writer = scanner(&sink);
        for i in 0..30 {
            writer.write_all(format!("line {i}\n").as_bytes()).unwrap();
        }

        let tail = writer.recent_tail().unwrap();
        let lines: Vec<&str> = tail.lines().collect();
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[0], "line 10");
        assert_eq!(lines[19], "line 29");
    }

    #[test]
    fn no_tail_before_any_line() {
        let sink = StatusSink::buffer();
        let writer = scanner(&sink);
        assert!(writer.recent_tail().is_none());
    }

    #[test]
    fn unterminated_noise_is_capped() {
        let sink = StatusSink::buffer();
        let mut writer = scanner(&sink);
        writer.write_all(&vec![b'x'; 3 * MAX_PENDING_BYTES]).unwrap();

        assert!(writer.pending.len() <= MAX_PENDING_BYTES);
        assert_eq!(writer.get_ref().len(), 3 * MAX_PENDING_BYTES);
    }

    #[test]
    fn recent_lines_ring() {
        let mut recent = RecentLines::new(2);
        assert!(recent.is_empty());
        recent.push("a");
        recent.push("");
        recent.push("b");
        recent.push("c");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.join(), "b\nc");
    }
}
