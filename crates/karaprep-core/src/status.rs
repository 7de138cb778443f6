//! Status protocol: newline-delimited JSON events on standard output.
//!
//! The parent process reads one JSON object per line and must never block on
//! buffering, so every event is flushed as soon as it is written. Standard
//! output carries nothing else; logs go to the tracing subscriber and the
//! subordinate's diagnostic noise passes through to stderr.

use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One lifecycle or progress message for the controlling process.
///
/// Serializes as `{"status": "...", ...}`. Each event is fire-and-forget;
/// nothing is persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusEvent {
    /// Job accepted, preconditions passed.
    Starting { message: String },
    /// A new phase became active; `progress` is the (possibly clamped) value.
    Phase { phase: String, progress: u32 },
    /// Absolute progress advanced.
    Progress { progress: u32 },
    /// The separation model is being loaded.
    LoadingModel { model: String },
    /// Stem separation is underway.
    Separating,
    /// Terminal success. Separation carries the stem paths, tokenization the
    /// output document path; absent fields are omitted from the line.
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        instrumental: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        vocal: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
    },
    /// Terminal failure. `details` is a bounded tail of recent diagnostic
    /// lines when one is available; `code` mirrors the subordinate's exit code.
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
}

enum SinkTarget {
    Stdout,
    Buffer(Vec<u8>),
}

impl SinkTarget {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            SinkTarget::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{line}")?;
                out.flush()
            }
            SinkTarget::Buffer(buf) => {
                buf.extend_from_slice(line.as_bytes());
                buf.push(b'\n');
                Ok(())
            }
        }
    }
}

/// Shared sink for [`StatusEvent`]s. Safe to clone and use from multiple
/// threads; one mutex serializes the writes so event lines never interleave.
#[derive(Clone)]
pub struct StatusSink {
    target: Arc<Mutex<SinkTarget>>,
}

impl StatusSink {
    /// Sink writing to the real standard output, one flushed line per event.
    pub fn stdout() -> Self {
        Self {
            target: Arc::new(Mutex::new(SinkTarget::Stdout)),
        }
    }

    /// Sink collecting lines in memory. For tests and embedding.
    pub fn buffer() -> Self {
        Self {
            target: Arc::new(Mutex::new(SinkTarget::Buffer(Vec::new()))),
        }
    }

    /// Serialize and write one event. Emission is fire-and-forget: a write
    /// failure (parent closed the pipe) is logged and swallowed.
    pub fn emit(&self, event: &StatusEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!("failed to serialize status event: {err}");
                return;
            }
        };
        let mut target = self.target.lock().unwrap();
        if let Err(err) = target.write_line(&line) {
            tracing::warn!("failed to write status event: {err}");
        }
    }

    /// Everything written so far when the sink is a memory buffer; empty for
    /// the stdout sink.
    pub fn contents(&self) -> String {
        match &*self.target.lock().unwrap() {
            SinkTarget::Stdout => String::new(),
            SinkTarget::Buffer(buf) => String::from_utf8_lossy(buf).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_value(event: &StatusEvent) -> serde_json::Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn event_shapes() {
        assert_eq!(
            to_value(&StatusEvent::Starting {
                message: "Starting separation for song.mp3".into()
            }),
            json!({"status": "starting", "message": "Starting separation for song.mp3"})
        );
        assert_eq!(
            to_value(&StatusEvent::Phase {
                phase: "separating".into(),
                progress: 10
            }),
            json!({"status": "phase", "phase": "separating", "progress": 10})
        );
        assert_eq!(
            to_value(&StatusEvent::Progress { progress: 52 }),
            json!({"status": "progress", "progress": 52})
        );
        assert_eq!(
            to_value(&StatusEvent::LoadingModel {
                model: "htdemucs_ft".into()
            }),
            json!({"status": "loading_model", "model": "htdemucs_ft"})
        );
        assert_eq!(
            to_value(&StatusEvent::Separating),
            json!({"status": "separating"})
        );
    }

    #[test]
    fn success_omits_absent_fields() {
        let separation = to_value(&StatusEvent::Success {
            instrumental: Some("/out/Instrumental.wav".into()),
            vocal: Some("/out/Vocals.wav".into()),
            output: None,
        });
        assert_eq!(separation["instrumental"], "/out/Instrumental.wav");
        assert_eq!(separation["vocal"], "/out/Vocals.wav");
        assert!(separation.get("output").is_none());

        let tokenization = to_value(&StatusEvent::Success {
            instrumental: None,
            vocal: None,
            output: Some("/out/tokens.json".into()),
        });
        assert_eq!(tokenization["output"], "/out/tokens.json");
        assert!(tokenization.get("instrumental").is_none());
        assert!(tokenization.get("vocal").is_none());
    }

    #[test]
    fn error_optional_fields() {
        let bare = to_value(&StatusEvent::Error {
            error: "input file not found".into(),
            details: None,
            code: None,
        });
        assert_eq!(bare, json!({"status": "error", "error": "input file not found"}));

        let full = to_value(&StatusEvent::Error {
            error: "separation failed".into(),
            details: Some("Traceback ...".into()),
            code: Some(2),
        });
        assert_eq!(full["details"], "Traceback ...");
        assert_eq!(full["code"], 2);
    }

    #[test]
    fn buffer_sink_one_line_per_event() {
        let sink = StatusSink::buffer();
        sink.emit(&StatusEvent::Separating);
        sink.emit(&StatusEvent::Progress { progress: 42 });

        let contents = sink.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value["status"].is_string());
        }
    }

    #[test]
    fn buffer_sink_shared_between_clones() {
        let sink = StatusSink::buffer();
        let clone = sink.clone();
        clone.emit(&StatusEvent::Progress { progress: 7 });
        assert!(sink.contents().contains("\"progress\":7"));
    }
}
