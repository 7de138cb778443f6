//! Per-job orchestration: preconditions, phase sequencing, engine
//! invocation, artifact relocation, terminal events.
//!
//! One function per job kind, each driving the fixed phase sequence for its
//! subordinate. Preconditions are checked before any progress is reported;
//! a failure there short-circuits without ever touching the phase tracker.

pub mod artifacts;

pub use artifacts::SeparatedStems;

use crate::engine::{SeparationEngine, SeparationRequest, TokenizerEngine};
use crate::intercept::ProgressScanWriter;
use crate::progress::PhaseTracker;
use crate::status::{StatusEvent, StatusSink};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Failure of one job, classified for the exit-code contract and the
/// terminal `error` event.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Input or arguments rejected before any progress was reported.
    #[error("{0}")]
    Precondition(String),
    /// The subordinate process failed.
    #[error("{message}")]
    Engine {
        message: String,
        /// The subordinate's exit code, when it had one.
        code: Option<i32>,
        /// Bounded tail of recent diagnostic lines.
        details: Option<String>,
    },
    /// Expected output artifacts missing or ambiguous. Never guessed at.
    #[error("{message}")]
    PostProcess {
        message: String,
        search_path: PathBuf,
        candidates: Vec<String>,
    },
    /// Internal fault outside the taxonomy above (e.g. writing the output
    /// document failed).
    #[error("{0}")]
    Internal(String),
}

impl JobError {
    /// Process exit code: mirrors the subordinate's when known, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::Engine {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// The terminal `error` event for this failure.
    pub fn to_event(&self) -> StatusEvent {
        match self {
            JobError::Precondition(message) | JobError::Internal(message) => StatusEvent::Error {
                error: message.clone(),
                details: None,
                code: None,
            },
            JobError::Engine {
                message,
                code,
                details,
            } => StatusEvent::Error {
                error: message.clone(),
                details: details.clone(),
                code: *code,
            },
            JobError::PostProcess {
                message,
                search_path,
                candidates,
            } => {
                let mut details = format!("searched {}", search_path.display());
                if !candidates.is_empty() {
                    details.push_str("; candidates: ");
                    details.push_str(&candidates.join(", "));
                }
                StatusEvent::Error {
                    error: message.clone(),
                    details: Some(details),
                    code: None,
                }
            }
        }
    }
}

/// One separation job.
#[derive(Debug, Clone)]
pub struct SeparationJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub model: String,
    pub cache_dir: Option<PathBuf>,
}

/// Run one separation job to completion, emitting the full event sequence
/// on `sink`. On success the relocated stem paths are returned and a
/// `success` event has been emitted; the caller maps an `Err` to its
/// terminal `error` event and exit code.
pub fn run_separation(
    job: &SeparationJob,
    engine: &dyn SeparationEngine,
    sink: &StatusSink,
    tail_lines: usize,
) -> Result<SeparatedStems, JobError> {
    if !job.input.is_file() {
        return Err(JobError::Precondition(format!(
            "input file not found: {}",
            job.input.display()
        )));
    }
    fs::create_dir_all(&job.output_dir).map_err(|err| {
        JobError::Precondition(format!(
            "cannot create output directory {}: {err}",
            job.output_dir.display()
        ))
    })?;

    let input_name = job
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| job.input.display().to_string());
    sink.emit(&StatusEvent::Starting {
        message: format!("Starting separation for {input_name}"),
    });

    let tracker = Arc::new(PhaseTracker::new(sink.clone()));
    tracker.set_phase("loading_model", 0.0, 10.0);
    sink.emit(&StatusEvent::LoadingModel {
        model: job.model.clone(),
    });

    // The model is loaded inside the same blocking call as the separation
    // itself, so the loading phase closes when the subordinate starts and
    // every percentage scanned from its output lands in the separating slice.
    tracker.report_local_percent(100.0);
    tracker.set_phase("separating", 10.0, 95.0);
    sink.emit(&StatusEvent::Separating);

    let mut diag = ProgressScanWriter::new(io::stderr(), Arc::clone(&tracker), tail_lines);
    let request = SeparationRequest {
        input: job.input.clone(),
        output_dir: job.output_dir.clone(),
        model: job.model.clone(),
        cache_dir: job.cache_dir.clone(),
    };
    if let Err(err) = engine.separate(&request, &mut diag) {
        return Err(JobError::Engine {
            message: format!("separation failed: {err}"),
            code: err.exit_code(),
            details: diag.recent_tail(),
        });
    }

    tracker.set_phase("finalizing", 95.0, 100.0);
    let stems = artifacts::relocate_stems(&job.output_dir, &job.model, &job.input)?;
    tracker.report_local_percent(100.0);

    sink.emit(&StatusEvent::Success {
        instrumental: Some(stems.instrumental.clone()),
        vocal: Some(stems.vocal.clone()),
        output: None,
    });
    tracing::info!(
        "separation finished: {} / {}",
        stems.vocal.display(),
        stems.instrumental.display()
    );
    Ok(stems)
}

/// One tokenization job. `input` of `-` reads the document from stdin.
#[derive(Debug, Clone)]
pub struct TokenizeJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Run one tokenization job to completion, emitting the full event sequence
/// on `sink`. An empty input document short-circuits to success without
/// invoking the engine.
pub fn run_tokenization(
    job: &TokenizeJob,
    engine: &dyn TokenizerEngine,
    sink: &StatusSink,
    tail_lines: usize,
) -> Result<(), JobError> {
    let document = read_input_document(&job.input)?;

    let line_count = match document.trim() {
        "" => 0,
        trimmed => {
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|err| {
                JobError::Precondition(format!("input is not valid JSON: {err}"))
            })?;
            parsed
                .as_array()
                .ok_or_else(|| {
                    JobError::Precondition(
                        "input document must be a JSON array of lyric lines".to_string(),
                    )
                })?
                .len()
        }
    };
    if line_count == 0 {
        write_output_document(&job.output, "[]")?;
        sink.emit(&StatusEvent::Success {
            instrumental: None,
            vocal: None,
            output: Some(job.output.clone()),
        });
        return Ok(());
    }

    sink.emit(&StatusEvent::Starting {
        message: format!("Starting tokenization for {line_count} lines"),
    });

    let tracker = Arc::new(PhaseTracker::new(sink.clone()));
    tracker.set_phase("loading_tokenizer", 0.0, 10.0);
    tracker.report_local_percent(100.0);
    tracker.set_phase("tokenizing", 10.0, 95.0);

    let mut diag = ProgressScanWriter::new(io::stderr(), Arc::clone(&tracker), tail_lines);
    let output = match engine.tokenize(&document, &mut diag) {
        Ok(output) => output,
        Err(err) => {
            return Err(JobError::Engine {
                message: format!("tokenization failed: {err}"),
                code: err.exit_code(),
                details: diag.recent_tail(),
            })
        }
    };

    tracker.set_phase("finalizing", 95.0, 100.0);
    let value: serde_json::Value = serde_json::from_str(&output).map_err(|err| JobError::Engine {
        message: format!("tokenizer produced invalid JSON: {err}"),
        code: None,
        details: diag.recent_tail(),
    })?;
    if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
        return Err(JobError::Engine {
            message: format!("tokenizer error: {message}"),
            code: None,
            details: diag.recent_tail(),
        });
    }

    write_output_document(&job.output, output.trim_end())?;
    tracker.report_local_percent(100.0);

    sink.emit(&StatusEvent::Success {
        instrumental: None,
        vocal: None,
        output: Some(job.output.clone()),
    });
    tracing::info!("tokenization finished: {}", job.output.display());
    Ok(())
}

fn read_input_document(input: &Path) -> Result<String, JobError> {
    if input == Path::new("-") {
        let mut document = String::new();
        io::stdin()
            .read_to_string(&mut document)
            .map_err(|err| JobError::Precondition(format!("cannot read stdin: {err}")))?;
        return Ok(document);
    }
    fs::read_to_string(input).map_err(|err| {
        JobError::Precondition(format!("cannot read input {}: {err}", input.display()))
    })
}

fn write_output_document(output: &Path, document: &str) -> Result<(), JobError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            JobError::Internal(format!(
                "cannot create output directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    fs::write(output, format!("{document}\n")).map_err(|err| {
        JobError::Internal(format!("cannot write output {}: {err}", output.display()))
    })
}
