//! Engine seam: the boundary between job orchestration and the opaque
//! subordinate processes that do the actual work.
//!
//! Each engine drives one child process to completion through a single
//! blocking call. The caller injects the diagnostic writer; the engine pipes
//! the child's stderr into it byte for byte, which is how progress bars reach
//! the interceptor. The child is always reaped, on every exit path.

mod demucs;
mod tokenizer;

pub use demucs::DemucsCommand;
pub use tokenizer::TokenizerCommand;

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ExitStatus};

/// One separation invocation.
#[derive(Debug, Clone)]
pub struct SeparationRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub model: String,
    /// Model weight cache; routed into the child environment when set.
    pub cache_dir: Option<PathBuf>,
}

/// Failure of a subordinate invocation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("`{program}` failed with exit code {code}")]
    Exit { program: String, code: i32 },
    #[error("`{program}` was terminated by a signal")]
    Killed { program: String },
    #[error("i/o error while driving `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    /// The subordinate's own exit code, when it had one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            EngineError::Exit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Audio source separation behind a single blocking call.
pub trait SeparationEngine {
    /// Separate `request.input` into stems under `request.output_dir`,
    /// streaming the subordinate's diagnostics into `diag`.
    fn separate(
        &self,
        request: &SeparationRequest,
        diag: &mut (dyn Write + Send),
    ) -> Result<(), EngineError>;
}

/// Lyric tokenization behind a single blocking call.
pub trait TokenizerEngine {
    /// Feed `document` to the tokenizer and return its output document,
    /// streaming the subordinate's diagnostics into `diag`.
    fn tokenize(
        &self,
        document: &str,
        diag: &mut (dyn Write + Send),
    ) -> Result<String, EngineError>;
}

/// Reaps the child on drop unless it was already waited for, so an early
/// return or panic in the invocation never leaks a running subordinate.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn inner(&mut self) -> &mut Child {
        &mut self.child
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait();
        if status.is_ok() {
            self.reaped = true;
        }
        status
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Copy `src` into `dst` in bounded chunks until EOF. After a sink failure
/// the source is still drained to EOF so the child never blocks on a full
/// stderr pipe; the first error is returned once the stream ends.
fn pump_diagnostics(src: &mut impl Read, dst: &mut (dyn Write + Send)) -> io::Result<()> {
    let mut buf = [0u8; 4096];
    let mut first_err: Option<io::Error> = None;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                first_err.get_or_insert(err);
                break;
            }
        };
        if first_err.is_none() {
            if let Err(err) = dst.write_all(&buf[..n]) {
                first_err = Some(err);
            }
        }
    }
    match first_err {
        None => Ok(()),
        Some(err) => Err(err),
    }
}

fn exit_error(program: &str, status: ExitStatus) -> EngineError {
    match status.code() {
        Some(code) => EngineError::Exit {
            program: program.to_string(),
            code,
        },
        None => EngineError::Killed {
            program: program.to_string(),
        },
    }
}

fn io_error(program: &str, source: io::Error) -> EngineError {
    EngineError::Io {
        program: program.to_string(),
        source,
    }
}
