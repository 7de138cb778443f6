//! Tokenizer engine backed by a configured command line.
//!
//! The tokenizer contract is stdin/stdout JSON: the input document goes to
//! the child's stdin, the tokenized document comes back on its stdout, and
//! anything on stderr is diagnostic noise for the interceptor.

use super::{exit_error, io_error, pump_diagnostics, ChildGuard, EngineError, TokenizerEngine};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Spawns the configured tokenizer command once per job.
pub struct TokenizerCommand {
    program: String,
    args: Vec<String>,
}

impl TokenizerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl TokenizerEngine for TokenizerCommand {
    fn tokenize(
        &self,
        document: &str,
        diag: &mut (dyn Write + Send),
    ) -> Result<String, EngineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("spawning tokenizer {}", self.program);
        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let mut guard = ChildGuard::new(child);
        let mut stdin = guard.inner().stdin.take().expect("child stdin is piped");
        let mut stdout = guard.inner().stdout.take().expect("child stdout is piped");
        let mut stderr = guard.inner().stderr.take().expect("child stderr is piped");

        let output = thread::scope(|scope| {
            let pump = scope.spawn(move || pump_diagnostics(&mut stderr, diag));
            // Feed stdin from its own thread; the write side closes when the
            // thread drops the handle, which is the child's EOF.
            let feed = scope.spawn(move || stdin.write_all(document.as_bytes()));

            let mut output = String::new();
            let read = stdout
                .read_to_string(&mut output)
                .map_err(|e| io_error(&self.program, e));

            // A tokenizer that stops reading early closes its stdin pipe;
            // losing that race is not an invocation failure by itself.
            if let Ok(Err(err)) = feed.join() {
                tracing::debug!("tokenizer stdin closed early: {err}");
            }
            match pump.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(io_error(&self.program, e)),
                Err(panic) => std::panic::resume_unwind(panic),
            }
            read.map(|_| output)
        })?;

        let status = guard.wait().map_err(|e| io_error(&self.program, e))?;
        if status.success() {
            Ok(output)
        } else {
            Err(exit_error(&self.program, status))
        }
    }
}
