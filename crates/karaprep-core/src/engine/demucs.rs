//! Separation engine backed by the `demucs` command-line entry point.

use super::{
    exit_error, io_error, pump_diagnostics, ChildGuard, EngineError, SeparationEngine,
    SeparationRequest,
};
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

/// Program name used when the configuration does not override it.
pub const DEFAULT_PROGRAM: &str = "demucs";

/// Runs `demucs -n <model> --two-stems vocals -o <output_dir> <input>` with
/// stderr piped into the injected diagnostic writer. Output lands in demucs's
/// own `<output_dir>/<model>/<input_stem>/` layout; relocation is the job
/// runner's concern.
pub struct DemucsCommand {
    program: String,
}

impl DemucsCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DemucsCommand {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl SeparationEngine for DemucsCommand {
    fn separate(
        &self,
        request: &SeparationRequest,
        diag: &mut (dyn Write + Send),
    ) -> Result<(), EngineError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-n")
            .arg(&request.model)
            .arg("--two-stems")
            .arg("vocals")
            .arg("-o")
            .arg(&request.output_dir)
            .arg(&request.input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(cache_dir) = &request.cache_dir {
            // Demucs resolves its weight cache through either variable.
            cmd.env("TORCH_HOME", cache_dir)
                .env("XDG_CACHE_HOME", cache_dir);
        }

        tracing::debug!("spawning {} for {}", self.program, request.input.display());
        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let mut guard = ChildGuard::new(child);
        let mut stderr = guard.inner().stderr.take().expect("child stderr is piped");

        let status = thread::scope(|scope| {
            let pump = scope.spawn(move || pump_diagnostics(&mut stderr, diag));
            let status = guard.wait().map_err(|e| io_error(&self.program, e))?;
            match pump.join() {
                Ok(Ok(())) => Ok(status),
                Ok(Err(e)) => Err(io_error(&self.program, e)),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(exit_error(&self.program, status))
        }
    }
}
