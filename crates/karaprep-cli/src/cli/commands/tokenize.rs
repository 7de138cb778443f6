//! `karaprep tokenize <input>` – run one tokenization job.

use karaprep_core::config::KaraprepConfig;
use karaprep_core::engine::TokenizerCommand;
use karaprep_core::job::{self, JobError, TokenizeJob};
use karaprep_core::status::StatusSink;
use std::path::PathBuf;

pub fn run_tokenize(
    cfg: &KaraprepConfig,
    sink: &StatusSink,
    input: PathBuf,
    output: PathBuf,
) -> i32 {
    let engine = match cfg.tokenizer_command.as_deref() {
        Some([program, args @ ..]) => TokenizerCommand::new(program, args.to_vec()),
        _ => {
            let err = JobError::Precondition(
                "no tokenizer_command configured; set one in config.toml".to_string(),
            );
            sink.emit(&err.to_event());
            return err.exit_code();
        }
    };
    let job = TokenizeJob { input, output };

    match job::run_tokenization(&job, &engine, sink, cfg.recent_lines) {
        Ok(()) => {
            tracing::info!("tokenized {} -> {}", job.input.display(), job.output.display());
            0
        }
        Err(err) => {
            tracing::warn!("tokenization job failed: {err}");
            sink.emit(&err.to_event());
            err.exit_code()
        }
    }
}
