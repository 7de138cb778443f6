//! `karaprep separate <input>` – run one separation job.

use karaprep_core::config::KaraprepConfig;
use karaprep_core::engine::DemucsCommand;
use karaprep_core::job::{self, SeparationJob};
use karaprep_core::status::StatusSink;
use std::path::PathBuf;

pub fn run_separate(
    cfg: &KaraprepConfig,
    sink: &StatusSink,
    input: PathBuf,
    output_dir: PathBuf,
    model: Option<String>,
    cache_dir: Option<PathBuf>,
) -> i32 {
    let job = SeparationJob {
        input,
        output_dir,
        model: model.unwrap_or_else(|| cfg.model.clone()),
        cache_dir: cache_dir.or_else(|| cfg.cache_dir.clone()),
    };
    let engine = match &cfg.demucs_program {
        Some(program) => DemucsCommand::new(program),
        None => DemucsCommand::default(),
    };

    match job::run_separation(&job, &engine, sink, cfg.recent_lines) {
        Ok(stems) => {
            tracing::info!(
                "separated {} -> {}, {}",
                job.input.display(),
                stems.vocal.display(),
                stems.instrumental.display()
            );
            0
        }
        Err(err) => {
            tracing::warn!("separation job failed: {err}");
            sink.emit(&err.to_event());
            err.exit_code()
        }
    }
}
