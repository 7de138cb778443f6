//! Locate and relocate the stems a separation run leaves behind.
//!
//! Demucs writes `<output_dir>/<model>/<input_stem>/{vocals,no_vocals}.<ext>`.
//! The stems move up to `<output_dir>/Vocals.<ext>` and
//! `<output_dir>/Instrumental.<ext>`, and the model tree is removed.
//! Identification is by file-name substring only; anything ambiguous or
//! missing is a post-processing error, never a guess.

use super::JobError;
use std::fs;
use std::path::{Path, PathBuf};

/// Final locations of the two relocated stems.
#[derive(Debug, Clone)]
pub struct SeparatedStems {
    pub vocal: PathBuf,
    pub instrumental: PathBuf,
}

/// Move the separated stems out of the engine's output layout into
/// `output_dir`, replacing pre-existing files, then drop the model tree.
pub fn relocate_stems(
    output_dir: &Path,
    model: &str,
    input: &Path,
) -> Result<SeparatedStems, JobError> {
    let model_dir = output_dir.join(model);
    let song_dir = locate_song_dir(&model_dir, input)?;
    let (src_vocal, src_instrumental) = identify_stems(&song_dir)?;

    let dest_vocal = output_dir.join(renamed("Vocals", &src_vocal));
    let dest_instrumental = output_dir.join(renamed("Instrumental", &src_instrumental));

    move_replacing(&src_vocal, &dest_vocal)?;
    move_replacing(&src_instrumental, &dest_instrumental)?;

    // Best-effort cleanup of the now-empty model tree.
    let _ = fs::remove_dir_all(&model_dir);

    Ok(SeparatedStems {
        vocal: dest_vocal,
        instrumental: dest_instrumental,
    })
}

/// `<model_dir>/<input_stem>` when it exists, otherwise the unique
/// subdirectory of `model_dir` (engines sometimes normalize the song name).
fn locate_song_dir(model_dir: &Path, input: &Path) -> Result<PathBuf, JobError> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let direct = model_dir.join(&stem);
    if direct.is_dir() {
        return Ok(direct);
    }

    let entries = fs::read_dir(model_dir).map_err(|err| JobError::PostProcess {
        message: format!("could not locate separation output: {err}"),
        search_path: model_dir.to_path_buf(),
        candidates: Vec::new(),
    })?;
    let mut subdirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();

    if subdirs.len() == 1 {
        Ok(subdirs.remove(0))
    } else {
        Err(JobError::PostProcess {
            message: "could not locate separation output directory".to_string(),
            search_path: model_dir.to_path_buf(),
            candidates: subdirs.iter().map(|p| file_name_of(p)).collect(),
        })
    }
}

/// Pick the vocal and instrumental stems out of `song_dir` by substring
/// match. `no_vocals`/`instrumental` is checked first because a plain
/// `vocals` match would also hit it.
fn identify_stems(song_dir: &Path) -> Result<(PathBuf, PathBuf), JobError> {
    let entries = fs::read_dir(song_dir).map_err(|err| JobError::PostProcess {
        message: format!("could not read separation output: {err}"),
        search_path: song_dir.to_path_buf(),
        candidates: Vec::new(),
    })?;

    let mut vocal: Option<PathBuf> = None;
    let mut instrumental: Option<PathBuf> = None;
    let mut seen: Vec<String> = Vec::new();

    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = file_name_of(&path).to_lowercase();
        seen.push(file_name_of(&path));

        let slot = if name.contains("no_vocals") || name.contains("instrumental") {
            &mut instrumental
        } else if name.contains("vocals") {
            &mut vocal
        } else {
            continue;
        };
        if slot.is_some() {
            return Err(JobError::PostProcess {
                message: "ambiguous separation stems".to_string(),
                search_path: song_dir.to_path_buf(),
                candidates: seen,
            });
        }
        *slot = Some(path);
    }

    match (vocal, instrumental) {
        (Some(vocal), Some(instrumental)) => Ok((vocal, instrumental)),
        _ => Err(JobError::PostProcess {
            message: "output stems missing".to_string(),
            search_path: song_dir.to_path_buf(),
            candidates: seen,
        }),
    }
}

/// `Vocals.<ext>` for the extension the source stem actually has.
fn renamed(base: &str, src: &Path) -> String {
    match src.extension() {
        Some(ext) => format!("{base}.{}", ext.to_string_lossy()),
        None => base.to_string(),
    }
}

fn move_replacing(src: &Path, dest: &Path) -> Result<(), JobError> {
    if dest.exists() {
        fs::remove_file(dest).map_err(|err| {
            JobError::Internal(format!("cannot replace {}: {err}", dest.display()))
        })?;
    }
    fs::rename(src, dest).map_err(|err| {
        JobError::Internal(format!(
            "cannot move {} to {}: {err}",
            src.display(),
            dest.display()
        ))
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
