//! Shared doubles for job-flow tests: scripted engines standing in for the
//! real subordinate processes.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use karaprep_core::engine::{
    EngineError, SeparationEngine, SeparationRequest, TokenizerEngine,
};
use std::fs;
use std::io::Write;

/// Separation double: writes scripted diagnostic chunks into the injected
/// writer, then lays out stem files the way the real engine would.
pub struct ScriptedSeparator {
    pub chunks: Vec<Vec<u8>>,
    pub stem_files: Vec<&'static str>,
}

impl SeparationEngine for ScriptedSeparator {
    fn separate(
        &self,
        request: &SeparationRequest,
        diag: &mut (dyn Write + Send),
    ) -> Result<(), EngineError> {
        for chunk in &self.chunks {
            diag.write_all(chunk).unwrap();
        }
        let song_dir = request
            .output_dir
            .join(&request.model)
            .join(request.input.file_stem().unwrap());
        fs::create_dir_all(&song_dir).unwrap();
        for file in &self.stem_files {
            fs::write(song_dir.join(file), b"stem").unwrap();
        }
        Ok(())
    }
}

/// Separation double that fails after writing some diagnostics.
pub struct FailingSeparator {
    pub chunks: Vec<Vec<u8>>,
    pub code: i32,
}

impl SeparationEngine for FailingSeparator {
    fn separate(
        &self,
        _request: &SeparationRequest,
        diag: &mut (dyn Write + Send),
    ) -> Result<(), EngineError> {
        for chunk in &self.chunks {
            diag.write_all(chunk).unwrap();
        }
        Err(EngineError::Exit {
            program: "demucs".to_string(),
            code: self.code,
        })
    }
}

/// Tokenizer double: writes scripted diagnostics and returns a fixed
/// output document.
pub struct ScriptedTokenizer {
    pub chunks: Vec<Vec<u8>>,
    pub output: String,
}

impl TokenizerEngine for ScriptedTokenizer {
    fn tokenize(
        &self,
        _document: &str,
        diag: &mut (dyn Write + Send),
    ) -> Result<String, EngineError> {
        for chunk in &self.chunks {
            diag.write_all(chunk).unwrap();
        }
        Ok(self.output.clone())
    }
}

/// Parse the sink's NDJSON contents into one value per event line.
pub fn events(contents: &str) -> Vec<serde_json::Value> {
    contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// The `status` field of every event, in emission order.
pub fn statuses(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| event["status"].as_str().unwrap().to_string())
        .collect()
}
