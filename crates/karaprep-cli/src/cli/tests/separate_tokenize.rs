//! Tests for the separate and tokenize subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_separate() {
    match parse(&[
        "karaprep",
        "separate",
        "song.mp3",
        "--output-dir",
        "/tmp/out",
    ]) {
        CliCommand::Separate {
            input,
            output_dir,
            model,
            cache_dir,
        } => {
            assert_eq!(input, Path::new("song.mp3"));
            assert_eq!(output_dir, Path::new("/tmp/out"));
            assert!(model.is_none());
            assert!(cache_dir.is_none());
        }
        _ => panic!("expected Separate"),
    }
}

#[test]
fn cli_parse_separate_all_flags() {
    match parse(&[
        "karaprep",
        "separate",
        "song.mp3",
        "--output-dir",
        "/tmp/out",
        "--model",
        "htdemucs",
        "--cache-dir",
        "/var/cache/karaprep",
    ]) {
        CliCommand::Separate {
            model, cache_dir, ..
        } => {
            assert_eq!(model.as_deref(), Some("htdemucs"));
            assert_eq!(cache_dir.as_deref(), Some(Path::new("/var/cache/karaprep")));
        }
        _ => panic!("expected Separate with flags"),
    }
}

#[test]
fn cli_parse_separate_requires_output_dir() {
    assert!(Cli::try_parse_from(["karaprep", "separate", "song.mp3"]).is_err());
}

#[test]
fn cli_parse_tokenize() {
    match parse(&[
        "karaprep",
        "tokenize",
        "lyrics.json",
        "--output",
        "tokens.json",
    ]) {
        CliCommand::Tokenize { input, output } => {
            assert_eq!(input, Path::new("lyrics.json"));
            assert_eq!(output, Path::new("tokens.json"));
        }
        _ => panic!("expected Tokenize"),
    }
}

#[test]
fn cli_parse_tokenize_stdin_dash() {
    match parse(&["karaprep", "tokenize", "-", "--output", "tokens.json"]) {
        CliCommand::Tokenize { input, .. } => assert_eq!(input, Path::new("-")),
        _ => panic!("expected Tokenize from stdin"),
    }
}

#[test]
fn cli_parse_unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["karaprep", "download"]).is_err());
}
