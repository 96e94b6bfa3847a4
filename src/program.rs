// Copyright (C) 2025 Dayton Fishell
// Intcode VM
// This file is part of Intcode VM.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Program images in their textual form: comma-separated decimal words.

use std::fs;
use std::io;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("could not read program from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("program text is empty")]
    Empty,
    #[error("word {index} ({token:?}) is not a 64-bit integer")]
    BadToken {
        index: usize,
        token: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parse comma-separated words such as `1,0,0,3,99`.
///
/// Whitespace around words and the whole text is ignored, as is a single
/// trailing comma.
pub fn parse(text: &str) -> Result<Vec<i64>, ProgramError> {
    let text = text.trim();
    let text = text.strip_suffix(',').unwrap_or(text);
    if text.is_empty() {
        return Err(ProgramError::Empty);
    }

    text.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(index, token)| {
            token.parse::<i64>().map_err(|source| ProgramError::BadToken {
                index,
                token: token.to_owned(),
                source,
            })
        })
        .collect()
}

/// Read and parse a program file.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<i64>, ProgramError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ProgramError::Io {
        path: path.to_owned(),
        source,
    })?;
    let program = parse(&text)?;
    debug!("loaded {} words from {}", program.len(), path.display());
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_program() {
        assert_eq!(parse("1,0,0,3,99").unwrap(), vec![1, 0, 0, 3, 99]);
    }

    #[test]
    fn tolerates_whitespace_and_trailing_comma() {
        assert_eq!(parse(" 3, -5 ,\n4,0,99,\n").unwrap(), vec![3, -5, 4, 0, 99]);
    }

    #[test]
    fn rejects_empty_text() {
        assert!(matches!(parse(""), Err(ProgramError::Empty)));
        assert!(matches!(parse(" \n"), Err(ProgramError::Empty)));
        assert!(matches!(parse(","), Err(ProgramError::Empty)));
    }

    #[test]
    fn reports_bad_token() {
        match parse("1,2,x3,99") {
            Err(ProgramError::BadToken { index, token, .. }) => {
                assert_eq!(index, 2);
                assert_eq!(token, "x3");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // only one trailing comma is allowed
        assert!(matches!(
            parse("1,2,,"),
            Err(ProgramError::BadToken { index: 2, .. })
        ));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!("intcode-load-{}.txt", std::process::id()));
        fs::write(&path, "104,7,99\n").unwrap();
        let program = load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(program.unwrap(), vec![104, 7, 99]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("/nonexistent/intcode/program.txt").unwrap_err();
        assert!(matches!(err, ProgramError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/intcode/program.txt"));
    }
}
