//! The image-file loader (§6): a decimal, comma/whitespace-separated integer list,
//! parsed into the initial contents of memory. This is deliberately a pure
//! `&str -> Result<Vec<u16>, LoadError>` function plus a thin file-reading wrapper,
//! not a stateful builder — the engine only ever needs the resulting `Vec<u16>`.

use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: value {value} out of signed 16-bit range (-32768..32767)")]
    OutOfRange { line: usize, value: i64 },
    #[error("line {line}, column {column}: unexpected character {found:?} (expected a digit, '-', comma, or whitespace)")]
    MalformedSeparator {
        line: usize,
        column: usize,
        found: char,
    },
}

/// Reads and parses the image file at `path`.
pub fn load_image_file(path: &Path) -> Result<Vec<u16>, LoadError> {
    let text = fs::read_to_string(path)?;
    parse_image(&text)
}

/// Parses the comma/whitespace-separated decimal integers in `text` into 16-bit
/// cells, each truncated from a signed 16-bit value the way the raw SUBLEQ source
/// stores negative operands (e.g. `-1` becomes `0xFFFF`, the I/O sentinel).
pub fn parse_image(text: &str) -> Result<Vec<u16>, LoadError> {
    let mut cells = Vec::new();
    let mut line = 1usize;
    let mut column = 1usize;
    let mut token = String::new();
    let mut token_line = 1usize;

    for ch in text.chars() {
        match ch {
            '0'..='9' => {
                if token.is_empty() {
                    token_line = line;
                }
                token.push(ch);
            }
            '-' if token.is_empty() => {
                token_line = line;
                token.push(ch);
            }
            ',' | ' ' | '\t' | '\r' | '\n' => {
                if !token.is_empty() {
                    cells.push(parse_token(&token, token_line)?);
                    token.clear();
                }
            }
            other => {
                return Err(LoadError::MalformedSeparator {
                    line,
                    column,
                    found: other,
                });
            }
        }

        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    if !token.is_empty() {
        cells.push(parse_token(&token, token_line)?);
    }

    Ok(cells)
}

fn parse_token(token: &str, line: usize) -> Result<u16, LoadError> {
    // `token` is built only from digits and a leading '-', so this only fails on
    // magnitude (e.g. "-" alone, or a value with no digits at all, which can't
    // happen since an empty token is never pushed).
    let value: i64 = token
        .parse()
        .map_err(|_| LoadError::OutOfRange { line, value: 0 })?;
    if !(-32768..=32767).contains(&value) {
        return Err(LoadError::OutOfRange { line, value });
    }
    Ok(value as i16 as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_integers() {
        assert_eq!(parse_image("1,2,3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn parses_whitespace_separated_integers() {
        assert_eq!(parse_image("1 2\t3\n4").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn parses_mixed_separators_and_trailing_newline() {
        assert_eq!(parse_image("1, 2 ,3\n").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn negative_one_becomes_io_sentinel() {
        assert_eq!(parse_image("-1").unwrap(), vec![0xFFFF]);
    }

    #[test]
    fn empty_input_is_an_empty_image() {
        assert_eq!(parse_image("").unwrap(), Vec::<u16>::new());
        assert_eq!(parse_image("   \n\t").unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn out_of_range_value_is_an_error() {
        let err = parse_image("40000").unwrap_err();
        assert!(matches!(err, LoadError::OutOfRange { line: 1, value: 40000 }));
    }

    #[test]
    fn out_of_range_negative_value_is_an_error() {
        let err = parse_image("-40000").unwrap_err();
        assert!(matches!(err, LoadError::OutOfRange { line: 1, value: -40000 }));
    }

    #[test]
    fn malformed_separator_is_rejected() {
        let err = parse_image("1; 2").unwrap_err();
        assert!(matches!(
            err,
            LoadError::MalformedSeparator { line: 1, column: 2, found: ';' }
        ));
    }

    #[test]
    fn reports_the_line_a_bad_token_started_on() {
        let err = parse_image("1 2\n40000").unwrap_err();
        assert!(matches!(err, LoadError::OutOfRange { line: 2, value: 40000 }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_image_file(Path::new("/nonexistent/path/to/image.subleq")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn loads_a_real_file_from_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "3, 3, 6, 0, 0, -1").unwrap();

        let cells = load_image_file(file.path()).unwrap();
        assert_eq!(cells, vec![3, 3, 6, 0, 0, 0xFFFF]);
    }
}
