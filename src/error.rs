use std::path::PathBuf;

/// Reasons the csv export cannot be turned into a table.
#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("CSV not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read CSV {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("no columns to parse from file")]
    NoColumns,
    #[error("expected {expected} fields in line {line}, saw {found}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
}
