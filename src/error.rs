use crate::model::ModelError;
use crate::parser::ParseError;
use crate::preprocess::PreprocessError;
use crate::source::Location;

use thiserror::Error;

/// Fatal generation errors, one variant per pipeline stage.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("{0}")]
    Preprocess(#[from] PreprocessError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Parse(e) => Some(e.location()),
            Error::Preprocess(e) => Some(e.location()),
            Error::Model(_) | Error::Io(_) => None,
        }
    }
}

/// A rendered error report for the driver.
#[derive(Debug, Clone)]
pub struct Report {
    msg: String,
    path: Option<String>,
    loc: Option<Location>,
}

impl Report {
    pub fn new(msg: String, path: Option<String>, loc: Option<Location>) -> Self {
        Self { msg, path, loc }
    }
}

pub fn report(report: &Report) {
    eprintln!("\x1b[31mError\x1b[0m: {}", report.msg);
    if let Some(path) = &report.path {
        if let Some(loc) = report.loc {
            eprintln!(" --> {}:{}", path, loc);
        } else {
            eprintln!(" --> {}", path);
        }
    }
}
