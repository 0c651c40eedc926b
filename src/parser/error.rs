use crate::source::Location;
use thiserror::Error;

/// Parse errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected token: {found}")]
    UnexpectedToken { found: String, loc: Location },

    #[error("unexpected end of file")]
    UnexpectedEof { loc: Location },

    #[error("invalid integer constant: {text}")]
    InvalidNumber { text: String, loc: Location },

    #[error("unterminated string literal")]
    UnterminatedString { loc: Location },

    #[error("missing \"endif\"")]
    MissingEndif { loc: Location },

    #[error("\"endif\" without matching \"if\"")]
    UnmatchedEndif { loc: Location },

    #[error("unexpected character {ch:?}")]
    UnexpectedChar { ch: char, loc: Location },
}

impl ParseError {
    pub fn location(&self) -> Location {
        match *self {
            ParseError::UnexpectedToken { loc, .. } => loc,
            ParseError::UnexpectedEof { loc } => loc,
            ParseError::InvalidNumber { loc, .. } => loc,
            ParseError::UnterminatedString { loc } => loc,
            ParseError::MissingEndif { loc } => loc,
            ParseError::UnmatchedEndif { loc } => loc,
            ParseError::UnexpectedChar { loc, .. } => loc,
        }
    }
}
