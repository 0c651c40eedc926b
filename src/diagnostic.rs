//! Line-oriented diagnostics for non-fatal generation issues.
//!
//! Fatal errors (arity mismatches, malformed constructor options) abort the
//! offending declaration and travel through [`crate::error::Error`]; every
//! other detected issue lands here, generation continues, and a visible
//! marker is embedded at the corresponding point in the output.

use crate::source::Location;

/// Individual diagnostic message with an optional input location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub loc: Option<Location>,
}

/// Collector for non-fatal issues found during preprocessing and emission.
#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic with a known input location.
    pub fn report(&mut self, message: String, loc: Location) {
        self.messages.push(Diagnostic {
            message,
            loc: Some(loc),
        });
    }

    /// Records a diagnostic with no usable location.
    pub fn report_unlocated(&mut self, message: String) {
        self.messages.push(Diagnostic { message, loc: None });
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    /// Formats one diagnostic per line, each prefixed with the fixed tool
    /// tag and the originating source location when available.
    pub fn render(&self, path: &str) -> String {
        let mut out = String::new();
        for d in &self.messages {
            match d.loc {
                Some(loc) => out.push_str(&format!("tracegen: {}:{}: {}\n", path, loc, d.message)),
                None => out.push_str(&format!("tracegen: {}: {}\n", path, d.message)),
            }
        }
        out
    }

    /// Prints all collected diagnostics to stderr.
    pub fn flush(&self, path: &str) {
        eprint!("{}", self.render(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_line_oriented_and_tagged() {
        let mut diag = Diagnostics::new();
        diag.report("unknown argument \"x\"".to_string(), Location::new(4, 7));
        diag.report_unlocated("unresolved substitution id $3".to_string());
        let text = diag.render("calls.def");
        assert_eq!(
            text,
            "tracegen: calls.def:4:7: unknown argument \"x\"\n\
             tracegen: calls.def: unresolved substitution id $3\n"
        );
    }
}
