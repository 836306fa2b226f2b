//! Program listing
//!
//! The scanner echoes every character it reads to a [`SourceListener`] and
//! retracts it again when the character is pushed back, so the listener always
//! holds exactly the text consumed so far.

use std::fmt::Write;

use crate::utils::Diagnostic;

/// Receives the scanner's character traffic
pub trait SourceListener {
    /// A character was read
    fn echo(&mut self, c: char);
    /// The most recently echoed character was pushed back
    fn retract(&mut self);
}

/// Line-numbered transcript of the source followed by an error block
#[derive(Debug, Default)]
pub struct Listing {
    text: String,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text echoed so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Render the transcript and the trailing error block
    pub fn render<'a>(&self, diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> String {
        let mut out = String::new();
        for (i, line) in self.text.lines().enumerate() {
            writeln!(out, "{:4}  {}", i + 1, line).unwrap();
        }

        let diagnostics: Vec<&Diagnostic> = diagnostics.into_iter().collect();
        if !diagnostics.is_empty() {
            writeln!(out).unwrap();
            writeln!(out, "{} error(s):", diagnostics.len()).unwrap();
            for d in diagnostics {
                writeln!(out, "  {}", d).unwrap();
            }
        }
        out
    }
}

impl SourceListener for Listing {
    fn echo(&mut self, c: char) {
        self.text.push(c);
    }

    fn retract(&mut self) {
        self.text.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{Category, Position};

    #[test]
    fn test_echo_and_retract() {
        let mut listing = Listing::new();
        for c in "ab\nc".chars() {
            listing.echo(c);
        }
        listing.retract();
        assert_eq!(listing.text(), "ab\n");
    }

    #[test]
    fn test_render_with_errors() {
        let mut listing = Listing::new();
        for c in "cd25 p\nmain\n".chars() {
            listing.echo(c);
        }
        let diag = Diagnostic::new(Category::Syntax, "expected 'begin'", Position::new(3, 1));
        let rendered = listing.render([&diag]);
        assert!(rendered.starts_with("   1  cd25 p\n   2  main\n"));
        assert!(rendered.contains("1 error(s):"));
        assert!(rendered.contains("Syntax error at line 3, col 1: expected 'begin'"));
    }
}
