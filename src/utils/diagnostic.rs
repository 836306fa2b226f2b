//! Collected compiler diagnostics
//!
//! Every stage records problems here instead of returning early, so a single
//! run can report many of them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::Position;

/// Which stage found the problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Lexical,
    Syntax,
    Semantic,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Lexical => write!(f, "Lexical"),
            Category::Syntax => write!(f, "Syntax"),
            Category::Semantic => write!(f, "Semantic"),
        }
    }
}

/// A single diagnostic record
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{category} error at line {line}, col {col}: {message}")]
pub struct Diagnostic {
    pub category: Category,
    pub message: String,
    pub line: u32,
    pub col: u32,
}

impl Diagnostic {
    pub fn new(category: Category, message: impl Into<String>, at: Position) -> Self {
        Self {
            category,
            message: message.into(),
            line: at.line,
            col: at.col,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }
}

/// An ordered collection of diagnostics
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lexical(&mut self, message: impl Into<String>, at: Position) {
        self.push(Diagnostic::new(Category::Lexical, message, at));
    }

    pub fn syntax(&mut self, message: impl Into<String>, at: Position) {
        self.push(Diagnostic::new(Category::Syntax, message, at));
    }

    pub fn semantic(&mut self, message: impl Into<String>, at: Position) {
        self.push(Diagnostic::new(Category::Semantic, message, at));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::debug!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Count diagnostics of one category
    pub fn count(&self, category: Category) -> usize {
        self.items.iter().filter(|d| d.category == category).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let d = Diagnostic::new(Category::Syntax, "expected ';'", Position::new(3, 7));
        assert_eq!(d.to_string(), "Syntax error at line 3, col 7: expected ';'");
    }

    #[test]
    fn test_count_by_category() {
        let mut diags = Diagnostics::new();
        diags.lexical("bad char", Position::new(1, 1));
        diags.semantic("undeclared", Position::new(2, 1));
        diags.semantic("mismatch", Position::new(2, 5));
        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(Category::Semantic), 2);
        assert_eq!(diags.count(Category::Syntax), 0);
    }
}
