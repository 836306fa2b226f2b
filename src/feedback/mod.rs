//! Structured Feedback Module
//!
//! Machine-readable output of a compilation:
//! - JSON diagnostic reports with fix suggestions
//! - Compilation statistics

use serde::{Deserialize, Serialize};

use crate::utils::{Category, Diagnostic};

// ==================== Structured Error Report ====================

/// One diagnostic in report form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code: `L` lexical, `S` syntax, `E` semantic
    pub code: String,

    pub severity: Severity,

    pub category: Category,

    /// Human-readable message
    pub message: String,

    pub location: Location,

    /// Suggested fixes, most likely first
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Description of the fix
    pub message: String,

    /// Confidence in this suggestion (0.0 - 1.0)
    pub confidence: f64,
}

// ==================== Compilation Feedback ====================

/// Complete report of one compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationFeedback {
    pub success: bool,

    pub source_file: String,

    /// All diagnostics, in the order they were found
    pub diagnostics: Vec<ErrorReport>,

    pub stats: CompilationStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationStats {
    pub lexical_errors: usize,
    pub syntax_errors: usize,
    pub semantic_errors: usize,

    /// Source lines
    pub loc: usize,

    pub function_count: usize,

    pub symbol_count: usize,

    /// Lines of generated code, labels included
    pub instruction_count: usize,

    pub pool_entries: usize,

    pub total_time_ms: u64,
}

// ==================== Diagnostic Conversion ====================

impl ErrorReport {
    pub fn from_diagnostic(diagnostic: &Diagnostic, file_name: &str) -> Self {
        let code = match diagnostic.category {
            Category::Lexical => "L0001",
            Category::Syntax => "S0001",
            Category::Semantic => "E0001",
        };
        let mut report = Self {
            code: code.to_string(),
            severity: Severity::Error,
            category: diagnostic.category,
            message: diagnostic.message.clone(),
            location: Location {
                file: file_name.to_string(),
                line: diagnostic.line,
                column: diagnostic.col,
            },
            suggestions: suggest(diagnostic),
        };
        report.sort_suggestions();
        report
    }

    /// Sort suggestions by confidence (highest first)
    pub fn sort_suggestions(&mut self) {
        self.suggestions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

fn suggestion(message: impl Into<String>, confidence: f64) -> Suggestion {
    Suggestion {
        message: message.into(),
        confidence,
    }
}

/// Text between the first pair of single quotes
fn quoted(message: &str) -> Option<&str> {
    let start = message.find('\'')? + 1;
    let len = message[start..].find('\'')?;
    Some(&message[start..start + len])
}

/// Fix suggestions keyed on the shape of the message
fn suggest(diagnostic: &Diagnostic) -> Vec<Suggestion> {
    let message = diagnostic.message.as_str();
    let mut suggestions = Vec::new();

    match diagnostic.category {
        Category::Lexical => {
            if message.contains("unterminated string") {
                suggestions.push(suggestion("Close the string with '\"' on the same line", 0.9));
            } else if message.contains("comment") {
                suggestions.push(suggestion("Close the block comment with '**/'", 0.9));
            } else {
                suggestions.push(suggestion("Remove the unrecognized characters", 0.6));
            }
        }
        Category::Syntax => {
            if message.starts_with("expected ';'") {
                suggestions.push(suggestion("Insert ';' after the previous statement", 0.9));
            } else if message.starts_with("nesting too deep") {
                suggestions.push(suggestion("Split the construct into smaller functions", 0.5));
            } else if let Some(token) = message.strip_prefix("expected ").and_then(quoted) {
                suggestions.push(suggestion(format!("Insert '{}'", token), 0.7));
            }
        }
        Category::Semantic => {
            if message.contains("used before declaration") {
                if let Some(name) = quoted(message) {
                    suggestions.push(suggestion(format!("Declare '{}' before this point", name), 0.8));
                }
                suggestions.push(suggestion("Check the spelling of the identifier", 0.4));
            } else if message.starts_with("duplicate identifier") {
                suggestions.push(suggestion("Rename one of the declarations", 0.8));
            } else if message.starts_with("missing return") {
                suggestions.push(suggestion("Add a 'return' statement with a value", 0.9));
            } else if message.contains("expects") && message.contains("argument(s)") {
                suggestions.push(suggestion("Match the number of arguments to the parameter list", 0.9));
            } else if message.starts_with("cannot assign real") {
                suggestions.push(suggestion("Declare the target as real", 0.6));
            } else if message.starts_with("division by zero") {
                suggestions.push(suggestion("Use a non-zero divisor", 0.9));
            }
        }
    }
    suggestions
}

impl CompilationFeedback {
    pub fn new<'a>(
        source_file: impl Into<String>,
        diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
        mut stats: CompilationStats,
    ) -> Self {
        let source_file = source_file.into();
        let diagnostics: Vec<ErrorReport> = diagnostics
            .into_iter()
            .map(|d| ErrorReport::from_diagnostic(d, &source_file))
            .collect();
        let count = |category| diagnostics.iter().filter(|r| r.category == category).count();
        stats.lexical_errors = count(Category::Lexical);
        stats.syntax_errors = count(Category::Syntax);
        stats.semantic_errors = count(Category::Semantic);
        Self {
            success: diagnostics.is_empty(),
            source_file,
            diagnostics,
            stats,
        }
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Output as compact JSON (for programmatic use)
    pub fn to_json_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Position;

    #[test]
    fn test_report_from_semantic_diagnostic() {
        let d = Diagnostic::new(Category::Semantic, "'y' used before declaration", Position::new(4, 9));
        let report = ErrorReport::from_diagnostic(&d, "t.cd");
        assert_eq!(report.code, "E0001");
        assert_eq!(report.location, Location { file: "t.cd".into(), line: 4, column: 9 });
        assert_eq!(report.suggestions[0].message, "Declare 'y' before this point");
    }

    #[test]
    fn test_syntax_suggestion_names_missing_token() {
        let d = Diagnostic::new(Category::Syntax, "expected 'begin' before main statements, found 'x'", Position::new(1, 1));
        let report = ErrorReport::from_diagnostic(&d, "t.cd");
        assert_eq!(report.suggestions[0].message, "Insert 'begin'");
    }

    #[test]
    fn test_feedback_counts_and_json() {
        let diags = vec![
            Diagnostic::new(Category::Lexical, "unterminated string", Position::new(1, 1)),
            Diagnostic::new(Category::Semantic, "duplicate identifier 'x'", Position::new(2, 1)),
        ];
        let feedback = CompilationFeedback::new("t.cd", &diags, CompilationStats::default());
        assert!(!feedback.success);
        assert_eq!(feedback.stats.lexical_errors, 1);
        assert_eq!(feedback.stats.semantic_errors, 1);

        let json: serde_json::Value = serde_json::from_str(&feedback.to_json_compact()).unwrap();
        assert_eq!(json["diagnostics"][1]["category"], "Semantic");
        assert_eq!(json["diagnostics"][0]["severity"], "error");
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_clean_feedback() {
        let feedback = CompilationFeedback::new("t.cd", &[], CompilationStats::default());
        assert!(feedback.success);
        assert!(feedback.to_json().contains("\"success\": true"));
    }
}
