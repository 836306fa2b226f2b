//! Compilation pipeline
//!
//! Scan, parse, analyze, and generate code when the first three stages found
//! nothing to report.

use std::time::Instant;

use crate::backend::{self, Module};
use crate::feedback::{CompilationFeedback, CompilationStats};
use crate::frontend::ast::{Ast, NodeKind};
use crate::frontend::lexer::Lexer;
use crate::frontend::listing::Listing;
use crate::frontend::parser::{Parser, DEFAULT_MAX_DEPTH};
use crate::frontend::semantic::{self, Analysis};
use crate::frontend::token::Token;
use crate::utils::{Diagnostics, Error, Result};

/// Settings threaded through the pipeline
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Nesting limit of the parser
    pub max_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Everything one run produced
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub ast: Ast,
    pub analysis: Analysis,
    /// Lexical, then syntax, then semantic diagnostics
    pub diagnostics: Diagnostics,
    /// Source text as the scanner consumed it
    pub listing: Listing,
    /// Present only when there were no diagnostics
    pub module: Option<Module>,
    pub elapsed_ms: u64,
}

impl Compilation {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Line-numbered source with the error block
    pub fn render_listing(&self) -> String {
        self.listing.render(self.diagnostics.iter())
    }

    /// Machine-readable report of this run
    pub fn feedback(&self, file_name: &str) -> CompilationFeedback {
        let function_count = self
            .ast
            .root()
            .and_then(|root| self.ast.child(root, 2))
            .map(|funcs| self.ast.children(funcs).iter().filter(|&&f| self.ast.kind(f) == NodeKind::FuncDef).count())
            .unwrap_or(0);
        let stats = CompilationStats {
            loc: self.listing.text().lines().count(),
            function_count,
            symbol_count: self.analysis.symbols.len(),
            instruction_count: self.module.as_ref().map_or(0, |m| m.lines().count()),
            pool_entries: self.module.as_ref().map_or(0, |m| m.constants.len()),
            total_time_ms: self.elapsed_ms,
            ..CompilationStats::default()
        };
        CompilationFeedback::new(file_name, self.diagnostics.iter(), stats)
    }

    /// The generated module, or every diagnostic as an error
    pub fn into_module(self) -> Result<Module> {
        match self.module {
            Some(module) if self.diagnostics.is_empty() => Ok(module),
            _ => Err(Error::Diagnostics(self.diagnostics.into_vec())),
        }
    }
}

/// Run the whole pipeline over `source`
///
/// Source problems end up in [`Compilation::diagnostics`]; `Err` is reserved
/// for internal code generation failures.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Compilation> {
    let start = Instant::now();

    let mut listing = Listing::new();
    let (tokens, mut diagnostics) = {
        let mut lexer = Lexer::new(source).with_listener(&mut listing);
        let tokens = lexer.tokenize();
        (tokens, lexer.take_diagnostics())
    };

    let mut parser = Parser::from_tokens(tokens.clone()).with_max_depth(options.max_depth);
    parser.parse_program();
    let (ast, syntax) = parser.into_parts();
    diagnostics.extend(syntax);

    let (analysis, semantic) = semantic::analyze(&ast);
    diagnostics.extend(semantic);

    let module = if diagnostics.is_empty() {
        Some(backend::generate(&ast, &analysis)?)
    } else {
        log::debug!("codegen skipped: {} diagnostics", diagnostics.len());
        None
    };

    Ok(Compilation {
        tokens,
        ast,
        analysis,
        diagnostics,
        listing,
        module,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

/// Compile straight to a module
pub fn compile_to_module(source: &str) -> Result<Module> {
    compile(source, &CompileOptions::default())?.into_module()
}
