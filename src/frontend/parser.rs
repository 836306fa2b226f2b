//! Parser for CD25
//!
//! Recursive descent, one method per grammar rule. Syntax errors never abort
//! the parse: the offending construct is reported once, the cursor is
//! synchronized to a safe token and an `Undefined` node takes its place, so
//! later passes always see a structurally complete tree.

use crate::frontend::ast::{Ast, NodeId, NodeKind};
use crate::frontend::cursor::TokenCursor;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Diagnostics, Position};

/// Default limit on expression and statement nesting
pub const DEFAULT_MAX_DEPTH: usize = 256;

// ==================== Synchronization Sets ====================

const SECTION_STARTS: &[TokenKind] = &[
    TokenKind::Constants,
    TokenKind::Types,
    TokenKind::Arrays,
    TokenKind::Func,
    TokenKind::Main,
];

const INIT_FOLLOW: &[TokenKind] = &[
    TokenKind::Comma,
    TokenKind::Types,
    TokenKind::Arrays,
    TokenKind::Func,
    TokenKind::Main,
];

const TYPEDEF_FOLLOW: &[TokenKind] = &[TokenKind::End, TokenKind::Arrays, TokenKind::Func, TokenKind::Main];

const DECL_FOLLOW: &[TokenKind] = &[
    TokenKind::Comma,
    TokenKind::End,
    TokenKind::Begin,
    TokenKind::RParen,
    TokenKind::Func,
    TokenKind::Main,
];

const FUNC_FOLLOW: &[TokenKind] = &[TokenKind::Begin, TokenKind::Func, TokenKind::Main];

const STAT_FOLLOW: &[TokenKind] = &[TokenKind::Semicolon, TokenKind::End, TokenKind::Else, TokenKind::Until];

const STAT_STARTS: &[TokenKind] = &[
    TokenKind::For,
    TokenKind::If,
    TokenKind::Repeat,
    TokenKind::In,
    TokenKind::Out,
    TokenKind::Return,
];

/// Tokens that end a statement list
const STATS_STOP: &[TokenKind] = &[
    TokenKind::End,
    TokenKind::Else,
    TokenKind::Until,
    TokenKind::Func,
    TokenKind::Main,
    TokenKind::Cd25,
    TokenKind::Eof,
];

/// Tokens before which a statement's `;` may be omitted
const BLOCK_CLOSERS: &[TokenKind] = &[TokenKind::End, TokenKind::Else, TokenKind::Until];

/// The parser
pub struct Parser {
    cursor: TokenCursor,
    ast: Ast,
    diagnostics: Diagnostics,
    depth: usize,
    max_depth: usize,
    /// Cursor position of the last reported error, to stop cascades
    last_error_at: Option<usize>,
}

impl Parser {
    /// Create a new parser from a lexer; lexical diagnostics are carried over
    pub fn new(mut lexer: Lexer<'_>) -> Self {
        let tokens = lexer.tokenize();
        let mut parser = Self::from_tokens(tokens);
        parser.diagnostics = lexer.take_diagnostics();
        parser
    }

    /// Create a parser from pre-tokenized input
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            ast: Ast::new(),
            diagnostics: Diagnostics::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            last_error_at: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Hand over the tree and every diagnostic collected so far
    pub fn into_parts(self) -> (Ast, Diagnostics) {
        (self.ast, self.diagnostics)
    }

    // ==================== Helper Methods ====================

    fn position(&self) -> Position {
        self.cursor.position()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.cursor.check(kind)
    }

    fn check_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.cursor.peek_kind())
    }

    fn describe_found(token: &Token) -> String {
        match token.kind {
            TokenKind::Ident | TokenKind::IntLit | TokenKind::RealLit => {
                format!("{} '{}'", token.kind.describe(), token.text())
            }
            TokenKind::StrLit => format!("string \"{}\"", token.text()),
            kind => kind.describe().to_string(),
        }
    }

    /// Record a syntax error at the current token
    fn error(&mut self, message: impl Into<String>) {
        let here = self.cursor.mark();
        if self.last_error_at == Some(here) {
            return;
        }
        self.last_error_at = Some(here);
        let token = self.cursor.peek();
        // Undefined tokens were already reported by the scanner
        if token.kind == TokenKind::Undefined {
            return;
        }
        let message = format!("{}, found {}", message.into(), Self::describe_found(token));
        let at = token.position();
        self.diagnostics.syntax(message, at);
    }

    /// Skip to a synchronizing token after an error
    fn synchronize(&mut self, follow: &[TokenKind], starts: &[TokenKind]) {
        self.cursor.synchronize_to_either(follow, starts);
        // An error right at the recovery point is the same mistake
        if self.last_error_at.is_some() {
            self.last_error_at = Some(self.cursor.mark());
        }
    }

    /// Synchronize and leave a placeholder positioned at the offending token
    fn recover(&mut self, follow: &[TokenKind]) -> NodeId {
        let at = self.position();
        self.synchronize(follow, &[]);
        self.ast.undefined(at)
    }

    /// Consume a mandatory token or report it missing
    fn require(&mut self, kind: TokenKind, context: &str) -> Option<Token> {
        let token = self.cursor.expect(kind);
        if token.is_none() {
            self.error(format!("expected {} {}", kind.describe(), context));
        }
        token
    }

    fn node(&mut self, kind: NodeKind, lexeme: Option<String>, at: Position, children: Vec<NodeId>) -> NodeId {
        self.ast.push(kind, lexeme, at, children)
    }

    fn too_deep(&mut self) -> bool {
        if self.depth >= self.max_depth {
            self.error(format!("nesting too deep (limit {})", self.max_depth));
            true
        } else {
            false
        }
    }

    // ==================== Program ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> NodeId {
        let start = self.position();
        self.require(TokenKind::Cd25, "at program start");

        let name = match self.cursor.expect(TokenKind::Ident) {
            Some(token) => self.ast.leaf(NodeKind::SimpleVar, &token),
            None => {
                self.error("expected program name after 'cd25'");
                self.recover(SECTION_STARTS)
            }
        };

        let globals = self.parse_globals();
        let functions = self.parse_functions();
        let main = self.parse_main();

        if !self.cursor.is_at_end() {
            self.error("unexpected input after end of program");
        }

        let program = self.node(NodeKind::Program, None, start, vec![name, globals, functions, main]);
        self.ast.set_root(program);
        log::debug!(
            "parsed {} nodes with {} diagnostic(s)",
            self.ast.len(),
            self.diagnostics.len()
        );
        program
    }

    fn parse_globals(&mut self) -> NodeId {
        let at = self.position();
        let constants = self.parse_constants();
        let types = self.parse_types();
        let arrays = self.parse_arrays();
        self.node(NodeKind::Globals, None, at, vec![constants, types, arrays])
    }

    fn parse_constants(&mut self) -> NodeId {
        let at = self.position();
        let mut inits = Vec::new();
        if self.cursor.match_kind(TokenKind::Constants) {
            loop {
                inits.push(self.parse_init());
                if !self.cursor.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.node(NodeKind::Constants, None, at, inits)
    }

    fn parse_init(&mut self) -> NodeId {
        let Some(name) = self.require(TokenKind::Ident, "in constant declaration") else {
            return self.recover(INIT_FOLLOW);
        };
        if self.require(TokenKind::Is, "after constant name").is_none() {
            return self.recover(INIT_FOLLOW);
        }
        let value = self.parse_expr();
        self.node(NodeKind::Init, name.lexeme.clone(), name.position(), vec![value])
    }

    fn parse_types(&mut self) -> NodeId {
        let at = self.position();
        let mut defs = Vec::new();
        if self.cursor.match_kind(TokenKind::Types) {
            loop {
                defs.push(self.parse_typedef());
                if !self.check(TokenKind::Ident) {
                    break;
                }
            }
        }
        self.node(NodeKind::Types, None, at, defs)
    }

    /// Skip past the `end` that closes a broken definition
    fn recover_past_end(&mut self, follow: &[TokenKind]) -> NodeId {
        let node = self.recover(follow);
        self.cursor.match_kind(TokenKind::End);
        node
    }

    fn parse_typedef(&mut self) -> NodeId {
        let Some(name) = self.require(TokenKind::Ident, "in type definition") else {
            return self.recover_past_end(TYPEDEF_FOLLOW);
        };
        if self.require(TokenKind::Is, "after type name").is_none() {
            return self.recover_past_end(TYPEDEF_FOLLOW);
        }

        if self.cursor.match_kind(TokenKind::Array) {
            if self.require(TokenKind::LBracket, "after 'array'").is_none() {
                return self.recover_past_end(TYPEDEF_FOLLOW);
            }
            let size = self.parse_expr();
            if self.require(TokenKind::RBracket, "after array size").is_none()
                || self.require(TokenKind::Of, "after array size").is_none()
            {
                return self.recover_past_end(TYPEDEF_FOLLOW);
            }
            let elem = self.parse_type_name(false);
            self.require(TokenKind::End, "to close array type definition");
            return self.node(NodeKind::ArrayTypeDef, name.lexeme.clone(), name.position(), vec![size, elem]);
        }

        let mut fields = Vec::new();
        loop {
            fields.push(self.parse_decl("as struct field"));
            if !self.cursor.match_kind(TokenKind::Comma) {
                break;
            }
        }
        if self.require(TokenKind::End, "to close struct definition").is_none() {
            self.recover_past_end(TYPEDEF_FOLLOW);
        }
        self.node(NodeKind::StructDef, name.lexeme.clone(), name.position(), fields)
    }

    fn parse_arrays(&mut self) -> NodeId {
        let at = self.position();
        let mut decls = Vec::new();
        if self.cursor.match_kind(TokenKind::Arrays) {
            loop {
                decls.push(self.parse_decl("in array declaration"));
                if !self.cursor.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.node(NodeKind::Arrays, None, at, decls)
    }

    /// `id : typename`
    fn parse_decl(&mut self, context: &str) -> NodeId {
        let Some(name) = self.require(TokenKind::Ident, context) else {
            return self.recover(DECL_FOLLOW);
        };
        if self.require(TokenKind::Colon, "after declared name").is_none() {
            return self.recover(DECL_FOLLOW);
        }
        let ty = self.parse_type_name(false);
        self.node(NodeKind::Decl, name.lexeme.clone(), name.position(), vec![ty])
    }

    fn parse_type_name(&mut self, allow_void: bool) -> NodeId {
        let token = self.cursor.peek().clone();
        let name = match token.kind {
            TokenKind::Integer => "integer".to_string(),
            TokenKind::Real => "real".to_string(),
            TokenKind::Boolean => "boolean".to_string(),
            TokenKind::Void if allow_void => "void".to_string(),
            TokenKind::Ident => token.text().to_string(),
            _ => {
                self.error("expected type name");
                return self.ast.undefined(token.position());
            }
        };
        self.cursor.consume();
        self.node(NodeKind::TypeName, Some(name), token.position(), Vec::new())
    }

    // ==================== Functions ====================

    fn parse_functions(&mut self) -> NodeId {
        let at = self.position();
        let mut funcs = Vec::new();
        while self.check(TokenKind::Func) {
            funcs.push(self.parse_func());
        }
        self.node(NodeKind::Functions, None, at, funcs)
    }

    fn parse_func(&mut self) -> NodeId {
        let at = self.position();
        self.cursor.consume(); // func

        match self.parse_func_header() {
            Some((name, params, ret)) => {
                let locals = self.parse_decl_list();
                self.require(TokenKind::Begin, "before function body");
                let body = self.parse_stats();
                self.require(TokenKind::End, "to close function body");
                self.node(NodeKind::FuncDef, name.lexeme.clone(), name.position(), vec![params, ret, locals, body])
            }
            None => {
                // Keep checking the body's syntax even though the header is lost
                self.synchronize(FUNC_FOLLOW, &[]);
                if self.cursor.match_kind(TokenKind::Begin) {
                    self.parse_stats();
                    self.require(TokenKind::End, "to close function body");
                }
                self.ast.undefined(at)
            }
        }
    }

    fn parse_func_header(&mut self) -> Option<(Token, NodeId, NodeId)> {
        let name = self.require(TokenKind::Ident, "after 'func'")?;
        let params_at = self.position();
        self.require(TokenKind::LParen, "after function name")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.parse_param());
                if !self.cursor.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.require(TokenKind::RParen, "after parameters")?;
        self.require(TokenKind::Colon, "before return type")?;
        let ret = self.parse_type_name(true);
        let params = self.node(NodeKind::ParamList, None, params_at, params);
        Some((name, params, ret))
    }

    fn parse_param(&mut self) -> NodeId {
        let kind = if self.cursor.match_kind(TokenKind::Const) {
            NodeKind::ConstParam
        } else {
            NodeKind::Param
        };
        let Some(name) = self.require(TokenKind::Ident, "as parameter name") else {
            return self.recover(DECL_FOLLOW);
        };
        if self.require(TokenKind::Colon, "after parameter name").is_none() {
            return self.recover(DECL_FOLLOW);
        }
        let ty = self.parse_type_name(false);
        self.node(kind, name.lexeme.clone(), name.position(), vec![ty])
    }

    /// Optional `decl {, decl}` before `begin`
    fn parse_decl_list(&mut self) -> NodeId {
        let at = self.position();
        let mut decls = Vec::new();
        if self.check(TokenKind::Ident) {
            loop {
                decls.push(self.parse_decl("in declaration"));
                if !self.cursor.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.node(NodeKind::DeclList, None, at, decls)
    }

    // ==================== Main ====================

    fn parse_main(&mut self) -> NodeId {
        let at = self.position();
        self.require(TokenKind::Main, "before main body");
        let decls = self.parse_decl_list();
        self.require(TokenKind::Begin, "before main statements");
        let stats = self.parse_stats();
        self.require(TokenKind::End, "after main statements");

        let trailing = if self.require(TokenKind::Cd25, "after 'end' of main").is_some() {
            match self.cursor.expect(TokenKind::Ident) {
                Some(token) => self.ast.leaf(NodeKind::SimpleVar, &token),
                None => {
                    self.error("expected program name after trailing 'cd25'");
                    self.ast.undefined(self.cursor.position())
                }
            }
        } else {
            self.ast.undefined(self.cursor.position())
        };

        self.node(NodeKind::Main, None, at, vec![decls, stats, trailing])
    }

    // ==================== Statements ====================

    fn starts_statement(&self) -> bool {
        self.check(TokenKind::Ident) || self.check_any(STAT_STARTS)
    }

    fn parse_stats(&mut self) -> NodeId {
        let at = self.position();
        let mut stats = Vec::new();

        if self.too_deep() {
            self.synchronize(&[TokenKind::End], &[]);
            return self.node(NodeKind::Stats, None, at, stats);
        }
        self.depth += 1;

        while !self.check_any(STATS_STOP) {
            let before = self.cursor.mark();
            if self.starts_statement() {
                stats.push(self.parse_stat());
            } else {
                self.error("expected statement");
                let placeholder = self.position();
                self.synchronize(STAT_FOLLOW, STAT_STARTS);
                self.cursor.match_kind(TokenKind::Semicolon);
                stats.push(self.ast.undefined(placeholder));
            }
            if self.cursor.mark() == before {
                self.cursor.consume();
            }
        }

        self.depth -= 1;
        self.node(NodeKind::Stats, None, at, stats)
    }

    fn parse_stat(&mut self) -> NodeId {
        match self.cursor.peek_kind() {
            TokenKind::For => self.parse_for(),
            TokenKind::If => self.parse_if(),
            TokenKind::Repeat => {
                let stat = self.parse_repeat();
                self.terminator();
                stat
            }
            TokenKind::In => {
                let stat = self.parse_input();
                self.terminator();
                stat
            }
            TokenKind::Out => {
                let stat = self.parse_output();
                self.terminator();
                stat
            }
            TokenKind::Return => {
                let stat = self.parse_return();
                self.terminator();
                stat
            }
            _ => {
                // One token past the identifier decides call vs assignment
                let stat = if self.cursor.lookahead(1).kind == TokenKind::LParen {
                    self.parse_call(NodeKind::Call)
                } else {
                    self.parse_assignment()
                };
                self.terminator();
                stat
            }
        }
    }

    /// `;` after a simple statement, optional right before a block closer
    fn terminator(&mut self) {
        if self.cursor.match_kind(TokenKind::Semicolon) || self.check_any(BLOCK_CLOSERS) {
            return;
        }
        self.error("expected ';' after statement");
        self.synchronize(STAT_FOLLOW, STAT_STARTS);
        self.cursor.match_kind(TokenKind::Semicolon);
    }

    fn parse_for(&mut self) -> NodeId {
        let at = self.position();
        self.cursor.consume(); // for
        self.require(TokenKind::LParen, "after 'for'");
        let inits = self.parse_assign_list(TokenKind::Semicolon);
        self.require(TokenKind::Semicolon, "after for-loop initializers");
        let cond = self.parse_bool();
        self.require(TokenKind::RParen, "after for-loop condition");
        let body = self.parse_stats();
        self.require(TokenKind::End, "to close 'for'");
        self.node(NodeKind::For, None, at, vec![inits, cond, body])
    }

    fn parse_repeat(&mut self) -> NodeId {
        let at = self.position();
        self.cursor.consume(); // repeat
        self.require(TokenKind::LParen, "after 'repeat'");
        let inits = self.parse_assign_list(TokenKind::RParen);
        self.require(TokenKind::RParen, "after repeat initializers");
        let body = self.parse_stats();
        self.require(TokenKind::Until, "to close 'repeat'");
        let cond = self.parse_bool();
        self.node(NodeKind::Repeat, None, at, vec![inits, body, cond])
    }

    /// Comma separated assignments, possibly empty when `close` comes first
    fn parse_assign_list(&mut self, close: TokenKind) -> NodeId {
        let at = self.position();
        let mut list = Vec::new();
        if !self.check(close) {
            loop {
                list.push(self.parse_assignment());
                if !self.cursor.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.node(NodeKind::AssignList, None, at, list)
    }

    fn parse_if(&mut self) -> NodeId {
        let at = self.position();
        self.cursor.consume(); // if
        self.require(TokenKind::LParen, "after 'if'");
        let cond = self.parse_bool();
        self.require(TokenKind::RParen, "after if condition");
        let then_branch = self.parse_stats();
        let node = if self.cursor.match_kind(TokenKind::Else) {
            let else_branch = self.parse_stats();
            self.node(NodeKind::IfElse, None, at, vec![cond, then_branch, else_branch])
        } else {
            self.node(NodeKind::If, None, at, vec![cond, then_branch])
        };
        self.require(TokenKind::End, "to close 'if'");
        node
    }

    fn parse_assignment(&mut self) -> NodeId {
        let at = self.position();
        let target = self.parse_var();
        let kind = match self.cursor.peek_kind() {
            TokenKind::Assign => NodeKind::Assign,
            TokenKind::PlusEq => NodeKind::AddAssign,
            TokenKind::MinusEq => NodeKind::SubAssign,
            TokenKind::StarEq => NodeKind::MulAssign,
            TokenKind::SlashEq => NodeKind::DivAssign,
            _ => {
                self.error("expected assignment operator");
                return self.ast.undefined(at);
            }
        };
        self.cursor.consume();
        let value = self.parse_bool();
        self.node(kind, None, at, vec![target, value])
    }

    fn parse_input(&mut self) -> NodeId {
        let at = self.position();
        self.cursor.consume(); // in
        self.require(TokenKind::Shr, "after 'in'");
        let mut vars = vec![self.parse_var()];
        while self.cursor.match_kind(TokenKind::Shr) || self.cursor.match_kind(TokenKind::Comma) {
            vars.push(self.parse_var());
        }
        self.node(NodeKind::Input, None, at, vars)
    }

    fn parse_output(&mut self) -> NodeId {
        let at = self.position();
        self.cursor.consume(); // out
        self.require(TokenKind::Shl, "after 'out'");
        let mut items = vec![self.parse_print_item()];
        while self.cursor.match_kind(TokenKind::Shl) || self.cursor.match_kind(TokenKind::Comma) {
            items.push(self.parse_print_item());
        }
        self.node(NodeKind::Output, None, at, items)
    }

    fn parse_print_item(&mut self) -> NodeId {
        let token = self.cursor.peek().clone();
        match token.kind {
            TokenKind::Line => {
                self.cursor.consume();
                self.ast.leaf(NodeKind::Line, &token)
            }
            TokenKind::StrLit => {
                self.cursor.consume();
                self.ast.leaf(NodeKind::StrLit, &token)
            }
            _ => self.parse_bool(),
        }
    }

    fn parse_return(&mut self) -> NodeId {
        let at = self.position();
        self.cursor.consume(); // return
        if self.cursor.match_kind(TokenKind::Void) || self.check_any(STAT_FOLLOW) || self.cursor.is_at_end() {
            return self.node(NodeKind::Return, None, at, Vec::new());
        }
        let value = self.parse_bool();
        self.node(NodeKind::Return, None, at, vec![value])
    }

    /// `id ( [bool {, bool}] )` as a statement (`Call`) or expression (`FnCall`)
    fn parse_call(&mut self, kind: NodeKind) -> NodeId {
        let name = self.cursor.consume();
        self.cursor.consume(); // (
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_bool());
                if !self.cursor.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.require(TokenKind::RParen, "after call arguments");
        self.node(kind, name.lexeme.clone(), name.position(), args)
    }

    /// `id`, `id[expr]` or `id[expr].field`
    fn parse_var(&mut self) -> NodeId {
        let Some(name) = self.cursor.expect(TokenKind::Ident) else {
            self.error("expected variable name");
            return self.ast.undefined(self.cursor.position());
        };
        let base = self.ast.leaf(NodeKind::SimpleVar, &name);
        if !self.cursor.match_kind(TokenKind::LBracket) {
            return base;
        }
        if self.too_deep() {
            return self.recover(STAT_FOLLOW);
        }

        self.depth += 1;
        let index = self.parse_expr();
        self.depth -= 1;
        self.require(TokenKind::RBracket, "after array index");

        if self.cursor.match_kind(TokenKind::Dot) {
            let field = match self.cursor.expect(TokenKind::Ident) {
                Some(token) => self.ast.leaf(NodeKind::Field, &token),
                None => {
                    self.error("expected field name after '.'");
                    self.ast.undefined(self.cursor.position())
                }
            };
            let field_name = self.ast.node(field).lexeme.clone();
            self.node(NodeKind::ArrayField, field_name, name.position(), vec![base, index, field])
        } else {
            self.node(NodeKind::ArrayElement, None, name.position(), vec![base, index])
        }
    }

    // ==================== Expressions ====================

    /// `rel {(and | or | xor) rel}`
    fn parse_bool(&mut self) -> NodeId {
        if self.too_deep() {
            return self.recover(STAT_FOLLOW);
        }
        self.depth += 1;

        let mut left = self.parse_rel();
        loop {
            let kind = match self.cursor.peek_kind() {
                TokenKind::And => NodeKind::And,
                TokenKind::Or => NodeKind::Or,
                TokenKind::Xor => NodeKind::Xor,
                _ => break,
            };
            let at = self.cursor.consume().position();
            let right = self.parse_rel();
            left = self.node(kind, None, at, vec![left, right]);
        }

        self.depth -= 1;
        left
    }

    fn relop(kind: TokenKind) -> Option<NodeKind> {
        match kind {
            TokenKind::EqEq => Some(NodeKind::Eq),
            TokenKind::Ne => Some(NodeKind::Ne),
            TokenKind::Gt => Some(NodeKind::Gt),
            TokenKind::Ge => Some(NodeKind::Ge),
            TokenKind::Lt => Some(NodeKind::Lt),
            TokenKind::Le => Some(NodeKind::Le),
            _ => None,
        }
    }

    /// `not expr relop expr | expr [relop expr]`
    fn parse_rel(&mut self) -> NodeId {
        if self.check(TokenKind::Not) {
            let at = self.cursor.consume().position();
            let left = self.parse_expr();
            let Some(kind) = Self::relop(self.cursor.peek_kind()) else {
                self.error("expected relational operator after 'not' operand");
                return self.ast.undefined(at);
            };
            let op_at = self.cursor.consume().position();
            let right = self.parse_expr();
            let rel = self.node(kind, None, op_at, vec![left, right]);
            return self.node(NodeKind::Not, None, at, vec![rel]);
        }

        let left = self.parse_expr();
        match Self::relop(self.cursor.peek_kind()) {
            Some(kind) => {
                let at = self.cursor.consume().position();
                let right = self.parse_expr();
                self.node(kind, None, at, vec![left, right])
            }
            None => left,
        }
    }

    /// `term {(+ | -) term}`
    fn parse_expr(&mut self) -> NodeId {
        let mut left = self.parse_term();
        loop {
            let kind = match self.cursor.peek_kind() {
                TokenKind::Plus => NodeKind::Add,
                TokenKind::Minus => NodeKind::Sub,
                _ => break,
            };
            let at = self.cursor.consume().position();
            let right = self.parse_term();
            left = self.node(kind, None, at, vec![left, right]);
        }
        left
    }

    /// `fact {(* | / | %) fact}`
    fn parse_term(&mut self) -> NodeId {
        let mut left = self.parse_fact();
        loop {
            let kind = match self.cursor.peek_kind() {
                TokenKind::Star => NodeKind::Mul,
                TokenKind::Slash => NodeKind::Div,
                TokenKind::Percent => NodeKind::Mod,
                _ => break,
            };
            let at = self.cursor.consume().position();
            let right = self.parse_fact();
            left = self.node(kind, None, at, vec![left, right]);
        }
        left
    }

    /// `primary [^ fact]`, right-associative
    fn parse_fact(&mut self) -> NodeId {
        let base = self.parse_primary();
        if !self.check(TokenKind::Caret) {
            return base;
        }
        let at = self.cursor.consume().position();
        if self.too_deep() {
            return self.recover(STAT_FOLLOW);
        }
        self.depth += 1;
        let exponent = self.parse_fact();
        self.depth -= 1;
        self.node(NodeKind::Pow, None, at, vec![base, exponent])
    }

    fn parse_primary(&mut self) -> NodeId {
        let token = self.cursor.peek().clone();
        match token.kind {
            TokenKind::IntLit => {
                self.cursor.consume();
                self.ast.leaf(NodeKind::IntLit, &token)
            }
            TokenKind::RealLit => {
                self.cursor.consume();
                self.ast.leaf(NodeKind::RealLit, &token)
            }
            TokenKind::True => {
                self.cursor.consume();
                self.ast.leaf(NodeKind::True, &token)
            }
            TokenKind::False => {
                self.cursor.consume();
                self.ast.leaf(NodeKind::False, &token)
            }
            TokenKind::Ident => {
                if self.cursor.lookahead(1).kind == TokenKind::LParen {
                    self.parse_call(NodeKind::FnCall)
                } else {
                    self.parse_var()
                }
            }
            TokenKind::LParen => {
                self.cursor.consume();
                let inner = self.parse_bool();
                self.require(TokenKind::RParen, "to close parenthesized expression");
                inner
            }
            _ => {
                self.error("expected expression");
                self.ast.undefined(token.position())
            }
        }
    }
}

/// Scan and parse `source` in one go
pub fn parse_source(source: &str) -> (Ast, Diagnostics) {
    let mut parser = Parser::new(Lexer::new(source));
    parser.parse_program();
    parser.into_parts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Category;

    fn parse(source: &str) -> (Ast, Diagnostics) {
        parse_source(source)
    }

    fn syntax_errors(diags: &Diagnostics) -> usize {
        diags.count(Category::Syntax)
    }

    /// Kinds of the main body's statements
    fn main_stat_kinds(ast: &Ast) -> Vec<NodeKind> {
        let main = ast.child(ast.root().unwrap(), 3).unwrap();
        let stats = ast.child(main, 1).unwrap();
        ast.children(stats).iter().map(|&s| ast.kind(s)).collect()
    }

    #[test]
    fn test_minimal_program() {
        let (ast, diags) = parse("cd25 p main begin end cd25 p");
        assert!(diags.is_empty(), "{:?}", diags);
        let root = ast.root().unwrap();
        assert_eq!(ast.kind(root), NodeKind::Program);
        assert_eq!(ast.children(root).len(), 4);
        assert_eq!(ast.node(ast.child(root, 0).unwrap()).text(), "p");
    }

    #[test]
    fn test_globals_sections() {
        let source = "cd25 p
            constants PI is 3, E is 2.71
            types pt is x : real, y : real end
                  pts is array [10] of pt end
            arrays a : pts, b : pts
            main begin end cd25 p";
        let (ast, diags) = parse(source);
        assert!(diags.is_empty(), "{:?}", diags);
        let globals = ast.child(ast.root().unwrap(), 1).unwrap();
        let consts = ast.child(globals, 0).unwrap();
        let types = ast.child(globals, 1).unwrap();
        let arrays = ast.child(globals, 2).unwrap();
        assert_eq!(ast.children(consts).len(), 2);
        let kinds: Vec<_> = ast.children(types).iter().map(|&t| ast.kind(t)).collect();
        assert_eq!(kinds, vec![NodeKind::StructDef, NodeKind::ArrayTypeDef]);
        assert_eq!(ast.children(arrays).len(), 2);
    }

    #[test]
    fn test_function_definition() {
        let source = "cd25 p
            func add(a : integer, const v : vec) : integer
              t : integer
            begin
              t = a + 1;
              return t;
            end
            main begin end cd25 p";
        let (ast, diags) = parse(source);
        assert!(diags.is_empty(), "{:?}", diags);
        let funcs = ast.child(ast.root().unwrap(), 2).unwrap();
        let func = ast.child(funcs, 0).unwrap();
        assert_eq!(ast.kind(func), NodeKind::FuncDef);
        let params = ast.child(func, 0).unwrap();
        let param_kinds: Vec<_> = ast.children(params).iter().map(|&p| ast.kind(p)).collect();
        assert_eq!(param_kinds, vec![NodeKind::Param, NodeKind::ConstParam]);
        assert_eq!(ast.node(ast.child(func, 1).unwrap()).text(), "integer");
    }

    #[test]
    fn test_statements() {
        let source = "cd25 p main begin
              x = 1; x += 2;
              f(x, 3);
              in >> x, y;
              out << \"v\" << x << line;
              for (i = 0; i < 3) x = x + i; end
              repeat (j = 0) j += 1 until j >= 3;
              if (x == 1) x = 2; else x = 3; end
              return;
            end cd25 p";
        let (ast, diags) = parse(source);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(
            main_stat_kinds(&ast),
            vec![
                NodeKind::Assign,
                NodeKind::AddAssign,
                NodeKind::Call,
                NodeKind::Input,
                NodeKind::Output,
                NodeKind::For,
                NodeKind::Repeat,
                NodeKind::IfElse,
                NodeKind::Return,
            ]
        );
    }

    #[test]
    fn test_semicolon_optional_before_closers() {
        let source = "cd25 p main begin if (true) out << \"hi\" << line else out << \"bye\" << line end end cd25 p";
        let (ast, diags) = parse(source);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(main_stat_kinds(&ast), vec![NodeKind::IfElse]);
    }

    #[test]
    fn test_precedence_and_associativity() {
        let (ast, diags) = parse("cd25 p main begin x = 1 + 2 * 3 ^ 2 ^ 2 - 4; end cd25 p");
        assert!(diags.is_empty(), "{:?}", diags);
        let main = ast.child(ast.root().unwrap(), 3).unwrap();
        let stats = ast.child(main, 1).unwrap();
        let asgn = ast.child(stats, 0).unwrap();
        let rhs = ast.child(asgn, 1).unwrap();
        // ((1 + (2 * (3 ^ (2 ^ 2)))) - 4)
        assert_eq!(ast.kind(rhs), NodeKind::Sub);
        let add = ast.child(rhs, 0).unwrap();
        assert_eq!(ast.kind(add), NodeKind::Add);
        let mul = ast.child(add, 1).unwrap();
        assert_eq!(ast.kind(mul), NodeKind::Mul);
        let pow = ast.child(mul, 1).unwrap();
        assert_eq!(ast.kind(pow), NodeKind::Pow);
        assert_eq!(ast.kind(ast.child(pow, 1).unwrap()), NodeKind::Pow);
    }

    #[test]
    fn test_not_wraps_relation() {
        let (ast, diags) = parse("cd25 p main begin b = not a < 3 and c; end cd25 p");
        assert!(diags.is_empty(), "{:?}", diags);
        let main = ast.child(ast.root().unwrap(), 3).unwrap();
        let stats = ast.child(main, 1).unwrap();
        let rhs = ast.child(ast.child(stats, 0).unwrap(), 1).unwrap();
        assert_eq!(ast.kind(rhs), NodeKind::And);
        let not = ast.child(rhs, 0).unwrap();
        assert_eq!(ast.kind(not), NodeKind::Not);
        assert_eq!(ast.kind(ast.child(not, 0).unwrap()), NodeKind::Lt);
    }

    #[test]
    fn test_array_access_forms() {
        let (ast, diags) = parse("cd25 p main begin a[i] = a[i + 1].f; end cd25 p");
        assert!(diags.is_empty(), "{:?}", diags);
        let main = ast.child(ast.root().unwrap(), 3).unwrap();
        let stats = ast.child(main, 1).unwrap();
        let asgn = ast.child(stats, 0).unwrap();
        let lhs = ast.child(asgn, 0).unwrap();
        let rhs = ast.child(asgn, 1).unwrap();
        assert_eq!(ast.kind(lhs), NodeKind::ArrayElement);
        assert_eq!(ast.kind(rhs), NodeKind::ArrayField);
        assert_eq!(ast.node(rhs).text(), "f");
        assert_eq!(ast.children(rhs).len(), 3);
    }

    #[test]
    fn test_call_versus_variable() {
        let (ast, diags) = parse("cd25 p main begin x = f(1) + f; end cd25 p");
        assert!(diags.is_empty(), "{:?}", diags);
        let main = ast.child(ast.root().unwrap(), 3).unwrap();
        let stats = ast.child(main, 1).unwrap();
        let add = ast.child(ast.child(stats, 0).unwrap(), 1).unwrap();
        assert_eq!(ast.kind(ast.child(add, 0).unwrap()), NodeKind::FnCall);
        assert_eq!(ast.kind(ast.child(add, 1).unwrap()), NodeKind::SimpleVar);
    }

    #[test]
    fn test_missing_semicolon_is_one_error() {
        let (ast, diags) = parse("cd25 p main begin x = 5 y = 6; z = 1; end cd25 p");
        assert_eq!(syntax_errors(&diags), 1, "{:?}", diags);
        assert_eq!(main_stat_kinds(&ast), vec![NodeKind::Assign, NodeKind::Assign]);
    }

    #[test]
    fn test_missing_operand_is_one_error() {
        let (ast, diags) = parse("cd25 p main begin x = ; y = 2; end cd25 p");
        assert_eq!(syntax_errors(&diags), 1, "{:?}", diags);
        let main = ast.child(ast.root().unwrap(), 3).unwrap();
        let stats = ast.child(main, 1).unwrap();
        let first = ast.child(stats, 0).unwrap();
        assert_eq!(ast.kind(ast.child(first, 1).unwrap()), NodeKind::Undefined);
    }

    #[test]
    fn test_missing_assignment_operator() {
        let (ast, diags) = parse("cd25 p main begin x 5; y = 1; end cd25 p");
        assert_eq!(syntax_errors(&diags), 1, "{:?}", diags);
        assert_eq!(main_stat_kinds(&ast), vec![NodeKind::Undefined, NodeKind::Assign]);
    }

    #[test]
    fn test_garbage_statement_recovers() {
        let (ast, diags) = parse("cd25 p main begin ) ) ; x = 1; end cd25 p");
        assert_eq!(syntax_errors(&diags), 1, "{:?}", diags);
        assert_eq!(main_stat_kinds(&ast), vec![NodeKind::Undefined, NodeKind::Assign]);
    }

    #[test]
    fn test_lexical_errors_not_repeated_as_syntax() {
        let (_, diags) = parse("cd25 p main begin x = @; end cd25 p");
        assert_eq!(diags.count(Category::Lexical), 1);
        assert_eq!(syntax_errors(&diags), 0, "{:?}", diags);
    }

    #[test]
    fn test_trailing_input_is_reported() {
        let (_, diags) = parse("cd25 p main begin end cd25 p extra");
        assert_eq!(syntax_errors(&diags), 1);
    }

    #[test]
    fn test_tree_is_complete_for_truncated_input() {
        let (ast, diags) = parse("cd25 p main begin x = ");
        assert!(syntax_errors(&diags) >= 1);
        assert_eq!(ast.children(ast.root().unwrap()).len(), 4);
    }

    #[test]
    fn test_nesting_limit() {
        let source = format!("cd25 p main begin x = {}1{}; end cd25 p", "(".repeat(40), ")".repeat(40));
        let mut parser = Parser::new(Lexer::new(&source)).with_max_depth(10);
        parser.parse_program();
        let (_, diags) = parser.into_parts();
        assert!(diags.iter().any(|d| d.message.contains("nesting too deep")));

        let source = format!("cd25 p main begin x = {}1{}; end cd25 p", "a[".repeat(40), "]".repeat(40));
        let mut parser = Parser::new(Lexer::new(&source)).with_max_depth(10);
        parser.parse_program();
        let (_, diags) = parser.into_parts();
        assert_eq!(diags.iter().filter(|d| d.message.contains("nesting too deep")).count(), 1);
    }

    #[test]
    fn test_nested_indices_hit_default_limit() {
        let source = format!("cd25 p main begin x = {}1{}; end cd25 p", "a[".repeat(300), "]".repeat(300));
        let mut parser = Parser::new(Lexer::new(&source));
        parser.parse_program();
        let (_, diags) = parser.into_parts();
        assert!(diags.iter().any(|d| d.message.contains("nesting too deep")));
    }

    #[test]
    fn test_error_free_parse_consumes_everything() {
        let source = "cd25 p constants N is 2 main x : integer begin x = N; end cd25 p";
        let mut parser = Parser::new(Lexer::new(source));
        parser.parse_program();
        assert!(parser.cursor.is_at_end());
        assert!(parser.diagnostics.is_empty());
    }
}
