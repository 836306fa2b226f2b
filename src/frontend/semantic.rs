//! Semantic Analysis for CD25
//!
//! Performs:
//! - Program name check (header against footer)
//! - Declaration of constants, types, arrays, functions and locals
//! - Static layout (global frame, call frames, constant pool)
//! - Type checking of every statement and expression
//!
//! Results are kept in side tables ([`Decorations`]) keyed by node id; the
//! syntax tree itself is never modified.

use std::collections::HashMap;

use crate::frontend::ast::{Ast, NodeId, NodeKind};
use crate::frontend::consteval::{self, ConstError, ConstResult};
use crate::types::*;
use crate::utils::{Diagnostics, Position};

/// Smallest and largest integers pushed as an immediate operand
const IMMEDIATE_RANGE: std::ops::RangeInclusive<i64> = -32768..=32767;

// ==================== Decorations ====================

/// Per-node analysis results; each slot is written once
#[derive(Debug, Default)]
pub struct Decorations {
    types: HashMap<NodeId, Type>,
    symbols: HashMap<NodeId, SymbolId>,
}

impl Decorations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the type of a node. The first recorded type wins and is returned.
    pub fn set_type(&mut self, node: NodeId, ty: Type) -> Type {
        self.types.entry(node).or_insert(ty).clone()
    }

    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    /// Bind a node to a symbol. The first binding wins.
    pub fn bind(&mut self, node: NodeId, symbol: SymbolId) -> SymbolId {
        *self.symbols.entry(node).or_insert(symbol)
    }

    pub fn symbol_of(&self, node: NodeId) -> Option<SymbolId> {
        self.symbols.get(&node).copied()
    }
}

/// Everything later passes need from the analyzer
#[derive(Debug)]
pub struct Analysis {
    pub symbols: SymbolArena,
    pub decorations: Decorations,
    /// Words used by globals and main's declarations
    pub global_words: u32,
    /// Local words of each function, keyed by its `FuncDef` node
    pub frame_words: HashMap<NodeId, u32>,
    pub pool: ConstantPool,
}

impl Analysis {
    pub fn type_of(&self, node: NodeId) -> Type {
        self.decorations.type_of(node).cloned().unwrap_or(Type::Error)
    }

    pub fn symbol_of(&self, node: NodeId) -> Option<&Symbol> {
        self.decorations.symbol_of(node).map(|id| self.symbols.get(id))
    }
}

// ==================== Semantic Analyzer ====================

/// Semantic analyzer
pub struct SemanticAnalyzer<'a> {
    ast: &'a Ast,
    scopes: ScopeStack,
    symbols: SymbolArena,
    decorations: Decorations,
    diagnostics: Diagnostics,
    globals: GlobalLayout,
    /// Call frame of the function being checked; `None` in main and globals
    frame: Option<FrameLayout>,
    frame_words: HashMap<NodeId, u32>,
    pool: ConstantPool,
    /// Declared return type of the current function; `None` in main
    current_return: Option<Type>,
    seen_return: bool,
}

impl ScopeHost for SemanticAnalyzer<'_> {
    fn scopes_mut(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            scopes: ScopeStack::new(),
            symbols: SymbolArena::new(),
            decorations: Decorations::new(),
            diagnostics: Diagnostics::new(),
            globals: GlobalLayout::new(),
            frame: None,
            frame_words: HashMap::new(),
            pool: ConstantPool::new(),
            current_return: None,
            seen_return: false,
        }
    }

    /// Analyze the whole program
    pub fn analyze(mut self) -> (Analysis, Diagnostics) {
        self.check_program();
        log::debug!(
            "semantic analysis: {} symbols, {} global words, {} diagnostic(s)",
            self.symbols.len(),
            self.globals.words(),
            self.diagnostics.len()
        );
        let analysis = Analysis {
            symbols: self.symbols,
            decorations: self.decorations,
            global_words: self.globals.words(),
            frame_words: self.frame_words,
            pool: self.pool,
        };
        (analysis, self.diagnostics)
    }

    fn error(&mut self, message: impl Into<String>, at: Position) {
        self.diagnostics.semantic(message, at);
    }

    fn position(&self, node: NodeId) -> Position {
        self.ast.node(node).position()
    }

    fn children(&self, node: NodeId) -> &'a [NodeId] {
        self.ast.children(node)
    }

    fn text(&self, node: NodeId) -> &'a str {
        self.ast.node(node).text()
    }

    /// Define `symbol` in the innermost scope, reporting a duplicate
    fn define(&mut self, node: NodeId, symbol: Symbol) -> Option<SymbolId> {
        if self.scopes.resolve_local(&symbol.name).is_some() {
            self.error(format!("duplicate identifier '{}'", symbol.name), symbol.position());
            return None;
        }
        let name = symbol.name.clone();
        let id = self.symbols.alloc(symbol);
        self.scopes.define(&name, id);
        self.decorations.bind(node, id);
        Some(id)
    }

    /// Would `name` collide with something already in the innermost scope?
    fn check_unique(&mut self, node: NodeId) -> bool {
        let name = self.text(node);
        if self.scopes.resolve_local(name).is_some() {
            self.error(format!("duplicate identifier '{}'", name), self.position(node));
            return false;
        }
        true
    }

    // ==================== Program ====================

    fn check_program(&mut self) {
        let ast = self.ast;
        let Some(root) = ast.root() else {
            return;
        };
        let &[name, globals, functions, main] = ast.children(root) else {
            return;
        };

        self.check_program_name(name, main);
        self.declare_globals(globals);

        let funcs: Vec<NodeId> = self
            .children(functions)
            .iter()
            .copied()
            .filter(|&f| ast.kind(f) == NodeKind::FuncDef)
            .collect();
        // Every signature first, so calls may precede the callee's body
        for &func in &funcs {
            self.declare_function(func);
        }
        for &func in &funcs {
            self.check_function(func);
        }
        self.check_main(main);
    }

    fn check_program_name(&mut self, header: NodeId, main: NodeId) {
        let Some(footer) = self.ast.child(main, 2) else {
            return;
        };
        if self.ast.kind(header) != NodeKind::SimpleVar || self.ast.kind(footer) != NodeKind::SimpleVar {
            return;
        }
        let expected = self.text(header);
        let found = self.text(footer);
        if expected != found {
            self.error(
                format!("program name '{}' at end does not match '{}'", found, expected),
                self.position(footer),
            );
        }
    }

    // ==================== Declarations ====================

    fn declare_globals(&mut self, globals: NodeId) {
        let &[constants, types, arrays] = self.children(globals) else {
            return;
        };
        for &init in self.children(constants) {
            self.declare_constant(init);
        }
        for &def in self.children(types) {
            match self.ast.kind(def) {
                NodeKind::StructDef => self.declare_struct(def),
                NodeKind::ArrayTypeDef => self.declare_array_type(def),
                _ => {}
            }
        }
        for &decl in self.children(arrays) {
            if self.ast.kind(decl) != NodeKind::Decl {
                continue;
            }
            let ty = self.declared_type(decl);
            if !ty.is_error() && ty.element().is_none() {
                self.error(
                    format!("'{}' in arrays section must have an array type, found {}", self.text(decl), ty),
                    self.position(decl),
                );
            }
            self.declare_variable(decl);
        }
    }

    /// Value of a named constant for the constant evaluator
    fn constant_value(scopes: &ScopeStack, symbols: &SymbolArena, name: &str) -> ConstResult {
        let Some(id) = scopes.resolve(name) else {
            // Undeclared names were reported while typing
            return Err(ConstError::Poisoned);
        };
        match symbols.get(id).kind {
            SymbolKind::Const { value: Some(value) } => Ok(value),
            SymbolKind::Const { value: None } => Err(ConstError::Poisoned),
            _ => Err(ConstError::NotConstant),
        }
    }

    /// Fold a constant expression, reporting failures at `node`
    fn fold(&mut self, node: NodeId) -> Option<ConstValue> {
        let (scopes, symbols) = (&self.scopes, &self.symbols);
        let result = consteval::evaluate(self.ast, node, &|name| Self::constant_value(scopes, symbols, name));
        match result {
            Ok(value) => Some(value),
            Err(ConstError::Poisoned) => None,
            Err(err) => {
                self.error(err.to_string(), self.position(node));
                None
            }
        }
    }

    fn declare_constant(&mut self, init: NodeId) {
        if self.ast.kind(init) != NodeKind::Init {
            return;
        }
        let Some(expr) = self.ast.child(init, 0) else {
            return;
        };
        let ty = self.check_expr(expr);
        let value = if ty.is_error() { None } else { self.fold(expr) };
        log::trace!("constant {} = {:?}", self.text(init), value);

        let symbol = Symbol::new(self.text(init), ty, self.position(init), SymbolKind::Const { value });
        self.define(init, symbol);
    }

    fn declare_struct(&mut self, def: NodeId) {
        let name = self.text(def).to_string();
        let mut fields: Vec<(String, Type)> = Vec::new();
        for &field in self.children(def) {
            if self.ast.kind(field) != NodeKind::Decl {
                continue;
            }
            let field_name = self.text(field).to_string();
            let ty = self.declared_type(field);
            if !ty.is_error() && !ty.is_scalar() {
                self.error(
                    format!("field '{}' of struct '{}' must have a scalar type, found {}", field_name, name, ty),
                    self.position(field),
                );
            }
            if fields.iter().any(|(n, _)| *n == field_name) {
                self.error(
                    format!("duplicate field '{}' in struct '{}'", field_name, name),
                    self.position(field),
                );
                continue;
            }
            fields.push((field_name, ty));
        }

        let ty = Type::Struct { name: name.clone(), fields };
        self.define(def, Symbol::new(name, ty, self.position(def), SymbolKind::TypeAlias));
    }

    fn declare_array_type(&mut self, def: NodeId) {
        let &[size_expr, elem_name] = self.children(def) else {
            return;
        };
        let name = self.text(def).to_string();

        let size_ty = self.check_expr(size_expr);
        let size = match size_ty {
            Type::Error => None,
            Type::Int => match self.fold(size_expr) {
                Some(ConstValue::Int(n)) if n > 0 && n <= u32::MAX as i64 => Some(n as u32),
                Some(_) => {
                    self.error(format!("size of array type '{}' must be positive", name), self.position(size_expr));
                    None
                }
                None => None,
            },
            other => {
                self.error(
                    format!("size of array type '{}' must be an integer constant, found {}", name, other),
                    self.position(size_expr),
                );
                None
            }
        };

        let elem = self.resolve_type_name(elem_name);
        let elem_ok = match &elem {
            Type::Error => false,
            Type::Struct { .. } => true,
            t if t.is_scalar() => true,
            other => {
                self.error(
                    format!("elements of array type '{}' must be scalars or structs, found {}", name, other),
                    self.position(elem_name),
                );
                false
            }
        };

        let ty = match size {
            Some(size) if elem_ok => Type::array(elem, size),
            _ => Type::Error,
        };
        self.define(def, Symbol::new(name, ty, self.position(def), SymbolKind::TypeAlias));
    }

    /// Type named by a declaration's `TypeName` child
    fn declared_type(&mut self, decl: NodeId) -> Type {
        match self.ast.child(decl, 0) {
            Some(type_name) => self.resolve_type_name(type_name),
            None => Type::Error,
        }
    }

    fn resolve_type_name(&mut self, type_name: NodeId) -> Type {
        if let Some(ty) = self.decorations.type_of(type_name) {
            return ty.clone();
        }
        let ty = match self.ast.kind(type_name) {
            NodeKind::TypeName => match self.text(type_name) {
                "integer" => Type::Int,
                "real" => Type::Real,
                "boolean" => Type::Bool,
                "void" => Type::Void,
                name => match self.scopes.resolve(name) {
                    Some(id) if self.symbols.get(id).kind == SymbolKind::TypeAlias => {
                        self.decorations.bind(type_name, id);
                        self.symbols.get(id).ty.clone()
                    }
                    Some(id) => {
                        let what = self.symbols.get(id).describe();
                        self.error(format!("'{}' is a {}, not a type", name, what), self.position(type_name));
                        Type::Error
                    }
                    None => {
                        self.error(format!("undeclared type '{}'", name), self.position(type_name));
                        Type::Error
                    }
                },
            },
            _ => Type::Error,
        };
        self.decorations.set_type(type_name, ty)
    }

    /// Allocate one word in the current region
    fn allocate(&mut self) -> (Region, i32) {
        match self.frame.as_mut() {
            Some(frame) => (Region::Frame, frame.alloc_local(1)),
            None => (Region::Global, self.globals.alloc(1)),
        }
    }

    /// Declare a variable: a scalar, or an array through its descriptor word
    fn declare_variable(&mut self, decl: NodeId) {
        if self.ast.kind(decl) != NodeKind::Decl {
            return;
        }
        let ty = match self.declared_type(decl) {
            Type::Struct { name, .. } => {
                self.error(
                    format!("variable '{}' cannot have struct type '{}'", self.text(decl), name),
                    self.position(decl),
                );
                Type::Error
            }
            ty => ty,
        };
        if !self.check_unique(decl) {
            return;
        }
        let (region, offset) = self.allocate();
        let kind = SymbolKind::Var { region, offset, size_words: 1 };
        let symbol = Symbol::new(self.text(decl), ty, self.position(decl), kind);
        self.define(decl, symbol);
    }

    fn declare_param(&mut self, param: NodeId) {
        let is_const = match self.ast.kind(param) {
            NodeKind::Param => false,
            NodeKind::ConstParam => true,
            _ => return,
        };
        let ty = self.declared_type(param);
        if !self.check_unique(param) {
            return;
        }
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let offset = frame.alloc_param(1);
        let kind = SymbolKind::Param { region: Region::Frame, offset, size_words: 1, is_const };
        let symbol = Symbol::new(self.text(param), ty, self.position(param), kind);
        self.define(param, symbol);
    }

    // ==================== Functions ====================

    fn declare_function(&mut self, func: NodeId) {
        let &[params, ret, _, _] = self.children(func) else {
            return;
        };
        let ast = self.ast;
        let return_type = self.resolve_type_name(ret);
        let param_types: Vec<Type> = ast
            .children(params)
            .iter()
            .filter(|&&p| matches!(ast.kind(p), NodeKind::Param | NodeKind::ConstParam))
            .map(|&p| self.declared_type(p))
            .collect();

        let kind = SymbolKind::Func { return_type: return_type.clone(), param_types };
        let symbol = Symbol::new(self.text(func), return_type, self.position(func), kind);
        self.define(func, symbol);
    }

    fn check_function(&mut self, func: NodeId) {
        let &[params, ret, locals, body] = self.children(func) else {
            return;
        };
        let return_type = self.resolve_type_name(ret);

        let mut this = ScopeGuard::enter(self);
        this.frame = Some(FrameLayout::new());
        this.current_return = Some(return_type.clone());
        this.seen_return = false;

        for &param in this.children(params) {
            this.declare_param(param);
        }
        for &decl in this.children(locals) {
            this.declare_variable(decl);
        }
        this.check_stats(body);

        if return_type != Type::Void && !return_type.is_error() && !this.seen_return {
            let at = this.position(func);
            let message = format!("missing return statement in function '{}'", this.text(func));
            this.error(message, at);
        }

        let words = this.frame.take().map_or(0, |f| f.local_words());
        this.frame_words.insert(func, words);
        this.current_return = None;
    }

    fn check_main(&mut self, main: NodeId) {
        let &[decls, stats, _] = self.children(main) else {
            return;
        };
        let mut this = ScopeGuard::enter(self);
        this.frame = None;
        this.current_return = None;
        for &decl in this.children(decls) {
            this.declare_variable(decl);
        }
        this.check_stats(stats);
    }

    // ==================== Statements ====================

    fn check_stats(&mut self, stats: NodeId) {
        for &stat in self.children(stats) {
            self.check_stat(stat);
        }
    }

    fn check_stat(&mut self, stat: NodeId) {
        let kind = self.ast.kind(stat);
        let children = self.children(stat);
        match kind {
            NodeKind::Stats | NodeKind::AssignList => self.check_stats(stat),
            NodeKind::For => {
                if let &[inits, cond, body] = children {
                    self.check_stats(inits);
                    self.check_condition(cond, "for");
                    self.check_stats(body);
                }
            }
            NodeKind::Repeat => {
                if let &[inits, body, cond] = children {
                    self.check_stats(inits);
                    self.check_stats(body);
                    self.check_condition(cond, "repeat");
                }
            }
            NodeKind::If | NodeKind::IfElse => {
                if let Some((&cond, branches)) = children.split_first() {
                    self.check_condition(cond, "if");
                    for &branch in branches {
                        self.check_stats(branch);
                    }
                }
            }
            k if k.is_assignment() => self.check_assignment(stat),
            NodeKind::Input => {
                for &target in children {
                    let ty = self.check_lvalue(target);
                    if !ty.is_numeric() && !ty.is_error() {
                        self.error(format!("cannot read a value of type {}", ty), self.position(target));
                    }
                }
            }
            NodeKind::Output => {
                for &item in children {
                    self.check_print_item(item);
                }
            }
            NodeKind::Call => {
                self.check_call(stat, true);
            }
            NodeKind::Return => self.check_return(stat),
            _ => {}
        }
    }

    fn check_condition(&mut self, cond: NodeId, construct: &str) {
        let ty = self.check_expr(cond);
        if ty != Type::Bool && !ty.is_error() {
            self.error(
                format!("condition of '{}' must be boolean, found {}", construct, ty),
                self.position(cond),
            );
        }
    }

    fn check_print_item(&mut self, item: NodeId) {
        match self.ast.kind(item) {
            NodeKind::Line => {}
            NodeKind::StrLit => {
                let text = self.text(item);
                self.pool.intern_str(text);
            }
            _ => {
                let ty = self.check_expr(item);
                if !ty.is_scalar() && !ty.is_error() {
                    self.error(format!("cannot print a value of type {}", ty), self.position(item));
                }
            }
        }
    }

    fn check_assignment(&mut self, stat: NodeId) {
        let &[target, value] = self.children(stat) else {
            return;
        };
        let kind = self.ast.kind(stat);
        let target_ty = self.check_lvalue(target);
        let value_ty = self.check_expr(value);
        let value_ty = match kind.compound_operator() {
            Some(op) => self.binary_result(op, &target_ty, &value_ty, self.position(stat)),
            None => value_ty,
        };
        if target_ty.is_error() || value_ty.is_error() {
            return;
        }
        if !target_ty.is_scalar() {
            self.error(format!("cannot assign to a whole value of type {}", target_ty), self.position(target));
        } else if !assignable(&target_ty, &value_ty) {
            self.error(
                format!("cannot assign {} to a target of type {}", value_ty, target_ty),
                self.position(value),
            );
        }
    }

    /// Type an assignment or input target and check that it is writable
    fn check_lvalue(&mut self, target: NodeId) -> Type {
        let ty = self.check_expr(target);
        let base = match self.ast.kind(target) {
            NodeKind::SimpleVar => target,
            NodeKind::ArrayElement | NodeKind::ArrayField => match self.ast.child(target, 0) {
                Some(base) => base,
                None => return Type::Error,
            },
            NodeKind::Undefined => return Type::Error,
            _ => {
                self.error("invalid assignment target", self.position(target));
                return Type::Error;
            }
        };
        let Some(id) = self.decorations.symbol_of(base) else {
            return Type::Error;
        };
        let symbol = self.symbols.get(id);
        if !symbol.is_writable() {
            let message = format!("cannot assign to {} '{}'", symbol.describe(), symbol.name);
            self.error(message, self.position(target));
            return Type::Error;
        }
        ty
    }

    fn check_return(&mut self, stat: NodeId) {
        self.seen_return = true;
        let value = self.ast.child(stat, 0);
        let at = self.position(stat);
        match (self.current_return.clone(), value) {
            (None, Some(value)) => {
                self.check_expr(value);
                self.error("main cannot return a value", at);
            }
            (None, None) => {}
            (Some(Type::Void), Some(value)) => {
                self.check_expr(value);
                self.error("void function cannot return a value", at);
            }
            (Some(ret), None) => {
                if ret != Type::Void && !ret.is_error() {
                    self.error(format!("function must return a value of type {}", ret), at);
                }
            }
            (Some(ret), Some(value)) => {
                let ty = self.check_expr(value);
                if !assignable(&ret, &ty) {
                    self.error(
                        format!("cannot return {} from a function returning {}", ty, ret),
                        self.position(value),
                    );
                }
            }
        }
    }

    // ==================== Expressions ====================

    /// Type of an expression, computed once per node
    fn check_expr(&mut self, expr: NodeId) -> Type {
        if let Some(ty) = self.decorations.type_of(expr) {
            return ty.clone();
        }
        let ty = self.compute_type(expr);
        self.decorations.set_type(expr, ty)
    }

    fn compute_type(&mut self, expr: NodeId) -> Type {
        let ast = self.ast;
        let node = ast.node(expr);
        let at = node.position();
        match node.kind {
            NodeKind::IntLit => match node.text().parse::<i64>() {
                Ok(value) => {
                    if !IMMEDIATE_RANGE.contains(&value) {
                        self.pool.intern_int(value);
                    }
                    Type::Int
                }
                Err(_) => {
                    self.error(format!("integer literal {} is out of range", node.text()), at);
                    Type::Error
                }
            },
            NodeKind::RealLit => match node.text().parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    if value != 0.0 {
                        self.pool.intern_real(value);
                    }
                    Type::Real
                }
                _ => {
                    self.error(format!("real literal {} is out of range", node.text()), at);
                    Type::Error
                }
            },
            NodeKind::True | NodeKind::False => Type::Bool,
            NodeKind::StrLit => {
                self.error("a string can only appear in an output list", at);
                Type::Error
            }
            NodeKind::SimpleVar => self.check_name(expr),
            NodeKind::ArrayElement => self.check_element(expr).unwrap_or(Type::Error),
            NodeKind::ArrayField => self.check_field(expr),
            NodeKind::Not => {
                let Some(inner) = self.ast.child(expr, 0) else {
                    return Type::Error;
                };
                match self.check_expr(inner) {
                    Type::Bool => Type::Bool,
                    Type::Error => Type::Error,
                    other => {
                        self.error(format!("operand of 'not' must be boolean, found {}", other), at);
                        Type::Error
                    }
                }
            }
            NodeKind::FnCall => self.check_call(expr, false),
            kind if kind.is_arithmetic() || kind.is_ordering() || kind.is_equality() || kind.is_logical() => {
                let &[lhs, rhs] = self.children(expr) else {
                    return Type::Error;
                };
                let lt = self.check_expr(lhs);
                let rt = self.check_expr(rhs);
                self.binary_result(kind, &lt, &rt, at)
            }
            _ => Type::Error,
        }
    }

    /// Type of a binary operator application
    fn binary_result(&mut self, kind: NodeKind, lhs: &Type, rhs: &Type, at: Position) -> Type {
        if lhs.is_error() || rhs.is_error() {
            return Type::Error;
        }
        let op = kind.symbol();
        let result = match kind {
            NodeKind::Mod if *lhs == Type::Int && *rhs == Type::Int => Some(Type::Int),
            NodeKind::Mod => None,
            NodeKind::Pow if lhs.is_numeric() && *rhs == Type::Int => Some(lhs.clone()),
            NodeKind::Pow => {
                self.error(
                    format!("'^' needs a numeric base and an integer exponent, found {} and {}", lhs, rhs),
                    at,
                );
                return Type::Error;
            }
            k if k.is_arithmetic() && lhs.is_numeric() && rhs.is_numeric() => Some(Type::numeric_result(lhs, rhs)),
            k if k.is_ordering() && lhs.is_numeric() && rhs.is_numeric() => Some(Type::Bool),
            k if k.is_equality()
                && ((lhs.is_numeric() && rhs.is_numeric()) || (*lhs == Type::Bool && *rhs == Type::Bool)) =>
            {
                Some(Type::Bool)
            }
            k if k.is_logical() && *lhs == Type::Bool && *rhs == Type::Bool => Some(Type::Bool),
            _ => None,
        };
        result.unwrap_or_else(|| {
            let expected = match kind {
                NodeKind::Mod => "integer",
                k if k.is_logical() => "boolean",
                k if k.is_equality() => "comparable",
                _ => "numeric",
            };
            self.error(
                format!("operands of '{}' must be {}, found {} and {}", op, expected, lhs, rhs),
                at,
            );
            Type::Error
        })
    }

    /// Resolve an identifier used as a value
    fn check_name(&mut self, var: NodeId) -> Type {
        let name = self.text(var);
        let Some(id) = self.scopes.resolve(name) else {
            self.error(format!("'{}' used before declaration", name), self.position(var));
            return Type::Error;
        };
        self.decorations.bind(var, id);
        let symbol = self.symbols.get(id);
        match symbol.kind {
            SymbolKind::Var { .. } | SymbolKind::Param { .. } | SymbolKind::Const { .. } => symbol.ty.clone(),
            SymbolKind::Func { .. } | SymbolKind::TypeAlias => {
                let message = format!("{} '{}' cannot be used as a value", symbol.describe(), name);
                self.error(message, self.position(var));
                Type::Error
            }
        }
    }

    /// Element type of `base[index]`; `None` once an error is known
    fn check_element(&mut self, expr: NodeId) -> Option<Type> {
        let base = self.ast.child(expr, 0)?;
        let index = self.ast.child(expr, 1)?;
        let base_ty = self.check_expr(base);
        let index_ty = self.check_expr(index);
        if index_ty != Type::Int && !index_ty.is_error() {
            self.error(format!("array index must be an integer, found {}", index_ty), self.position(index));
        }
        match base_ty {
            Type::Array { elem, .. } => Some(*elem),
            Type::Error => None,
            other => {
                let name = self.text(base);
                self.error(format!("'{}' is not an array (type {})", name, other), self.position(base));
                None
            }
        }
    }

    fn check_field(&mut self, expr: NodeId) -> Type {
        let Some(elem) = self.check_element(expr) else {
            return Type::Error;
        };
        let Some(field) = self.ast.child(expr, 2) else {
            return Type::Error;
        };
        if self.ast.kind(field) != NodeKind::Field {
            return Type::Error;
        }
        let field_name = self.text(field);
        match &elem {
            Type::Struct { name, .. } => match elem.field(field_name) {
                Some((_, ty)) => {
                    let ty = ty.clone();
                    self.decorations.set_type(field, ty.clone());
                    ty
                }
                None => {
                    self.error(format!("struct '{}' has no field '{}'", name, field_name), self.position(field));
                    Type::Error
                }
            },
            Type::Error => Type::Error,
            other => {
                self.error(
                    format!("cannot select field '{}' from an element of type {}", field_name, other),
                    self.position(field),
                );
                Type::Error
            }
        }
    }

    /// Check a call; `statement` calls may discard a result
    fn check_call(&mut self, call: NodeId, statement: bool) -> Type {
        let name = self.text(call);
        let at = self.position(call);
        let args = self.children(call);
        let arg_types: Vec<Type> = args.iter().map(|&a| self.check_expr(a)).collect();

        let Some(id) = self.scopes.resolve(name) else {
            self.error(format!("undeclared function '{}'", name), at);
            return Type::Error;
        };
        let SymbolKind::Func { return_type, param_types } = self.symbols.get(id).kind.clone() else {
            self.error(format!("'{}' is not a function", name), at);
            return Type::Error;
        };
        self.decorations.bind(call, id);

        if param_types.len() != arg_types.len() {
            self.error(
                format!(
                    "function '{}' expects {} argument(s), found {}",
                    name,
                    param_types.len(),
                    arg_types.len()
                ),
                at,
            );
        } else {
            for (i, (param, arg)) in param_types.iter().zip(&arg_types).enumerate() {
                if !assignable(param, arg) {
                    self.error(
                        format!("argument {} of '{}': cannot pass {} as {}", i + 1, name, arg, param),
                        self.position(args[i]),
                    );
                }
            }
        }

        if !statement && return_type == Type::Void {
            self.error(format!("void function '{}' used in an expression", name), at);
            return Type::Error;
        }
        return_type
    }
}

/// Run semantic analysis over a parsed tree
pub fn analyze(ast: &Ast) -> (Analysis, Diagnostics) {
    SemanticAnalyzer::new(ast).analyze()
}
