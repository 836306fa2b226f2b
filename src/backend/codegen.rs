//! Code generation for the CD25 stack machine
//!
//! Walks the decorated tree and writes instructions through an [`Emitter`].
//! Output order: global frame allocation and array descriptors, `main`, then
//! every function in source order.

use crate::backend::emitter::Emitter;
use crate::backend::opcode::Opcode;
use crate::frontend::ast::{Ast, NodeId, NodeKind};
use crate::frontend::semantic::Analysis;
use crate::types::{ConstValue, ConstantPool, PoolEntry, SymbolKind, Type, WORD_SIZE};
use crate::utils::Result;

/// Generated program: instruction text plus the constant pool it indexes
#[derive(Debug, Clone)]
pub struct Module {
    pub code: String,
    pub constants: Vec<PoolEntry>,
}

impl Module {
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.code.lines()
    }
}

/// How an assignment target is stored to
enum Target {
    /// `ST level offset`
    Direct { level: u8, offset: i32 },
    /// Address already on the stack; plain `ST`
    Indirect,
}

pub struct CodeGenerator<'a> {
    ast: &'a Ast,
    analysis: &'a Analysis,
    emitter: Emitter,
    pool: ConstantPool,
    /// Return type of the function being generated; `None` in main
    current_return: Option<Type>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(ast: &'a Ast, analysis: &'a Analysis) -> Self {
        Self {
            ast,
            analysis,
            emitter: Emitter::new(),
            pool: analysis.pool.clone(),
            current_return: None,
        }
    }

    /// Generate the whole program
    pub fn generate(mut self) -> Result<Module> {
        self.gen_program()?;
        let lines = self.emitter.lines().len();
        let code = self.emitter.finish()?;
        log::debug!("code generation: {} lines, {} pool entries", lines, self.pool.len());
        Ok(Module {
            code,
            constants: self.pool.into_entries(),
        })
    }

    fn children(&self, node: NodeId) -> &'a [NodeId] {
        self.ast.children(node)
    }

    fn ty(&self, node: NodeId) -> Type {
        self.analysis.type_of(node)
    }

    // ==================== Program Structure ====================

    fn gen_program(&mut self) -> Result<()> {
        let ast = self.ast;
        let Some(&[_, globals, functions, main]) = ast.root().map(|root| ast.children(root)) else {
            self.emitter.emit(Opcode::TRAP);
            return Ok(());
        };

        if self.analysis.global_words > 0 {
            self.emitter.emit_int(Opcode::ALLOC, self.analysis.global_words as i64);
        }
        if let Some(arrays) = ast.child(globals, 2) {
            for &decl in self.children(arrays) {
                self.gen_descriptor(decl);
            }
        }
        if let Some(decls) = ast.child(main, 0) {
            for &decl in self.children(decls) {
                self.gen_descriptor(decl);
            }
        }

        self.emitter.define_label("main")?;
        self.current_return = None;
        if let Some(stats) = ast.child(main, 1) {
            self.gen_stats(stats)?;
        }
        self.emitter.emit(Opcode::HALT);

        for &func in self.children(functions) {
            if ast.kind(func) == NodeKind::FuncDef {
                self.gen_function(func)?;
            }
        }
        Ok(())
    }

    /// Allocate storage for an array variable: `LA<l> off`, count, `ARRAY`
    fn gen_descriptor(&mut self, decl: NodeId) {
        let Some(symbol) = self.analysis.symbol_of(decl) else {
            return;
        };
        let (Type::Array { elem, size }, Some((region, offset))) = (&symbol.ty, symbol.address()) else {
            return;
        };
        let elem_bytes = elem.size_words() as i64 * WORD_SIZE as i64;
        self.emitter.emit_int(Opcode::load_address(region.level()), offset as i64);
        self.push_int(*size as i64);
        self.emitter.emit_int(Opcode::ARRAY, elem_bytes);
    }

    fn gen_function(&mut self, func: NodeId) -> Result<()> {
        let &[_, _, locals, body] = self.children(func) else {
            return Ok(());
        };
        let name = self.ast.node(func).text();
        self.emitter.define_label(&format!("fn_{}", name))?;

        let words = self.analysis.frame_words.get(&func).copied().unwrap_or(0);
        if words > 0 {
            self.emitter.emit_int(Opcode::ALLOC, words as i64);
        }
        for &decl in self.children(locals) {
            self.gen_descriptor(decl);
        }

        let return_type = match self.analysis.symbol_of(func).map(|s| &s.kind) {
            Some(SymbolKind::Func { return_type, .. }) => return_type.clone(),
            _ => Type::Error,
        };
        self.current_return = Some(return_type.clone());
        self.gen_stats(body)?;
        // Falling off the end of a value-returning function is a runtime fault
        self.emitter.emit(if return_type == Type::Void { Opcode::RETN } else { Opcode::TRAP });
        self.current_return = None;
        Ok(())
    }

    // ==================== Statements ====================

    fn gen_stats(&mut self, stats: NodeId) -> Result<()> {
        for &stat in self.children(stats) {
            self.gen_stat(stat)?;
        }
        Ok(())
    }

    fn gen_stat(&mut self, stat: NodeId) -> Result<()> {
        let kind = self.ast.kind(stat);
        let children = self.children(stat);
        match kind {
            NodeKind::Stats | NodeKind::AssignList => self.gen_stats(stat)?,
            k if k.is_assignment() => self.gen_assignment(stat),
            NodeKind::Input => {
                for &target in children {
                    self.gen_input(target);
                }
            }
            NodeKind::Output => self.gen_output(children),
            NodeKind::Call => {
                let returns = self.gen_call(stat);
                if returns != Type::Void && !returns.is_error() {
                    // Drop the unused result
                    self.emitter.emit_int(Opcode::ALLOC, -1);
                }
            }
            NodeKind::Return => self.gen_return(stat),
            NodeKind::If | NodeKind::IfElse => self.gen_if(children)?,
            NodeKind::For => self.gen_for(children)?,
            NodeKind::Repeat => self.gen_repeat(children)?,
            _ => self.emitter.emit(Opcode::TRAP),
        }
        Ok(())
    }

    fn gen_if(&mut self, children: &[NodeId]) -> Result<()> {
        let (cond, then_branch, else_branch) = match *children {
            [cond, then_branch] => (cond, then_branch, None),
            [cond, then_branch, else_branch] => (cond, then_branch, Some(else_branch)),
            _ => {
                self.emitter.emit(Opcode::TRAP);
                return Ok(());
            }
        };

        let else_label = self.emitter.new_label("else");
        self.gen_expr(cond);
        self.emitter.emit_label_ref(Opcode::BF, &else_label);
        self.gen_stats(then_branch)?;
        match else_branch {
            Some(else_branch) => {
                let end_label = self.emitter.new_label("endif");
                self.emitter.emit_label_ref(Opcode::BR, &end_label);
                self.emitter.define_label(&else_label)?;
                self.gen_stats(else_branch)?;
                self.emitter.define_label(&end_label)?;
            }
            None => self.emitter.define_label(&else_label)?,
        }
        Ok(())
    }

    fn gen_for(&mut self, children: &[NodeId]) -> Result<()> {
        let &[inits, cond, body] = children else {
            self.emitter.emit(Opcode::TRAP);
            return Ok(());
        };
        let top = self.emitter.new_label("for_top");
        let end = self.emitter.new_label("for_end");

        self.gen_stats(inits)?;
        self.emitter.define_label(&top)?;
        self.gen_expr(cond);
        self.emitter.emit_label_ref(Opcode::BF, &end);
        self.gen_stats(body)?;
        self.emitter.emit_label_ref(Opcode::BR, &top);
        self.emitter.define_label(&end)?;
        Ok(())
    }

    /// Body first, then loop back while the condition is false
    fn gen_repeat(&mut self, children: &[NodeId]) -> Result<()> {
        let &[inits, body, cond] = children else {
            self.emitter.emit(Opcode::TRAP);
            return Ok(());
        };
        let top = self.emitter.new_label("repeat_top");

        self.gen_stats(inits)?;
        self.emitter.define_label(&top)?;
        self.gen_stats(body)?;
        self.gen_expr(cond);
        self.emitter.emit_label_ref(Opcode::BF, &top);
        Ok(())
    }

    fn gen_return(&mut self, stat: NodeId) {
        let Some(return_type) = self.current_return.clone() else {
            self.emitter.emit(Opcode::HALT);
            return;
        };
        if let Some(value) = self.ast.child(stat, 0) {
            self.gen_expr(value);
            self.widen(&return_type, &self.ty(value));
            self.emitter.emit(Opcode::RVAL);
        }
        self.emitter.emit(Opcode::RETN);
    }

    fn gen_assignment(&mut self, stat: NodeId) {
        let &[target, value] = self.children(stat) else {
            self.emitter.emit(Opcode::TRAP);
            return;
        };
        let target_ty = self.ty(target);
        let value_ty = self.ty(value);
        let Some(dest) = self.gen_target(target) else {
            return;
        };

        match self.ast.kind(stat).compound_operator() {
            None => {
                self.gen_expr(value);
                self.widen(&target_ty, &value_ty);
            }
            Some(op) => {
                // Current value of the target, reusing an element address
                match dest {
                    Target::Direct { level, offset } => {
                        self.emitter.emit_int(Opcode::load_value(level), offset as i64)
                    }
                    Target::Indirect => {
                        self.emitter.emit(Opcode::DUP);
                        self.emitter.emit(Opcode::L);
                    }
                }
                self.gen_expr(value);
                self.widen(&target_ty, &value_ty);
                self.emitter.emit(operator_opcode(op));
            }
        }
        self.store(dest);
    }

    fn gen_input(&mut self, target: NodeId) {
        let read = if self.ty(target) == Type::Real { Opcode::READF } else { Opcode::READI };
        let Some(dest) = self.gen_target(target) else {
            return;
        };
        self.emitter.emit(read);
        self.store(dest);
    }

    fn gen_output(&mut self, items: &[NodeId]) {
        let mut after_value = false;
        for &item in items {
            match self.ast.kind(item) {
                NodeKind::Line => {
                    self.emitter.emit(Opcode::NEWLN);
                    after_value = false;
                }
                NodeKind::StrLit => {
                    let offset = self.pool.intern_str(self.ast.node(item).text());
                    self.emitter.emit_int(Opcode::LA0, offset as i64);
                    self.emitter.emit(Opcode::STRPR);
                    after_value = false;
                }
                _ => {
                    if after_value {
                        self.emitter.emit(Opcode::SPACE);
                    }
                    self.gen_expr(item);
                    self.emitter.emit(Opcode::VALPR);
                    after_value = true;
                }
            }
        }
    }

    /// Prepare a store: nothing for a simple variable, the element address
    /// otherwise. `None` (after a `TRAP`) when the target is unresolved.
    fn gen_target(&mut self, target: NodeId) -> Option<Target> {
        match self.ast.kind(target) {
            NodeKind::SimpleVar => match self.analysis.symbol_of(target).and_then(|s| s.address()) {
                Some((region, offset)) => Some(Target::Direct { level: region.level(), offset }),
                None => {
                    self.emitter.emit(Opcode::TRAP);
                    None
                }
            },
            NodeKind::ArrayElement | NodeKind::ArrayField => {
                if self.gen_element_address(target) {
                    Some(Target::Indirect)
                } else {
                    None
                }
            }
            _ => {
                self.emitter.emit(Opcode::TRAP);
                None
            }
        }
    }

    fn store(&mut self, dest: Target) {
        match dest {
            Target::Direct { level, offset } => self.emitter.emit_pair(Opcode::ST, level as i64, offset as i64),
            Target::Indirect => self.emitter.emit(Opcode::ST),
        }
    }

    /// `FTYPE` when an integer value lands in a real slot
    fn widen(&mut self, target: &Type, value: &Type) {
        if *target == Type::Real && *value == Type::Int {
            self.emitter.emit(Opcode::FTYPE);
        }
    }

    // ==================== Expressions ====================

    fn push_int(&mut self, value: i64) {
        if (-128..=127).contains(&value) {
            self.emitter.emit_int(Opcode::LB, value);
        } else if (-32768..=32767).contains(&value) {
            self.emitter.emit_int(Opcode::LH, value);
        } else {
            let offset = self.pool.intern_int(value);
            self.emitter.emit_int(Opcode::LV0, offset as i64);
        }
    }

    fn push_real(&mut self, value: f64) {
        if value == 0.0 {
            self.emitter.emit(Opcode::ZERO);
            self.emitter.emit(Opcode::FTYPE);
        } else {
            let offset = self.pool.intern_real(value);
            self.emitter.emit_int(Opcode::LV0, offset as i64);
        }
    }

    fn push_const(&mut self, value: ConstValue) {
        match value {
            ConstValue::Int(v) => self.push_int(v),
            ConstValue::Real(v) => self.push_real(v),
            ConstValue::Bool(true) => self.emitter.emit(Opcode::TRUE),
            ConstValue::Bool(false) => self.emitter.emit(Opcode::FALSE),
        }
    }

    fn gen_expr(&mut self, expr: NodeId) {
        let node = self.ast.node(expr);
        match node.kind {
            NodeKind::IntLit => match node.text().parse::<i64>() {
                Ok(value) => self.push_int(value),
                Err(_) => self.emitter.emit(Opcode::TRAP),
            },
            NodeKind::RealLit => match node.text().parse::<f64>() {
                Ok(value) => self.push_real(value),
                Err(_) => self.emitter.emit(Opcode::TRAP),
            },
            NodeKind::True => self.emitter.emit(Opcode::TRUE),
            NodeKind::False => self.emitter.emit(Opcode::FALSE),
            NodeKind::SimpleVar => self.gen_name(expr),
            NodeKind::ArrayElement | NodeKind::ArrayField => {
                if self.gen_element_address(expr) {
                    self.emitter.emit(Opcode::L);
                }
            }
            NodeKind::Not => {
                match self.ast.child(expr, 0) {
                    Some(inner) => self.gen_expr(inner),
                    None => self.emitter.emit(Opcode::TRAP),
                }
                self.emitter.emit(Opcode::NOT);
            }
            NodeKind::FnCall => {
                self.gen_call(expr);
            }
            kind if kind.is_arithmetic() || kind.is_ordering() || kind.is_equality() || kind.is_logical() => {
                self.gen_binary(expr, kind)
            }
            _ => self.emitter.emit(Opcode::TRAP),
        }
    }

    fn gen_name(&mut self, var: NodeId) {
        let Some(symbol) = self.analysis.symbol_of(var) else {
            self.emitter.emit(Opcode::TRAP);
            return;
        };
        match symbol.kind {
            SymbolKind::Const { value: Some(value) } => self.push_const(value),
            SymbolKind::Var { region, offset, .. } | SymbolKind::Param { region, offset, .. } => {
                self.emitter.emit_int(Opcode::load_value(region.level()), offset as i64)
            }
            _ => self.emitter.emit(Opcode::TRAP),
        }
    }

    fn gen_binary(&mut self, expr: NodeId, kind: NodeKind) {
        let &[lhs, rhs] = self.children(expr) else {
            self.emitter.emit(Opcode::TRAP);
            return;
        };
        let lt = self.ty(lhs);
        let rt = self.ty(rhs);
        // Mixed numeric operands compute in reals; the exponent of '^' stays integer
        let promote = kind != NodeKind::Pow && (lt == Type::Real || rt == Type::Real);

        self.gen_expr(lhs);
        if promote {
            self.widen(&Type::Real, &lt);
        }
        self.gen_expr(rhs);
        if promote {
            self.widen(&Type::Real, &rt);
        }
        self.emitter.emit(operator_opcode(kind));
    }

    /// Push the address of `base[index]` or `base[index].field`
    fn gen_element_address(&mut self, expr: NodeId) -> bool {
        let children = self.children(expr);
        let (Some(&base), Some(&index)) = (children.first(), children.get(1)) else {
            self.emitter.emit(Opcode::TRAP);
            return false;
        };
        let Some((region, offset)) = self.analysis.symbol_of(base).and_then(|s| s.address()) else {
            self.emitter.emit(Opcode::TRAP);
            return false;
        };
        let Some(elem) = self.ty(base).element().cloned() else {
            self.emitter.emit(Opcode::TRAP);
            return false;
        };

        self.emitter.emit_int(Opcode::load_value(region.level()), offset as i64);
        self.gen_expr(index);
        self.emitter.emit_int(Opcode::INDEX, elem.size_words() as i64 * WORD_SIZE as i64);

        if self.ast.kind(expr) == NodeKind::ArrayField {
            let field = self.ast.node(expr).text();
            let Some((words, _)) = elem.field(field) else {
                self.emitter.emit(Opcode::TRAP);
                return false;
            };
            self.emitter.emit_int(Opcode::STEP, words as i64 * WORD_SIZE as i64);
        }
        true
    }

    /// Push arguments and call; returns the callee's return type
    fn gen_call(&mut self, call: NodeId) -> Type {
        let args = self.children(call);
        let Some(SymbolKind::Func { return_type, param_types }) =
            self.analysis.symbol_of(call).map(|s| s.kind.clone())
        else {
            self.emitter.emit(Opcode::TRAP);
            return Type::Error;
        };

        for (i, &arg) in args.iter().enumerate() {
            self.gen_expr(arg);
            if let Some(param) = param_types.get(i) {
                self.widen(param, &self.ty(arg));
            }
        }
        self.push_int(args.len() as i64);
        let label = format!("fn_{}", self.ast.node(call).text());
        self.emitter.emit_label_ref(Opcode::LA0, &label);
        self.emitter.emit(Opcode::JS2);
        return_type
    }
}

/// Opcode of a binary operator
fn operator_opcode(kind: NodeKind) -> Opcode {
    match kind {
        NodeKind::Add => Opcode::ADD,
        NodeKind::Sub => Opcode::SUB,
        NodeKind::Mul => Opcode::MUL,
        NodeKind::Div => Opcode::DIV,
        NodeKind::Mod => Opcode::REM,
        NodeKind::Pow => Opcode::POW,
        NodeKind::Gt => Opcode::GT,
        NodeKind::Ge => Opcode::GE,
        NodeKind::Lt => Opcode::LT,
        NodeKind::Le => Opcode::LE,
        NodeKind::Eq => Opcode::EQ,
        NodeKind::Ne => Opcode::NE,
        NodeKind::And => Opcode::AND,
        NodeKind::Or => Opcode::OR,
        NodeKind::Xor => Opcode::XOR,
        _ => Opcode::TRAP,
    }
}

/// Generate code for an analyzed tree
pub fn generate(ast: &Ast, analysis: &Analysis) -> Result<Module> {
    CodeGenerator::new(ast, analysis).generate()
}
