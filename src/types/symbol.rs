//! Symbols and the arena that owns them

use std::fmt;

use crate::types::Type;
use crate::utils::Position;

/// Index of a symbol in its [`SymbolArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Storage region of an addressable symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    ConstantPool,
    Global,
    Frame,
}

impl Region {
    /// Addressing level used by `LV<n>` / `LA<n>` / `ST n`
    pub fn level(self) -> u8 {
        match self {
            Region::ConstantPool => 0,
            Region::Global => 1,
            Region::Frame => 2,
        }
    }
}

/// Folded value of a constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Real(f64),
    Bool(bool),
}

impl ConstValue {
    pub fn as_real(&self) -> Option<f64> {
        match *self {
            ConstValue::Int(v) => Some(v as f64),
            ConstValue::Real(v) => Some(v),
            ConstValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Real(v) => write!(f, "{}", v),
            ConstValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Kind of symbol
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Var { region: Region, offset: i32, size_words: u32 },
    Param { region: Region, offset: i32, size_words: u32, is_const: bool },
    Func { return_type: Type, param_types: Vec<Type> },
    TypeAlias,
    /// `None` when the initializer was already diagnosed
    Const { value: Option<ConstValue> },
}

/// Symbol information
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Declared type; the return type for functions
    pub ty: Type,
    pub line: u32,
    pub col: u32,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: Type, at: Position, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            ty,
            line: at.line,
            col: at.col,
            kind,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    /// `(region, byte offset)` of variables and parameters
    pub fn address(&self) -> Option<(Region, i32)> {
        match self.kind {
            SymbolKind::Var { region, offset, .. } | SymbolKind::Param { region, offset, .. } => {
                Some((region, offset))
            }
            _ => None,
        }
    }

    /// Can this symbol (or an element of it) appear on the left of `=`?
    pub fn is_writable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Var { .. } | SymbolKind::Param { is_const: false, .. }
        )
    }

    /// Human readable symbol category for diagnostics
    pub fn describe(&self) -> &'static str {
        match self.kind {
            SymbolKind::Var { .. } => "variable",
            SymbolKind::Param { is_const: true, .. } => "const parameter",
            SymbolKind::Param { .. } => "parameter",
            SymbolKind::Func { .. } => "function",
            SymbolKind::TypeAlias => "type",
            SymbolKind::Const { .. } => "constant",
        }
    }
}

/// Owner of every symbol declared in one compilation
#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i as u32), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_levels() {
        assert_eq!(Region::ConstantPool.level(), 0);
        assert_eq!(Region::Global.level(), 1);
        assert_eq!(Region::Frame.level(), 2);
    }

    #[test]
    fn test_arena_ids_are_stable() {
        let mut arena = SymbolArena::new();
        let at = Position::new(1, 1);
        let a = arena.alloc(Symbol::new("a", Type::Int, at, SymbolKind::TypeAlias));
        let b = arena.alloc(Symbol::new(
            "b",
            Type::Real,
            at,
            SymbolKind::Var { region: Region::Global, offset: 8, size_words: 1 },
        ));
        assert_eq!(arena.get(a).name, "a");
        assert_eq!(arena.get(b).address(), Some((Region::Global, 8)));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_writability() {
        let at = Position::new(1, 1);
        let frame = |is_const| SymbolKind::Param { region: Region::Frame, offset: -8, size_words: 1, is_const };
        assert!(Symbol::new("p", Type::Int, at, frame(false)).is_writable());
        assert!(!Symbol::new("p", Type::Int, at, frame(true)).is_writable());
        let c = Symbol::new("c", Type::Int, at, SymbolKind::Const { value: Some(ConstValue::Int(1)) });
        assert!(!c.is_writable());
        assert_eq!(c.describe(), "constant");
    }
}
