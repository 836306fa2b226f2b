//! Abstract Syntax Tree definitions for CD25
//!
//! Nodes live in an arena and refer to their children by [`NodeId`]. Child
//! positions are fixed per kind (an assignment's child 0 is always the
//! lvalue). Types and symbols found by the analyzer are not stored here; see
//! `semantic::Decorations`.

use crate::frontend::token::Token;
use crate::utils::Position;

/// Index of a node in its [`Ast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // ============ Program & Sections ============
    Program,
    Globals,
    Constants,
    Types,
    Arrays,
    Functions,
    Main,

    // ============ Declarations ============
    /// `name is expr`
    Init,
    /// `name is field, ... end`
    StructDef,
    /// `name is array [size] of elem end`
    ArrayTypeDef,
    /// `name : typename` (struct field, local, global array)
    Decl,
    /// Function parameter
    Param,
    /// `const` qualified function parameter
    ConstParam,
    /// Type name leaf: `integer`, `real`, `boolean`, `void` or an identifier
    TypeName,
    FuncDef,
    ParamList,
    DeclList,

    // ============ Statements ============
    Stats,
    For,
    Repeat,
    AssignList,
    If,
    IfElse,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    Input,
    Output,
    Call,
    Return,

    // ============ Variables ============
    SimpleVar,
    /// `id[expr]`
    ArrayElement,
    /// `id[expr].field`
    ArrayField,
    /// Field name leaf of an `ArrayField`
    Field,

    // ============ Operators ============
    Not,
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    FnCall,

    // ============ Literals ============
    IntLit,
    RealLit,
    StrLit,
    True,
    False,
    /// `line` inside an output list
    Line,

    /// Placeholder left by error recovery; already diagnosed
    Undefined,
}

impl NodeKind {
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            NodeKind::Assign | NodeKind::AddAssign | NodeKind::SubAssign | NodeKind::MulAssign | NodeKind::DivAssign
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Div | NodeKind::Mod | NodeKind::Pow
        )
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, NodeKind::Gt | NodeKind::Ge | NodeKind::Lt | NodeKind::Le)
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, NodeKind::Eq | NodeKind::Ne)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, NodeKind::And | NodeKind::Or | NodeKind::Xor)
    }

    /// The binary operator a compound assignment applies
    pub fn compound_operator(&self) -> Option<NodeKind> {
        match self {
            NodeKind::AddAssign => Some(NodeKind::Add),
            NodeKind::SubAssign => Some(NodeKind::Sub),
            NodeKind::MulAssign => Some(NodeKind::Mul),
            NodeKind::DivAssign => Some(NodeKind::Div),
            _ => None,
        }
    }

    /// Source spelling of an operator kind
    pub fn symbol(&self) -> &'static str {
        match self {
            NodeKind::Add => "+",
            NodeKind::Sub => "-",
            NodeKind::Mul => "*",
            NodeKind::Div => "/",
            NodeKind::Mod => "%",
            NodeKind::Pow => "^",
            NodeKind::Eq => "==",
            NodeKind::Ne => "!=",
            NodeKind::Gt => ">",
            NodeKind::Ge => ">=",
            NodeKind::Lt => "<",
            NodeKind::Le => "<=",
            NodeKind::And => "and",
            NodeKind::Or => "or",
            NodeKind::Xor => "xor",
            NodeKind::Not => "not",
            NodeKind::Assign => "=",
            NodeKind::AddAssign => "+=",
            NodeKind::SubAssign => "-=",
            NodeKind::MulAssign => "*=",
            NodeKind::DivAssign => "/=",
            _ => "?",
        }
    }
}

/// A syntax tree node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub lexeme: Option<String>,
    pub line: u32,
    pub col: u32,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    pub fn text(&self) -> &str {
        self.lexeme.as_deref().unwrap_or("")
    }
}

/// Node arena
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose children already exist
    pub fn push(&mut self, kind: NodeKind, lexeme: Option<String>, at: Position, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            lexeme,
            line: at.line,
            col: at.col,
            children,
        });
        id
    }

    /// Add a childless node carrying a token's lexeme and position
    pub fn leaf(&mut self, kind: NodeKind, token: &Token) -> NodeId {
        self.push(kind, token.lexeme.clone(), token.position(), Vec::new())
    }

    /// Add a recovery placeholder
    pub fn undefined(&mut self, at: Position) -> NodeId {
        self.push(NodeKind::Undefined, None, at, Vec::new())
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// The program node; `None` until the parser has finished
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Child at a fixed position, if present
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node id in the tree, in creation order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_links() {
        let mut ast = Ast::new();
        let lhs = ast.push(NodeKind::SimpleVar, Some("x".into()), Position::new(1, 1), vec![]);
        let rhs = ast.push(NodeKind::IntLit, Some("5".into()), Position::new(1, 5), vec![]);
        let asgn = ast.push(NodeKind::Assign, None, Position::new(1, 1), vec![lhs, rhs]);
        assert_eq!(ast.root(), None);
        ast.set_root(asgn);

        assert_eq!(ast.root(), Some(asgn));
        assert_eq!(ast.child(asgn, 0), Some(lhs));
        assert_eq!(ast.child(asgn, 1), Some(rhs));
        assert_eq!(ast.child(asgn, 2), None);
        assert_eq!(ast.node(lhs).text(), "x");
        assert_eq!(ast.len(), 3);
    }

    #[test]
    fn test_compound_operator() {
        assert_eq!(NodeKind::MulAssign.compound_operator(), Some(NodeKind::Mul));
        assert_eq!(NodeKind::Assign.compound_operator(), None);
    }
}
