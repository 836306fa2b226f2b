//! Types, symbols, scopes and static layout

mod type_system;
mod symbol;
mod scope;
pub mod layout;

pub use type_system::{assignable, Type};
pub use symbol::{ConstValue, Region, Symbol, SymbolArena, SymbolId, SymbolKind};
pub use scope::{ScopeGuard, ScopeHost, ScopeStack};
pub use layout::{ConstantPool, FrameLayout, GlobalLayout, PoolEntry, PoolValue, WORD_SIZE};
