//! Lexical scopes
//!
//! One global scope plus one scope per function or main body. Scopes are
//! entered through [`ScopeGuard`], which pops on drop so every exit path
//! leaves the stack balanced.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::types::SymbolId;

#[derive(Debug, Default)]
struct Scope {
    entries: HashMap<String, SymbolId>,
}

/// Stack of scopes; the bottom one is the global scope and is never popped
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    fn push(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of active scopes, the global one included
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `name` in the innermost scope. Returns false, leaving the
    /// existing binding untouched, if the name is already there.
    pub fn define(&mut self, name: &str, id: SymbolId) -> bool {
        let Some(scope) = self.scopes.last_mut() else {
            return false;
        };
        if scope.entries.contains_key(name) {
            return false;
        }
        scope.entries.insert(name.to_string(), id);
        true
    }

    /// Look up a name from the innermost scope outwards
    pub fn resolve(&self, name: &str) -> Option<SymbolId> {
        self.scopes.iter().rev().find_map(|s| s.entries.get(name).copied())
    }

    /// Look up a name in the innermost scope only
    pub fn resolve_local(&self, name: &str) -> Option<SymbolId> {
        self.scopes.last().and_then(|s| s.entries.get(name).copied())
    }

    /// Enter a nested scope on this stack directly
    pub fn enter_scope(&mut self) -> ScopeGuard<'_, ScopeStack> {
        ScopeGuard::enter(self)
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that owns a scope stack
pub trait ScopeHost {
    fn scopes_mut(&mut self) -> &mut ScopeStack;
}

impl ScopeHost for ScopeStack {
    fn scopes_mut(&mut self) -> &mut ScopeStack {
        self
    }
}

/// An entered scope; derefs to its host and pops the scope when dropped
pub struct ScopeGuard<'a, H: ScopeHost> {
    host: &'a mut H,
}

impl<'a, H: ScopeHost> ScopeGuard<'a, H> {
    pub fn enter(host: &'a mut H) -> Self {
        host.scopes_mut().push();
        Self { host }
    }
}

impl<H: ScopeHost> Deref for ScopeGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        self.host
    }
}

impl<H: ScopeHost> DerefMut for ScopeGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        self.host
    }
}

impl<H: ScopeHost> Drop for ScopeGuard<'_, H> {
    fn drop(&mut self) {
        self.host.scopes_mut().pop();
    }
}
