//! Static memory layout
//!
//! Bump allocators for the three addressing regions. Offsets are in bytes and
//! always a multiple of [`WORD_SIZE`].

use serde::Serialize;

/// Bytes per machine word
pub const WORD_SIZE: i32 = 8;
/// Offset of the first parameter in a call frame
pub const PARAM_BASE: i32 = -8;
/// Offset of the first local in a call frame
pub const LOCAL_BASE: i32 = 16;

/// Global frame cursor
#[derive(Debug, Default)]
pub struct GlobalLayout {
    next: i32,
}

impl GlobalLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, words: u32) -> i32 {
        let offset = self.next;
        self.next += words as i32 * WORD_SIZE;
        offset
    }

    /// Words handed out so far
    pub fn words(&self) -> u32 {
        (self.next / WORD_SIZE) as u32
    }
}

/// Call frame of one function: parameters grow down, locals grow up
#[derive(Debug)]
pub struct FrameLayout {
    next_param: i32,
    next_local: i32,
}

impl FrameLayout {
    pub fn new() -> Self {
        Self {
            next_param: PARAM_BASE,
            next_local: LOCAL_BASE,
        }
    }

    pub fn alloc_param(&mut self, words: u32) -> i32 {
        let offset = self.next_param;
        self.next_param -= words as i32 * WORD_SIZE;
        offset
    }

    pub fn alloc_local(&mut self, words: u32) -> i32 {
        let offset = self.next_local;
        self.next_local += words as i32 * WORD_SIZE;
        offset
    }

    /// Words of local storage the frame needs
    pub fn local_words(&self) -> u32 {
        ((self.next_local - LOCAL_BASE) / WORD_SIZE) as u32
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// A constant pool value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PoolValue {
    Int(i64),
    Real(f64),
    Str(String),
}

impl PoolValue {
    fn same_as(&self, other: &PoolValue) -> bool {
        match (self, other) {
            (PoolValue::Int(a), PoolValue::Int(b)) => a == b,
            // Bit equality keeps 0.0 and -0.0 apart
            (PoolValue::Real(a), PoolValue::Real(b)) => a.to_bits() == b.to_bits(),
            (PoolValue::Str(a), PoolValue::Str(b)) => a == b,
            _ => false,
        }
    }
}

/// An interned constant and its byte offset in the pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolEntry {
    pub offset: i32,
    pub value: PoolValue,
}

/// Level 0 region: literals too wide for an immediate operand
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `value`, interning it on first use
    pub fn intern(&mut self, value: PoolValue) -> i32 {
        if let Some(entry) = self.entries.iter().find(|e| e.value.same_as(&value)) {
            return entry.offset;
        }
        let offset = self.entries.len() as i32 * WORD_SIZE;
        log::trace!("pool[{}] = {:?}", offset, value);
        self.entries.push(PoolEntry { offset, value });
        offset
    }

    pub fn intern_int(&mut self, value: i64) -> i32 {
        self.intern(PoolValue::Int(value))
    }

    pub fn intern_real(&mut self, value: f64) -> i32 {
        self.intern(PoolValue::Real(value))
    }

    pub fn intern_str(&mut self, value: &str) -> i32 {
        self.intern(PoolValue::Str(value.to_string()))
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<PoolEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_offsets() {
        let mut frame = FrameLayout::new();
        let params: Vec<_> = (0..3).map(|_| frame.alloc_param(1)).collect();
        let locals: Vec<_> = (0..3).map(|_| frame.alloc_local(1)).collect();
        assert_eq!(params, vec![-8, -16, -24]);
        assert_eq!(locals, vec![16, 24, 32]);
        assert_eq!(frame.local_words(), 3);
    }

    #[test]
    fn test_global_cursor() {
        let mut globals = GlobalLayout::new();
        assert_eq!(globals.alloc(1), 0);
        assert_eq!(globals.alloc(1), 8);
        assert_eq!(globals.words(), 2);
    }

    #[test]
    fn test_pool_dedup() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.intern_real(3.5), 0);
        assert_eq!(pool.intern_str("hi"), 8);
        assert_eq!(pool.intern_real(3.5), 0);
        assert_eq!(pool.intern_int(1_000_000), 16);
        assert_eq!(pool.intern_str("hi"), 8);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_pool_entry_json() {
        let mut pool = ConstantPool::new();
        pool.intern_str("a");
        let json = serde_json::to_string(pool.entries()).unwrap();
        assert_eq!(json, r#"[{"offset":0,"value":{"kind":"str","value":"a"}}]"#);
    }
}
