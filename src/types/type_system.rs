//! Type System for CD25

use std::fmt;

/// Resolved type of an expression, variable or declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Real,
    Bool,
    Void,
    Array { elem: Box<Type>, size: u32 },
    /// Fields in declaration order
    Struct { name: String, fields: Vec<(String, Type)> },
    /// Poison left by an already reported error
    Error,
}

impl Type {
    pub fn array(elem: Type, size: u32) -> Self {
        Self::Array { elem: Box::new(elem), size }
    }

    /// Size in 8-byte words
    pub fn size_words(&self) -> u32 {
        match self {
            Self::Int | Self::Real | Self::Bool | Self::Error => 1,
            Self::Void => 0,
            Self::Array { elem, size } => size.saturating_mul(elem.size_words()),
            Self::Struct { fields, .. } => fields.iter().map(|(_, t)| t.size_words()).sum(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Real)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Int | Self::Real | Self::Bool)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Element type of an array
    pub fn element(&self) -> Option<&Type> {
        match self {
            Self::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Field type and its word offset inside a struct
    pub fn field(&self, name: &str) -> Option<(u32, &Type)> {
        let Self::Struct { fields, .. } = self else {
            return None;
        };
        let mut offset = 0;
        for (field, ty) in fields {
            if field == name {
                return Some((offset, ty));
            }
            offset += ty.size_words();
        }
        None
    }

    /// Result type of an arithmetic operator over numeric operands
    pub fn numeric_result(lhs: &Type, rhs: &Type) -> Type {
        if *lhs == Type::Real || *rhs == Type::Real {
            Type::Real
        } else {
            Type::Int
        }
    }
}

/// Can a value of type `source` be stored into a `target`?
pub fn assignable(target: &Type, source: &Type) -> bool {
    match (target, source) {
        (Type::Error, _) | (_, Type::Error) => true,
        (Type::Real, Type::Int) => true,
        (Type::Array { elem: te, size: ts }, Type::Array { elem: se, size: ss }) => {
            ts == ss && assignable(te, se) && assignable(se, te)
        }
        _ => target == source,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "integer"),
            Self::Real => write!(f, "real"),
            Self::Bool => write!(f, "boolean"),
            Self::Void => write!(f, "void"),
            Self::Array { elem, size } => write!(f, "array[{}] of {}", size, elem),
            Self::Struct { name, .. } => write!(f, "struct {}", name),
            Self::Error => write!(f, "<error>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Type {
        Type::Struct {
            name: "pt".into(),
            fields: vec![("x".into(), Type::Real), ("y".into(), Type::Int)],
        }
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Type::Int.size_words(), 1);
        assert_eq!(Type::Void.size_words(), 0);
        assert_eq!(point().size_words(), 2);
        assert_eq!(Type::array(point(), 10).size_words(), 20);
    }

    #[test]
    fn test_field_offsets() {
        let pt = point();
        assert_eq!(pt.field("x"), Some((0, &Type::Real)));
        assert_eq!(pt.field("y"), Some((1, &Type::Int)));
        assert_eq!(pt.field("z"), None);
        assert_eq!(Type::Int.field("x"), None);
    }

    #[test]
    fn test_assignable() {
        assert!(assignable(&Type::Real, &Type::Int));
        assert!(!assignable(&Type::Int, &Type::Real));
        assert!(!assignable(&Type::Bool, &Type::Int));
        assert!(assignable(&Type::Error, &Type::Bool));
        assert!(assignable(&Type::Int, &Type::Error));
        assert!(assignable(&Type::array(Type::Int, 3), &Type::array(Type::Int, 3)));
        assert!(!assignable(&Type::array(Type::Int, 3), &Type::array(Type::Int, 4)));
        // Real <- Int holds one way only, so element types must match both ways
        assert!(!assignable(&Type::array(Type::Real, 3), &Type::array(Type::Int, 3)));
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(Type::numeric_result(&Type::Int, &Type::Int), Type::Int);
        assert_eq!(Type::numeric_result(&Type::Int, &Type::Real), Type::Real);
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::array(point(), 4).to_string(), "array[4] of struct pt");
    }
}
