//! Core value type definitions
//!
//! Every [`ValueType`] handed out by the [`TypeSystem`](crate::TypeSystem) is
//! canonical: equal shapes share one allocation, so `Arc::ptr_eq` is a valid
//! substitute for structural equality downstream.

use std::fmt;
use std::sync::Arc;

use crate::compound::CompoundType;
use crate::object::ObjectType;

/// Scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    /// The empty type; zero-sized
    Void,
    /// One-byte boolean
    Boolean,
    /// Signed 8-bit integer
    S8,
    /// Signed 16-bit integer
    S16,
    /// Signed 32-bit integer
    S32,
    /// Signed 64-bit integer
    S64,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// IEEE 754 single precision
    F32,
    /// IEEE 754 double precision
    F64,
}

impl PrimitiveType {
    /// All scalar types, in declaration order
    pub const ALL: [PrimitiveType; 12] = [
        PrimitiveType::Void,
        PrimitiveType::Boolean,
        PrimitiveType::S8,
        PrimitiveType::S16,
        PrimitiveType::S32,
        PrimitiveType::S64,
        PrimitiveType::U8,
        PrimitiveType::U16,
        PrimitiveType::U32,
        PrimitiveType::U64,
        PrimitiveType::F32,
        PrimitiveType::F64,
    ];

    /// Width in bits
    pub fn bits(self) -> u32 {
        match self {
            PrimitiveType::Void => 0,
            PrimitiveType::Boolean | PrimitiveType::S8 | PrimitiveType::U8 => 8,
            PrimitiveType::S16 | PrimitiveType::U16 => 16,
            PrimitiveType::S32 | PrimitiveType::U32 | PrimitiveType::F32 => 32,
            PrimitiveType::S64 | PrimitiveType::U64 | PrimitiveType::F64 => 64,
        }
    }

    /// Size in bytes
    pub fn size(self) -> u64 {
        (self.bits() / 8) as u64
    }

    /// Alignment in bytes; scalars are naturally aligned
    pub fn align(self) -> u64 {
        self.size().max(1)
    }

    /// Check if this is a signed or unsigned integer type
    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    /// Check if this is a signed integer type
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveType::S8 | PrimitiveType::S16 | PrimitiveType::S32 | PrimitiveType::S64
        )
    }

    /// Check if this is an unsigned integer type
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 | PrimitiveType::U64
        )
    }

    /// Check if this is a floating point type
    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Boolean => "bool",
            PrimitiveType::S8 => "s8",
            PrimitiveType::S16 => "s16",
            PrimitiveType::S32 => "s32",
            PrimitiveType::S64 => "s64",
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Native pointer to a value type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointerType {
    /// Pointed-to type
    pub pointee: ValueType,
    /// Pointer size in bytes
    pub size: u32,
    /// Pointer alignment in bytes
    pub align: u32,
}

/// Nullable reference to an instance of an object type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceType {
    /// Most specific class every referent is known to be an instance of
    pub upper_bound: Arc<ObjectType>,
    /// Reference size in bytes
    pub size: u32,
    /// Reference alignment in bytes
    pub align: u32,
}

/// Runtime type identifier of instances bounded by an object type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeIdType {
    /// Upper bound of the identified types
    pub upper_bound: Arc<ObjectType>,
    /// Type id size in bytes
    pub size: u32,
    /// Type id alignment in bytes
    pub align: u32,
}

/// Function signature type; zero-sized
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    /// Return type
    pub return_type: ValueType,
    /// Parameter types
    pub params: Vec<ValueType>,
}

/// A datum's compile-time type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Scalar
    Primitive(PrimitiveType),
    /// Native pointer
    Pointer(Arc<PointerType>),
    /// Object reference
    Reference(Arc<ReferenceType>),
    /// Type identifier
    TypeId(Arc<TypeIdType>),
    /// Function signature
    Function(Arc<FunctionType>),
    /// Struct or union aggregate
    Compound(Arc<CompoundType>),
}

impl ValueType {
    /// The void type
    pub const VOID: ValueType = ValueType::Primitive(PrimitiveType::Void);

    /// Size in bytes
    pub fn size(&self) -> u64 {
        match self {
            ValueType::Primitive(p) => p.size(),
            ValueType::Pointer(p) => p.size as u64,
            ValueType::Reference(r) => r.size as u64,
            ValueType::TypeId(t) => t.size as u64,
            ValueType::Function(_) => 0,
            ValueType::Compound(c) => c.size(),
        }
    }

    /// Alignment in bytes; always a power of two
    pub fn align(&self) -> u64 {
        match self {
            ValueType::Primitive(p) => p.align(),
            ValueType::Pointer(p) => p.align as u64,
            ValueType::Reference(r) => r.align as u64,
            ValueType::TypeId(t) => t.align as u64,
            ValueType::Function(_) => 1,
            ValueType::Compound(c) => c.align(),
        }
    }

    /// Check if this is the void type
    pub fn is_void(&self) -> bool {
        matches!(self, ValueType::Primitive(PrimitiveType::Void))
    }

    /// Scalar type, if this is one
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            ValueType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Reference type, if this is one
    pub fn as_reference(&self) -> Option<&Arc<ReferenceType>> {
        match self {
            ValueType::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Pointer type, if this is one
    pub fn as_pointer(&self) -> Option<&Arc<PointerType>> {
        match self {
            ValueType::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Function type, if this is one
    pub fn as_function(&self) -> Option<&Arc<FunctionType>> {
        match self {
            ValueType::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Compound type, if this is one
    pub fn as_compound(&self) -> Option<&Arc<CompoundType>> {
        match self {
            ValueType::Compound(c) => Some(c),
            _ => None,
        }
    }

    /// Identity comparison of canonical instances
    pub fn ptr_eq(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Primitive(a), ValueType::Primitive(b)) => a == b,
            (ValueType::Pointer(a), ValueType::Pointer(b)) => Arc::ptr_eq(a, b),
            (ValueType::Reference(a), ValueType::Reference(b)) => Arc::ptr_eq(a, b),
            (ValueType::TypeId(a), ValueType::TypeId(b)) => Arc::ptr_eq(a, b),
            (ValueType::Function(a), ValueType::Function(b)) => Arc::ptr_eq(a, b),
            (ValueType::Compound(a), ValueType::Compound(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<PrimitiveType> for ValueType {
    fn from(p: PrimitiveType) -> Self {
        ValueType::Primitive(p)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Primitive(p) => write!(f, "{}", p),
            ValueType::Pointer(p) => write!(f, "{}*", p.pointee),
            ValueType::Reference(r) => write!(f, "ref<{}>", r.upper_bound.name()),
            ValueType::TypeId(t) => write!(f, "typeid<{}>", t.upper_bound.name()),
            ValueType::Function(func) => {
                write!(f, "function (")?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", func.return_type)
            }
            ValueType::Compound(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_sizes() {
        assert_eq!(PrimitiveType::Void.size(), 0);
        assert_eq!(PrimitiveType::Void.align(), 1);
        assert_eq!(PrimitiveType::Boolean.size(), 1);
        assert_eq!(PrimitiveType::S16.align(), 2);
        assert_eq!(PrimitiveType::U32.size(), 4);
        assert_eq!(PrimitiveType::F64.align(), 8);
    }

    #[test]
    fn test_primitive_classification() {
        assert!(PrimitiveType::S8.is_signed());
        assert!(PrimitiveType::U64.is_unsigned());
        assert!(PrimitiveType::U64.is_integer());
        assert!(!PrimitiveType::F32.is_integer());
        assert!(PrimitiveType::F32.is_float());
        assert!(!PrimitiveType::Boolean.is_integer());
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueType::from(PrimitiveType::S32).to_string(), "s32");
        let func = ValueType::Function(Arc::new(FunctionType {
            return_type: ValueType::VOID,
            params: vec![PrimitiveType::S64.into(), PrimitiveType::F32.into()],
        }));
        assert_eq!(func.to_string(), "function (s64, f32) -> void");
        assert_eq!(func.size(), 0);
        assert_eq!(func.align(), 1);
    }
}
