//! Interned compile-time constants
//!
//! Every literal is created through the [`LiteralFactory`], which returns
//! one shared instance per distinct value. Two occurrences of the same
//! constant anywhere in a graph are therefore the same `Arc`.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kestrel_types::{PrimitiveType, TypeSystem, ValueType};

/// A named object with a fixed address in the final program image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramObject {
    name: String,
    value_type: ValueType,
    symbol_type: ValueType,
}

impl ProgramObject {
    /// Symbol name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the object's contents
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Type of the symbol, a pointer to the contents
    pub fn symbol_type(&self) -> &ValueType {
        &self.symbol_type
    }
}

/// An immutable constant value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    /// Integer, stored truncated to the width of `ty`
    Integer {
        /// Integer type
        ty: PrimitiveType,
        /// Value truncated to the width of `ty`
        bits: u64,
    },
    /// Floating point, stored as raw bits
    Float {
        /// `f32` or `f64`
        ty: PrimitiveType,
        /// IEEE bit pattern
        bits: u64,
    },
    /// Boolean
    Bool(bool),
    /// String constant of the language string class
    String {
        /// String contents
        value: Arc<str>,
        /// String reference type
        ty: ValueType,
    },
    /// A type used as an operand, e.g. the input of a class literal
    Type {
        /// Denoted type
        value: ValueType,
        /// Type-id type
        ty: ValueType,
    },
    /// Reference to a program object
    ProgramObject(Arc<ProgramObject>),
    /// All-zero value of any type
    ZeroInitializer(ValueType),
    /// Null reference or pointer
    Null(ValueType),
}

impl Literal {
    /// Type of this literal
    pub fn ty(&self) -> ValueType {
        match self {
            Literal::Integer { ty, .. } | Literal::Float { ty, .. } => ValueType::Primitive(*ty),
            Literal::Bool(_) => ValueType::Primitive(PrimitiveType::Boolean),
            Literal::String { ty, .. } | Literal::Type { ty, .. } => ty.clone(),
            Literal::ProgramObject(obj) => obj.symbol_type.clone(),
            Literal::ZeroInitializer(ty) | Literal::Null(ty) => ty.clone(),
        }
    }

    /// Whether this is the zero value of its type
    pub fn is_zero(&self) -> bool {
        match self {
            Literal::Integer { bits, .. } | Literal::Float { bits, .. } => *bits == 0,
            Literal::Bool(b) => !b,
            Literal::ZeroInitializer(_) | Literal::Null(_) => true,
            Literal::String { .. } | Literal::Type { .. } | Literal::ProgramObject(_) => false,
        }
    }

    /// Integer value, sign-extended for signed types
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Integer { ty, bits } => {
                let shift = 64 - ty.bits();
                if ty.is_signed() {
                    Some(((*bits << shift) as i64) >> shift)
                } else {
                    Some(*bits as i64)
                }
            }
            _ => None,
        }
    }

    /// Floating point value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Float { ty: PrimitiveType::F32, bits } => Some(f32::from_bits(*bits as u32) as f64),
            Literal::Float { bits, .. } => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// String contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The type operand of a type literal
    pub fn as_type(&self) -> Option<&ValueType> {
        match self {
            Literal::Type { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer { ty, .. } if ty.is_signed() => {
                write!(f, "{}{}", self.as_i64().unwrap_or_default(), ty)
            }
            Literal::Integer { ty, bits } => write!(f, "{}{}", bits, ty),
            Literal::Float { ty, .. } => write!(f, "{:?}{}", self.as_f64().unwrap_or_default(), ty),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::String { value, .. } => write!(f, "{:?}", value),
            Literal::Type { value, .. } => write!(f, "type({})", value),
            Literal::ProgramObject(obj) => write!(f, "&{}", obj.name),
            Literal::ZeroInitializer(ty) => write!(f, "zero({})", ty),
            Literal::Null(ty) => write!(f, "null({})", ty),
        }
    }
}

/// Interning factory for literals
pub struct LiteralFactory {
    types: Arc<TypeSystem>,
    string_type: ValueType,
    type_literal_type: ValueType,
    cache: DashMap<Arc<Literal>, ()>,
}

impl LiteralFactory {
    /// Create a factory
    ///
    /// `string_type` is the type of string constants and
    /// `type_literal_type` the type of type operands.
    pub fn new(types: Arc<TypeSystem>, string_type: ValueType, type_literal_type: ValueType) -> Self {
        LiteralFactory {
            types,
            string_type,
            type_literal_type,
            cache: DashMap::new(),
        }
    }

    fn intern(&self, literal: Literal) -> Arc<Literal> {
        match self.cache.entry(Arc::new(literal)) {
            Entry::Occupied(entry) => Arc::clone(entry.key()),
            Entry::Vacant(entry) => {
                let installed = Arc::clone(entry.key());
                log::trace!("interned literal {}", installed);
                entry.insert(());
                installed
            }
        }
    }

    /// Integer literal of an integer type
    ///
    /// `value` is truncated to the width of `ty`. A non-integer `ty` is
    /// logged and replaced with `s64`.
    pub fn integer(&self, ty: PrimitiveType, value: i64) -> Arc<Literal> {
        let ty = if ty.is_integer() {
            ty
        } else {
            log::warn!("integer literal {} requested as {}, using s64", value, ty);
            PrimitiveType::S64
        };
        let bits = match ty.bits() {
            64 => value as u64,
            width => (value as u64) & ((1u64 << width) - 1),
        };
        self.intern(Literal::Integer { ty, bits })
    }

    /// `s32` literal
    pub fn literal_of_i32(&self, value: i32) -> Arc<Literal> {
        self.integer(PrimitiveType::S32, value as i64)
    }

    /// `s64` literal
    pub fn literal_of_i64(&self, value: i64) -> Arc<Literal> {
        self.integer(PrimitiveType::S64, value)
    }

    /// `f32` literal
    pub fn literal_of_f32(&self, value: f32) -> Arc<Literal> {
        self.intern(Literal::Float {
            ty: PrimitiveType::F32,
            bits: value.to_bits() as u64,
        })
    }

    /// `f64` literal
    pub fn literal_of_f64(&self, value: f64) -> Arc<Literal> {
        self.intern(Literal::Float {
            ty: PrimitiveType::F64,
            bits: value.to_bits(),
        })
    }

    /// Boolean literal
    pub fn literal_of_bool(&self, value: bool) -> Arc<Literal> {
        self.intern(Literal::Bool(value))
    }

    /// String literal
    pub fn literal_of_str(&self, value: &str) -> Arc<Literal> {
        self.intern(Literal::String {
            value: Arc::from(value),
            ty: self.string_type.clone(),
        })
    }

    /// Type operand literal
    pub fn literal_of_type(&self, value: ValueType) -> Arc<Literal> {
        self.intern(Literal::Type {
            value,
            ty: self.type_literal_type.clone(),
        })
    }

    /// Literal referring to the program object `name`
    pub fn literal_of_program_object(&self, name: &str, value_type: ValueType) -> Arc<Literal> {
        let symbol_type = self.types.pointer_to(&value_type);
        self.intern(Literal::ProgramObject(Arc::new(ProgramObject {
            name: name.to_string(),
            value_type,
            symbol_type,
        })))
    }

    /// All-zero value of `ty`
    pub fn zero_initializer_of(&self, ty: ValueType) -> Arc<Literal> {
        self.intern(Literal::ZeroInitializer(ty))
    }

    /// Null value of a reference or pointer type
    pub fn null_of(&self, ty: ValueType) -> Arc<Literal> {
        self.intern(Literal::Null(ty))
    }

    /// Number of distinct literals interned so far
    pub fn count(&self) -> usize {
        self.cache.len()
    }
}
