//! Kestrel Type System
//!
//! Value types, compound layout, object types and class-file descriptors
//! shared by every stage of the Kestrel compiler.

#![warn(missing_docs)]

pub mod compound;
pub mod descriptor;
pub mod error;
pub mod layout;
pub mod object;
pub mod system;
pub mod ty;

pub use compound::{CompoundType, CompoundTypeBuilder, Member, Tag};
pub use descriptor::{BaseTypeDescriptor, ClassTypeDescriptor, MethodDescriptor, TypeDescriptor};
pub use error::TypeError;
pub use layout::{align_up, TargetLayout};
pub use object::{ObjectKind, ObjectType};
pub use system::TypeSystem;
pub use ty::{FunctionType, PointerType, PrimitiveType, ReferenceType, TypeIdType, ValueType};
