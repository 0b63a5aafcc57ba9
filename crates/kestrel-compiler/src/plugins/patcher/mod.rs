//! Class patching
//!
//! Patches delete, replace or inject members of a class before it loads.
//! Each patch carries a [`Condition`](crate::config::Condition) evaluated
//! against the build configuration when the member is registered, and may
//! add modifier flags to the element its resolver produces.

mod builder;
mod info;
mod registry;

pub use builder::PatchedTypeBuilder;
pub use info::{ClassPatchInfo, ConstructorPatch, FieldPatch, InitializerPatch, MethodPatch};
pub use registry::PatchRegistry;
