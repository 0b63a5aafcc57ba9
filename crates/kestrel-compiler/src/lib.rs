//! Kestrel Compiler Core
//!
//! The program graph, literal pool, program elements and the builder
//! pipeline that lowers bytecode-level operations into graph nodes.
//!
//! # Architecture
//!
//! ```text
//! CompilationContext (shared, thread-safe)
//!     ├── TypeSystem          canonical value types
//!     ├── LiteralFactory      literal values
//!     ├── RuntimeMethods      helper methods called by lowerings
//!     ├── Intrinsics          lowered static methods
//!     ├── PatchRegistry       per-class member patches
//!     └── Diagnostics         recoverable errors and warnings
//!
//! Pipeline (one chain per compilation unit)
//!     pass → pass → ... → GraphBuilder → Graph
//! ```

#![warn(missing_docs)]

/// Builder pipeline and the graph-allocating base stage
pub mod builder;
/// Compiler configuration
pub mod config;
/// Shared per-compilation state
pub mod context;
/// Type definition assembly
pub mod definition;
/// Diagnostic sink
pub mod diagnostics;
/// Program elements
pub mod element;
/// Compilation errors
pub mod error;
/// Program graph
pub mod graph;
/// Interned literals
pub mod literal;
/// Graph nodes and values
pub mod node;
/// Lowering and patching stages
pub mod plugins;
/// Runtime support method registry
pub mod runtime;

pub use builder::{BasicBlockBuilder, BuilderPass, Delegating, Flow, GraphBuilder, Pipeline};
pub use config::{CompilerConfig, Condition, ConfigError, TargetConfig};
pub use context::{CompilationContext, CoreClasses};
pub use definition::{BasicTypeDefinitionBuilder, DefinedType, LoadedType, TypeDefinitionBuilder};
pub use diagnostics::{Diagnostic, Diagnostics, Location, Severity};
pub use element::{
    BasicElement, ConstructorElement, Element, FieldElement, InitializerElement, MethodElement, Modifiers,
};
pub use error::{CompileError, CompileResult};
pub use graph::{Block, Graph, Terminator};
pub use literal::{Literal, LiteralFactory, ProgramObject};
pub use node::{AsmFlags, AsmHandle, BinaryOp, BlockLabel, CallTarget, CastKind, Node, NodeId, NodeKind, UnpublishedCast, Value};
pub use runtime::RuntimeMethods;
