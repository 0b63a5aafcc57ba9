//! Compilation errors
//!
//! Only invariant violations become a [`CompileError`]. Bad user input is
//! reported through [`Diagnostics`](crate::diagnostics::Diagnostics) and
//! replaced with a placeholder, and blocks without a fall-through are
//! signalled with [`Flow::Terminated`](crate::builder::Flow::Terminated).

use kestrel_types::TypeError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result of a compiler operation
pub type CompileResult<T> = Result<T, CompileError>;

/// Invariant violations that abort compilation
#[derive(Debug, Error)]
pub enum CompileError {
    /// Failure in the type system
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A runtime support method was used before being registered
    #[error("Required runtime method '{name}' not found")]
    MissingRuntimeMethod {
        /// Method name
        name: String,
    },

    /// Type id requested for a non-reference value
    #[error("Cannot take the type id of non-reference type {ty}")]
    NotAReference {
        /// Offending type
        ty: String,
    },

    /// Pointer operation on a non-pointer value
    #[error("Expected a pointer but found {ty}")]
    NotAPointer {
        /// Offending type
        ty: String,
    },

    /// Array operation on a non-array value
    #[error("Expected an array reference but found {ty}")]
    NotAnArray {
        /// Offending type
        ty: String,
    },

    /// Node id from another graph
    #[error("Node {node} does not exist")]
    UnknownNode {
        /// Offending node id
        node: String,
    },

    /// Dependency index past the end of a node's operands
    #[error("Dependency index {index} out of bounds for {node} with {count} dependencies")]
    DependencyOutOfBounds {
        /// Node being inspected
        node: String,
        /// Requested index
        index: usize,
        /// Number of dependencies the node has
        count: usize,
    },

    /// A patch carrier class was loaded as an ordinary class
    #[error("Patch class {name} must not be loaded")]
    PatchClassLoaded {
        /// Carrier class name
        name: String,
    },

    /// Patch registered after the target class started loading
    #[error("Patch record for {class} is already committed")]
    PatchRecordFrozen {
        /// Target class name
        class: String,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Instruction emitted with no open block
    #[error("No block is being built")]
    NoCurrentBlock,

    /// Block label from another graph
    #[error("Block {block} does not exist")]
    UnknownBlock {
        /// Offending label
        block: String,
    },

    /// More nodes or blocks than a 32-bit index can address
    #[error("Graph has too many {what}")]
    GraphLimit {
        /// `"nodes"` or `"blocks"`
        what: &'static str,
    },

    /// Definition built without a name
    #[error("Type definition has no name")]
    MissingTypeName,
}

impl CompileError {
    /// Whether this error must abort the whole compilation
    pub fn is_fatal(&self) -> bool {
        match self {
            CompileError::Type(e) => e.is_fatal(),
            _ => true,
        }
    }
}
