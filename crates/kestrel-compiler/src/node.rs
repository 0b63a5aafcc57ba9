//! Graph nodes
//!
//! A node is a typed operation with ordered value dependencies. Nodes are
//! immutable once published into a [`Graph`](crate::graph::Graph); the only
//! mutable form is the [`UnpublishedCast`] handed around while a cast is
//! still being assembled.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use kestrel_types::{FunctionType, ValueType};

use crate::element::MethodElement;
use crate::error::{CompileError, CompileResult};
use crate::literal::Literal;

/// Index of a node in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Get the raw index
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Label of a basic block in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockLabel(pub(crate) u32);

impl BlockLabel {
    /// Get the raw index
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BlockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// An operand: either a published node or an interned literal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Result of a node
    Node(NodeId),
    /// Constant
    Literal(Arc<Literal>),
}

impl Value {
    /// The node behind this value, if any
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            Value::Literal(_) => None,
        }
    }

    /// The literal behind this value, if any
    pub fn as_literal(&self) -> Option<&Arc<Literal>> {
        match self {
            Value::Literal(lit) => Some(lit),
            Value::Node(_) => None,
        }
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Node(id)
    }
}

impl From<Arc<Literal>> for Value {
    fn from(lit: Arc<Literal>) -> Self {
        Value::Literal(lit)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Node(id) => write!(f, "{}", id),
            Value::Literal(lit) => write!(f, "{}", lit),
        }
    }
}

/// Word cast operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    /// Narrow an integer
    Truncate,
    /// Widen with zeros
    ZeroExtend,
    /// Widen with the sign bit
    SignExtend,
    /// Reinterpret the bits
    Bitcast,
}

impl fmt::Display for CastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CastKind::Truncate => "trunc",
            CastKind::ZeroExtend => "zext",
            CastKind::SignExtend => "sext",
            CastKind::Bitcast => "bitcast",
        })
    }
}

/// Two-operand arithmetic and bitwise operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise exclusive or
    Xor,
    /// Shift left
    Shl,
    /// Shift right
    Shr,
    /// Equality comparison
    CmpEq,
    /// Less-than comparison
    CmpLt,
}

impl BinaryOp {
    /// Whether the result is a boolean
    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::CmpEq | BinaryOp::CmpLt)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::CmpEq => "cmp.eq",
            BinaryOp::CmpLt => "cmp.lt",
        })
    }
}

bitflags! {
    /// Properties of an inline assembly fragment
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AsmFlags: u8 {
        /// Has side effects
        const SIDE_EFFECT = 1 << 0;
        /// Needs an aligned stack
        const ALIGN_STACK = 1 << 1;
        /// Intel syntax
        const INTEL_DIALECT = 1 << 2;
        /// May unwind
        const UNWIND = 1 << 3;
        /// Has side effects not visible in its operands
        const IMPLICIT_SIDE_EFFECT = 1 << 4;
        /// Never throws
        const NO_THROW = 1 << 5;
    }
}

/// A callable inline assembly fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsmHandle {
    /// Instruction text
    pub instruction: String,
    /// Operand constraint string
    pub constraints: String,
    /// Fragment properties
    pub flags: AsmFlags,
    /// Signature of a call to the fragment
    pub ty: Arc<FunctionType>,
}

impl fmt::Display for AsmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asm({:?}, {:?}, {:?})", self.instruction, self.constraints, self.flags)
    }
}

/// What a call invokes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// A resolved method
    Method(Arc<MethodElement>),
    /// Inline assembly
    Asm(Arc<AsmHandle>),
}

impl CallTarget {
    /// Signature of a call to this target
    pub fn function_type(&self) -> &Arc<FunctionType> {
        match self {
            CallTarget::Method(m) => m.function_type(),
            CallTarget::Asm(asm) => &asm.ty,
        }
    }

    /// The method, if this targets one
    pub fn as_method(&self) -> Option<&Arc<MethodElement>> {
        match self {
            CallTarget::Method(m) => Some(m),
            CallTarget::Asm(_) => None,
        }
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTarget::Method(m) => write!(f, "{}", m),
            CallTarget::Asm(asm) => write!(f, "{}", asm),
        }
    }
}

/// Operation performed by a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Incoming parameter
    Parameter {
        /// Zero-based parameter position
        index: u32,
    },
    /// Word cast; one dependency
    Cast(CastKind),
    /// Runtime type id of a reference; one dependency
    TypeIdOf,
    /// Class object for a type id or type literal; one dependency
    ClassOf,
    /// Arithmetic; two dependencies
    Binary(BinaryOp),
    /// Memory read through an address; one dependency
    Load,
    /// Address of an array element; array then index
    ElementOf,
    /// Array allocation; one dependency (the length)
    NewArray,
    /// Next variadic argument; one dependency (the `va_list` address)
    VaArg,
    /// Call; dependencies are the arguments
    Call {
        /// What is called
        target: CallTarget,
        /// Whether the call may have side effects
        side_effects: bool,
    },
    /// Unlowered monitor acquisition; one dependency
    MonitorEnter,
    /// Unlowered monitor release; one dependency
    MonitorExit,
}

impl NodeKind {
    /// Pure nodes may be shared between identical requests
    pub fn is_pure(&self) -> bool {
        match self {
            NodeKind::Parameter { .. }
            | NodeKind::Cast(_)
            | NodeKind::TypeIdOf
            | NodeKind::ClassOf
            | NodeKind::Binary(_)
            | NodeKind::ElementOf => true,
            NodeKind::Call { side_effects, .. } => !side_effects,
            NodeKind::Load
            | NodeKind::NewArray
            | NodeKind::VaArg
            | NodeKind::MonitorEnter
            | NodeKind::MonitorExit => false,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Parameter { index } => write!(f, "param {}", index),
            NodeKind::Cast(kind) => write!(f, "{}", kind),
            NodeKind::TypeIdOf => f.write_str("typeid.of"),
            NodeKind::ClassOf => f.write_str("class.of"),
            NodeKind::Binary(op) => write!(f, "{}", op),
            NodeKind::Load => f.write_str("load"),
            NodeKind::ElementOf => f.write_str("element.of"),
            NodeKind::NewArray => f.write_str("new.array"),
            NodeKind::VaArg => f.write_str("va.arg"),
            NodeKind::Call { target, side_effects: true } => write!(f, "call {}", target),
            NodeKind::Call { target, side_effects: false } => write!(f, "call.pure {}", target),
            NodeKind::MonitorEnter => f.write_str("monitor.enter"),
            NodeKind::MonitorExit => f.write_str("monitor.exit"),
        }
    }
}

/// A published node
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    deps: Vec<Value>,
    ty: ValueType,
    line: u32,
    bci: i32,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, deps: Vec<Value>, ty: ValueType, line: u32, bci: i32) -> Self {
        Node {
            kind,
            deps,
            ty,
            line,
            bci,
        }
    }

    /// Operation performed
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Type of the produced value
    pub fn ty(&self) -> &ValueType {
        &self.ty
    }

    /// Source line this node was created for
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Bytecode index this node was created for
    pub fn bci(&self) -> i32 {
        self.bci
    }

    /// Value dependencies in operand order
    pub fn dependencies(&self) -> &[Value] {
        &self.deps
    }

    /// Number of dependencies
    pub fn dependency_count(&self) -> usize {
        self.deps.len()
    }

    /// Dependency at `index`
    pub fn dependency(&self, index: usize) -> CompileResult<&Value> {
        self.deps
            .get(index)
            .ok_or_else(|| CompileError::DependencyOutOfBounds {
                node: self.kind.to_string(),
                index,
                count: self.deps.len(),
            })
    }

    /// Structural identity used for sharing; provenance is excluded
    pub(crate) fn key(&self) -> NodeKey {
        NodeKey {
            kind: self.kind.clone(),
            deps: self.deps.clone(),
            ty: self.ty.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey {
    kind: NodeKind,
    deps: Vec<Value>,
    ty: ValueType,
}

/// A cast that has not been published yet
///
/// Its input, target type and kind may change freely until it is handed to
/// [`BasicBlockBuilder::publish_cast`](crate::builder::BasicBlockBuilder::publish_cast).
#[derive(Debug, Clone)]
pub struct UnpublishedCast {
    kind: CastKind,
    input: Value,
    target: ValueType,
}

impl UnpublishedCast {
    /// Start assembling a cast
    pub fn new(kind: CastKind, input: Value, target: ValueType) -> Self {
        UnpublishedCast {
            kind,
            input,
            target,
        }
    }

    /// Cast operation
    pub fn kind(&self) -> CastKind {
        self.kind
    }

    /// Value being cast
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Type after the cast
    pub fn target_type(&self) -> &ValueType {
        &self.target
    }

    /// Change the cast operation
    pub fn set_kind(&mut self, kind: CastKind) {
        self.kind = kind;
    }

    /// Change the value being cast
    pub fn set_input(&mut self, input: Value) {
        self.input = input;
    }

    /// Change the type after the cast
    pub fn set_target_type(&mut self, target: ValueType) {
        self.target = target;
    }

    /// Casts have exactly one dependency: the input
    pub fn dependency(&self, index: usize) -> CompileResult<&Value> {
        match index {
            0 => Ok(&self.input),
            _ => Err(CompileError::DependencyOutOfBounds {
                node: self.kind.to_string(),
                index,
                count: 1,
            }),
        }
    }

    pub(crate) fn into_parts(self) -> (CastKind, Value, ValueType) {
        (self.kind, self.input, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::PrimitiveType;

    #[test]
    fn test_dependency_bounds() {
        let node = Node::new(
            NodeKind::Cast(CastKind::Truncate),
            vec![Value::Node(NodeId(0))],
            PrimitiveType::S8.into(),
            3,
            0,
        );
        assert_eq!(node.dependency(0).unwrap(), &Value::Node(NodeId(0)));
        let err = node.dependency(1).unwrap_err();
        assert!(matches!(
            err,
            CompileError::DependencyOutOfBounds { index: 1, count: 1, .. }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unpublished_cast_is_mutable() {
        let mut cast = UnpublishedCast::new(CastKind::Truncate, Value::Node(NodeId(1)), PrimitiveType::S8.into());
        cast.set_input(Value::Node(NodeId(2)));
        cast.set_target_type(PrimitiveType::S16.into());
        cast.set_kind(CastKind::SignExtend);
        assert_eq!(cast.input(), &Value::Node(NodeId(2)));
        assert_eq!(cast.target_type(), &ValueType::from(PrimitiveType::S16));
        assert_eq!(cast.kind(), CastKind::SignExtend);
        assert!(cast.dependency(1).is_err());
    }

    #[test]
    fn test_key_ignores_provenance() {
        let a = Node::new(NodeKind::TypeIdOf, vec![Value::Node(NodeId(0))], ValueType::VOID, 1, 0);
        let b = Node::new(NodeKind::TypeIdOf, vec![Value::Node(NodeId(0))], ValueType::VOID, 9, 4);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_purity() {
        assert!(NodeKind::Cast(CastKind::Bitcast).is_pure());
        assert!(!NodeKind::MonitorEnter.is_pure());
        assert!(!NodeKind::Load.is_pure());
    }
}
