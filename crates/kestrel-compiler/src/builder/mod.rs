//! The builder pipeline
//!
//! A [`BasicBlockBuilder`] is the surface through which one compilation unit
//! is emitted. The chain ends in a [`GraphBuilder`], which allocates nodes;
//! every stage in front of it is a [`BuilderPass`] wrapped in a
//! [`Delegating`] adapter. A pass overrides the hooks it cares about and
//! everything else falls through to the next stage untouched.
//!
//! Passes only ever see the stages after them. A rewrite that needs to be
//! seen by the rest of the chain is emitted by calling into `next`.

mod graph_builder;

pub use graph_builder::GraphBuilder;

use std::sync::Arc;

use kestrel_types::{FunctionType, ObjectType, ValueType};

use crate::context::CompilationContext;
use crate::diagnostics::Location;
use crate::error::CompileResult;
use crate::graph::Graph;
use crate::node::{AsmFlags, BinaryOp, BlockLabel, CallTarget, CastKind, Node, UnpublishedCast, Value};

/// Outcome of an operation that may end the current block
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// The operation produced a value and the block continues
    Value(Value),
    /// The block was terminated; no value is available
    Terminated(BlockLabel),
}

impl Flow {
    /// The produced value, unless the block was terminated
    pub fn value(self) -> Option<Value> {
        match self {
            Flow::Value(v) => Some(v),
            Flow::Terminated(_) => None,
        }
    }

    /// Whether the block was terminated
    pub fn is_terminated(&self) -> bool {
        matches!(self, Flow::Terminated(_))
    }
}

/// Emits the graph of one compilation unit
///
/// Builders are used by a single thread; they are neither `Send` nor `Sync`
/// by contract.
pub trait BasicBlockBuilder {
    /// Shared compilation state
    fn context(&self) -> &Arc<CompilationContext>;
    /// Location of the operation being emitted
    fn location(&self) -> Location;
    /// Set the source position attached to subsequently emitted nodes
    fn set_line(&mut self, line: u32, bci: i32);
    /// Type of a value emitted by this chain
    fn value_type(&self, value: &Value) -> CompileResult<ValueType>;
    /// Published node behind `value`; `None` for literals
    fn node(&self, value: &Value) -> Option<Node>;

    /// Allocate a new, empty block
    fn create_block(&mut self) -> CompileResult<BlockLabel>;
    /// Make `block` the emission target
    fn begin(&mut self, block: BlockLabel) -> CompileResult<()>;
    /// Block being emitted into, if any
    fn current_block(&self) -> Option<BlockLabel>;

    /// Incoming parameter `index`
    fn parameter(&mut self, index: u32, ty: ValueType) -> CompileResult<Value>;
    /// Publish a cast assembled as an [`UnpublishedCast`]
    fn publish_cast(&mut self, cast: UnpublishedCast) -> CompileResult<Value>;
    /// Runtime type id of a reference; fatal for any other type
    fn type_id_of(&mut self, instance: Value) -> CompileResult<Value>;
    /// Class object for a type id or type literal
    fn class_of(&mut self, type_id: Value) -> CompileResult<Value>;
    /// Arithmetic, bitwise or comparison operation
    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> CompileResult<Value>;
    /// Read through a pointer
    fn load(&mut self, address: Value) -> CompileResult<Value>;
    /// Address of an array element
    fn element_of(&mut self, array: Value, index: Value) -> CompileResult<Value>;
    /// Allocate an array of `size` elements
    fn new_array(&mut self, array_type: Arc<ObjectType>, size: Value) -> CompileResult<Value>;
    /// Next variadic argument of type `ty`
    fn va_arg(&mut self, va_list: Value, ty: ValueType) -> CompileResult<Value>;
    /// Acquire the monitor of `object`
    fn monitor_enter(&mut self, object: Value) -> CompileResult<Flow>;
    /// Release the monitor of `object`
    fn monitor_exit(&mut self, object: Value) -> CompileResult<Flow>;

    /// Create a callable inline assembly target; emits nothing by itself
    fn asm(&mut self, instruction: &str, constraints: &str, flags: AsmFlags, ty: Arc<FunctionType>) -> CallTarget;
    /// Call with side effects
    fn call(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow>;
    /// Call that may be shared with an identical one
    fn call_no_side_effects(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow>;

    /// Call that never returns; ends the current block
    fn call_no_return(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<BlockLabel>;
    /// Jump to `target`; ends the current block
    fn goto(&mut self, target: BlockLabel) -> CompileResult<BlockLabel>;
    /// Branch on `condition`; ends the current block
    fn if_(&mut self, condition: Value, then_block: BlockLabel, else_block: BlockLabel) -> CompileResult<BlockLabel>;
    /// Return from the unit; ends the current block
    fn return_value(&mut self, value: Option<Value>) -> CompileResult<BlockLabel>;
    /// Mark the rest of the block unreachable; ends it
    fn unreachable(&mut self) -> CompileResult<BlockLabel>;

    /// Consume the chain and hand back the finished graph
    fn finish(self: Box<Self>) -> CompileResult<Graph>;

    /// Narrow an integer
    fn truncate(&mut self, value: Value, ty: ValueType) -> CompileResult<Value> {
        self.publish_cast(UnpublishedCast::new(CastKind::Truncate, value, ty))
    }

    /// Widen an unsigned integer
    fn zero_extend(&mut self, value: Value, ty: ValueType) -> CompileResult<Value> {
        self.publish_cast(UnpublishedCast::new(CastKind::ZeroExtend, value, ty))
    }

    /// Widen a signed integer
    fn sign_extend(&mut self, value: Value, ty: ValueType) -> CompileResult<Value> {
        self.publish_cast(UnpublishedCast::new(CastKind::SignExtend, value, ty))
    }

    /// Reinterpret the bits as `ty`
    fn bitcast(&mut self, value: Value, ty: ValueType) -> CompileResult<Value> {
        self.publish_cast(UnpublishedCast::new(CastKind::Bitcast, value, ty))
    }
}

/// One stage of the pipeline
///
/// Every hook receives the next stage and forwards to it unless
/// overridden.
#[allow(unused_variables)]
pub trait BuilderPass {
    /// See [`BasicBlockBuilder::parameter`]
    fn parameter(&mut self, next: &mut dyn BasicBlockBuilder, index: u32, ty: ValueType) -> CompileResult<Value> {
        next.parameter(index, ty)
    }

    /// See [`BasicBlockBuilder::publish_cast`]
    fn publish_cast(&mut self, next: &mut dyn BasicBlockBuilder, cast: UnpublishedCast) -> CompileResult<Value> {
        next.publish_cast(cast)
    }

    /// See [`BasicBlockBuilder::type_id_of`]
    fn type_id_of(&mut self, next: &mut dyn BasicBlockBuilder, instance: Value) -> CompileResult<Value> {
        next.type_id_of(instance)
    }

    /// See [`BasicBlockBuilder::class_of`]
    fn class_of(&mut self, next: &mut dyn BasicBlockBuilder, type_id: Value) -> CompileResult<Value> {
        next.class_of(type_id)
    }

    /// See [`BasicBlockBuilder::binary`]
    fn binary(&mut self, next: &mut dyn BasicBlockBuilder, op: BinaryOp, lhs: Value, rhs: Value) -> CompileResult<Value> {
        next.binary(op, lhs, rhs)
    }

    /// See [`BasicBlockBuilder::load`]
    fn load(&mut self, next: &mut dyn BasicBlockBuilder, address: Value) -> CompileResult<Value> {
        next.load(address)
    }

    /// See [`BasicBlockBuilder::element_of`]
    fn element_of(&mut self, next: &mut dyn BasicBlockBuilder, array: Value, index: Value) -> CompileResult<Value> {
        next.element_of(array, index)
    }

    /// See [`BasicBlockBuilder::new_array`]
    fn new_array(
        &mut self,
        next: &mut dyn BasicBlockBuilder,
        array_type: Arc<ObjectType>,
        size: Value,
    ) -> CompileResult<Value> {
        next.new_array(array_type, size)
    }

    /// See [`BasicBlockBuilder::va_arg`]
    fn va_arg(&mut self, next: &mut dyn BasicBlockBuilder, va_list: Value, ty: ValueType) -> CompileResult<Value> {
        next.va_arg(va_list, ty)
    }

    /// See [`BasicBlockBuilder::monitor_enter`]
    fn monitor_enter(&mut self, next: &mut dyn BasicBlockBuilder, object: Value) -> CompileResult<Flow> {
        next.monitor_enter(object)
    }

    /// See [`BasicBlockBuilder::monitor_exit`]
    fn monitor_exit(&mut self, next: &mut dyn BasicBlockBuilder, object: Value) -> CompileResult<Flow> {
        next.monitor_exit(object)
    }

    /// See [`BasicBlockBuilder::asm`]
    fn asm(
        &mut self,
        next: &mut dyn BasicBlockBuilder,
        instruction: &str,
        constraints: &str,
        flags: AsmFlags,
        ty: Arc<FunctionType>,
    ) -> CallTarget {
        next.asm(instruction, constraints, flags, ty)
    }

    /// See [`BasicBlockBuilder::call`]
    fn call(&mut self, next: &mut dyn BasicBlockBuilder, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow> {
        next.call(target, args)
    }

    /// See [`BasicBlockBuilder::call_no_side_effects`]
    fn call_no_side_effects(
        &mut self,
        next: &mut dyn BasicBlockBuilder,
        target: CallTarget,
        args: Vec<Value>,
    ) -> CompileResult<Flow> {
        next.call_no_side_effects(target, args)
    }

    /// See [`BasicBlockBuilder::call_no_return`]
    fn call_no_return(
        &mut self,
        next: &mut dyn BasicBlockBuilder,
        target: CallTarget,
        args: Vec<Value>,
    ) -> CompileResult<BlockLabel> {
        next.call_no_return(target, args)
    }

    /// See [`BasicBlockBuilder::goto`]
    fn goto(&mut self, next: &mut dyn BasicBlockBuilder, target: BlockLabel) -> CompileResult<BlockLabel> {
        next.goto(target)
    }

    /// See [`BasicBlockBuilder::if_`]
    fn if_(
        &mut self,
        next: &mut dyn BasicBlockBuilder,
        condition: Value,
        then_block: BlockLabel,
        else_block: BlockLabel,
    ) -> CompileResult<BlockLabel> {
        next.if_(condition, then_block, else_block)
    }

    /// See [`BasicBlockBuilder::return_value`]
    fn return_value(&mut self, next: &mut dyn BasicBlockBuilder, value: Option<Value>) -> CompileResult<BlockLabel> {
        next.return_value(value)
    }

    /// See [`BasicBlockBuilder::unreachable`]
    fn unreachable(&mut self, next: &mut dyn BasicBlockBuilder) -> CompileResult<BlockLabel> {
        next.unreachable()
    }
}

/// Adapts a [`BuilderPass`] into a chain stage in front of `next`
pub struct Delegating<P> {
    pass: P,
    next: Box<dyn BasicBlockBuilder>,
}

impl<P: BuilderPass> Delegating<P> {
    /// Put `pass` in front of `next`
    pub fn new(pass: P, next: Box<dyn BasicBlockBuilder>) -> Self {
        Delegating { pass, next }
    }

    /// The wrapped pass
    pub fn pass(&self) -> &P {
        &self.pass
    }
}

impl<P: BuilderPass> BasicBlockBuilder for Delegating<P> {
    fn context(&self) -> &Arc<CompilationContext> {
        self.next.context()
    }

    fn location(&self) -> Location {
        self.next.location()
    }

    fn set_line(&mut self, line: u32, bci: i32) {
        self.next.set_line(line, bci)
    }

    fn value_type(&self, value: &Value) -> CompileResult<ValueType> {
        self.next.value_type(value)
    }

    fn node(&self, value: &Value) -> Option<Node> {
        self.next.node(value)
    }

    fn create_block(&mut self) -> CompileResult<BlockLabel> {
        self.next.create_block()
    }

    fn begin(&mut self, block: BlockLabel) -> CompileResult<()> {
        self.next.begin(block)
    }

    fn current_block(&self) -> Option<BlockLabel> {
        self.next.current_block()
    }

    fn parameter(&mut self, index: u32, ty: ValueType) -> CompileResult<Value> {
        self.pass.parameter(self.next.as_mut(), index, ty)
    }

    fn publish_cast(&mut self, cast: UnpublishedCast) -> CompileResult<Value> {
        self.pass.publish_cast(self.next.as_mut(), cast)
    }

    fn type_id_of(&mut self, instance: Value) -> CompileResult<Value> {
        self.pass.type_id_of(self.next.as_mut(), instance)
    }

    fn class_of(&mut self, type_id: Value) -> CompileResult<Value> {
        self.pass.class_of(self.next.as_mut(), type_id)
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> CompileResult<Value> {
        self.pass.binary(self.next.as_mut(), op, lhs, rhs)
    }

    fn load(&mut self, address: Value) -> CompileResult<Value> {
        self.pass.load(self.next.as_mut(), address)
    }

    fn element_of(&mut self, array: Value, index: Value) -> CompileResult<Value> {
        self.pass.element_of(self.next.as_mut(), array, index)
    }

    fn new_array(&mut self, array_type: Arc<ObjectType>, size: Value) -> CompileResult<Value> {
        self.pass.new_array(self.next.as_mut(), array_type, size)
    }

    fn va_arg(&mut self, va_list: Value, ty: ValueType) -> CompileResult<Value> {
        self.pass.va_arg(self.next.as_mut(), va_list, ty)
    }

    fn monitor_enter(&mut self, object: Value) -> CompileResult<Flow> {
        self.pass.monitor_enter(self.next.as_mut(), object)
    }

    fn monitor_exit(&mut self, object: Value) -> CompileResult<Flow> {
        self.pass.monitor_exit(self.next.as_mut(), object)
    }

    fn asm(&mut self, instruction: &str, constraints: &str, flags: AsmFlags, ty: Arc<FunctionType>) -> CallTarget {
        self.pass.asm(self.next.as_mut(), instruction, constraints, flags, ty)
    }

    fn call(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow> {
        self.pass.call(self.next.as_mut(), target, args)
    }

    fn call_no_side_effects(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow> {
        self.pass.call_no_side_effects(self.next.as_mut(), target, args)
    }

    fn call_no_return(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<BlockLabel> {
        self.pass.call_no_return(self.next.as_mut(), target, args)
    }

    fn goto(&mut self, target: BlockLabel) -> CompileResult<BlockLabel> {
        self.pass.goto(self.next.as_mut(), target)
    }

    fn if_(&mut self, condition: Value, then_block: BlockLabel, else_block: BlockLabel) -> CompileResult<BlockLabel> {
        self.pass.if_(self.next.as_mut(), condition, then_block, else_block)
    }

    fn return_value(&mut self, value: Option<Value>) -> CompileResult<BlockLabel> {
        self.pass.return_value(self.next.as_mut(), value)
    }

    fn unreachable(&mut self) -> CompileResult<BlockLabel> {
        self.pass.unreachable(self.next.as_mut())
    }

    fn finish(self: Box<Self>) -> CompileResult<Graph> {
        self.next.finish()
    }
}

type StageFactory =
    Box<dyn Fn(&Arc<CompilationContext>, Box<dyn BasicBlockBuilder>) -> Box<dyn BasicBlockBuilder> + Send + Sync>;

/// Ordered list of passes instantiated for each compilation unit
///
/// The first pass added is the outermost stage and sees every operation
/// first.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<StageFactory>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass, created fresh for every unit by `make`
    pub fn add_pass<P, F>(mut self, make: F) -> Self
    where
        P: BuilderPass + 'static,
        F: Fn(&Arc<CompilationContext>) -> P + Send + Sync + 'static,
    {
        self.stages.push(Box::new(move |ctx: &Arc<CompilationContext>, next: Box<dyn BasicBlockBuilder>| {
            Box::new(Delegating::new(make(ctx), next)) as Box<dyn BasicBlockBuilder>
        }));
        self
    }

    /// Number of passes
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Assemble a fresh chain for one compilation unit
    pub fn builder(&self, ctx: &Arc<CompilationContext>, location: Location) -> Box<dyn BasicBlockBuilder> {
        let mut chain: Box<dyn BasicBlockBuilder> = Box::new(GraphBuilder::new(Arc::clone(ctx), location));
        for stage in self.stages.iter().rev() {
            chain = stage(ctx, chain);
        }
        chain
    }
}
