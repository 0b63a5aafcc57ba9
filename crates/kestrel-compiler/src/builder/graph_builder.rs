//! The innermost pipeline stage: allocates nodes into a [`Graph`]

use std::sync::Arc;

use kestrel_types::{FunctionType, ObjectKind, ObjectType, PrimitiveType, ValueType};

use super::{BasicBlockBuilder, Flow};
use crate::context::CompilationContext;
use crate::diagnostics::Location;
use crate::error::{CompileError, CompileResult};
use crate::graph::{Graph, Terminator};
use crate::node::{AsmFlags, AsmHandle, BinaryOp, BlockLabel, CallTarget, Node, NodeKind, UnpublishedCast, Value};

/// Base builder that owns the graph under construction
///
/// The entry block is created and begun on construction.
pub struct GraphBuilder {
    ctx: Arc<CompilationContext>,
    graph: Graph,
    current: Option<BlockLabel>,
    location: Location,
    line: u32,
    bci: i32,
}

impl GraphBuilder {
    /// Create a builder whose entry block is the current block
    pub fn new(ctx: Arc<CompilationContext>, location: Location) -> Self {
        let (graph, entry) = Graph::with_entry_block();
        GraphBuilder {
            ctx,
            graph,
            current: Some(entry),
            line: location.line,
            bci: location.bci,
            location,
        }
    }

    /// The graph built so far
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn emit(&mut self, kind: NodeKind, deps: Vec<Value>, ty: ValueType) -> CompileResult<Value> {
        let block = self.current.ok_or(CompileError::NoCurrentBlock)?;
        let id = self
            .graph
            .add_node(block, Node::new(kind, deps, ty, self.line, self.bci))?;
        Ok(Value::Node(id))
    }

    fn terminate(&mut self, terminator: Terminator) -> CompileResult<BlockLabel> {
        let block = self.current.take().ok_or(CompileError::NoCurrentBlock)?;
        self.graph.terminate(block, terminator)?;
        Ok(block)
    }

    fn emit_call(&mut self, target: CallTarget, args: Vec<Value>, side_effects: bool) -> CompileResult<Flow> {
        let ty = target.function_type().return_type.clone();
        let value = self.emit(NodeKind::Call { target, side_effects }, args, ty)?;
        Ok(Flow::Value(value))
    }

    fn element_pointer_type(&self, array: &ValueType) -> CompileResult<ValueType> {
        let not_an_array = || CompileError::NotAnArray { ty: array.to_string() };
        let reference = array.as_reference().ok_or_else(not_an_array)?;
        let upper_bound = &reference.upper_bound;
        let element = match upper_bound.kind() {
            ObjectKind::PrimitiveArray(p) => ValueType::Primitive(p),
            ObjectKind::ReferenceArray => upper_bound
                .element_type()
                .map(|e| e.reference_value_type())
                .ok_or_else(not_an_array)?,
            ObjectKind::Class | ObjectKind::Interface => return Err(not_an_array()),
        };
        Ok(self.ctx.types().pointer_to(&element))
    }
}

impl BasicBlockBuilder for GraphBuilder {
    fn context(&self) -> &Arc<CompilationContext> {
        &self.ctx
    }

    fn location(&self) -> Location {
        self.location.at(self.line, self.bci)
    }

    fn set_line(&mut self, line: u32, bci: i32) {
        self.line = line;
        self.bci = bci;
    }

    fn value_type(&self, value: &Value) -> CompileResult<ValueType> {
        self.graph
            .value_type(value)
            .ok_or_else(|| CompileError::UnknownNode {
                node: value.to_string(),
            })
    }

    fn node(&self, value: &Value) -> Option<Node> {
        self.graph.node_of(value).cloned()
    }

    fn create_block(&mut self) -> CompileResult<BlockLabel> {
        self.graph.new_block()
    }

    fn begin(&mut self, block: BlockLabel) -> CompileResult<()> {
        if self.graph.block(block).is_none() {
            return Err(CompileError::UnknownBlock {
                block: block.to_string(),
            });
        }
        self.current = Some(block);
        Ok(())
    }

    fn current_block(&self) -> Option<BlockLabel> {
        self.current
    }

    fn parameter(&mut self, index: u32, ty: ValueType) -> CompileResult<Value> {
        self.emit(NodeKind::Parameter { index }, Vec::new(), ty)
    }

    fn publish_cast(&mut self, cast: UnpublishedCast) -> CompileResult<Value> {
        let (kind, input, target) = cast.into_parts();
        self.emit(NodeKind::Cast(kind), vec![input], target)
    }

    fn type_id_of(&mut self, instance: Value) -> CompileResult<Value> {
        let ty = self.value_type(&instance)?;
        let Some(reference) = ty.as_reference() else {
            return Err(CompileError::NotAReference { ty: ty.to_string() });
        };
        let type_id = ValueType::TypeId(reference.upper_bound.type_id_type());
        self.emit(NodeKind::TypeIdOf, vec![instance], type_id)
    }

    fn class_of(&mut self, type_id: Value) -> CompileResult<Value> {
        let ty = self.ctx.core().class.reference_value_type();
        self.emit(NodeKind::ClassOf, vec![type_id], ty)
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> CompileResult<Value> {
        let ty = if op.is_comparison() {
            ValueType::Primitive(PrimitiveType::Boolean)
        } else {
            self.value_type(&lhs)?
        };
        self.emit(NodeKind::Binary(op), vec![lhs, rhs], ty)
    }

    fn load(&mut self, address: Value) -> CompileResult<Value> {
        let ty = self.value_type(&address)?;
        let Some(pointer) = ty.as_pointer() else {
            return Err(CompileError::NotAPointer { ty: ty.to_string() });
        };
        let pointee = pointer.pointee.clone();
        self.emit(NodeKind::Load, vec![address], pointee)
    }

    fn element_of(&mut self, array: Value, index: Value) -> CompileResult<Value> {
        let array_ty = self.value_type(&array)?;
        let ty = self.element_pointer_type(&array_ty)?;
        self.emit(NodeKind::ElementOf, vec![array, index], ty)
    }

    fn new_array(&mut self, array_type: Arc<ObjectType>, size: Value) -> CompileResult<Value> {
        let ty = array_type.reference_value_type();
        self.emit(NodeKind::NewArray, vec![size], ty)
    }

    fn va_arg(&mut self, va_list: Value, ty: ValueType) -> CompileResult<Value> {
        self.emit(NodeKind::VaArg, vec![va_list], ty)
    }

    fn monitor_enter(&mut self, object: Value) -> CompileResult<Flow> {
        self.emit(NodeKind::MonitorEnter, vec![object], ValueType::VOID)
            .map(Flow::Value)
    }

    fn monitor_exit(&mut self, object: Value) -> CompileResult<Flow> {
        self.emit(NodeKind::MonitorExit, vec![object], ValueType::VOID)
            .map(Flow::Value)
    }

    fn asm(&mut self, instruction: &str, constraints: &str, flags: AsmFlags, ty: Arc<FunctionType>) -> CallTarget {
        CallTarget::Asm(Arc::new(AsmHandle {
            instruction: instruction.to_string(),
            constraints: constraints.to_string(),
            flags,
            ty,
        }))
    }

    fn call(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow> {
        self.emit_call(target, args, true)
    }

    fn call_no_side_effects(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow> {
        self.emit_call(target, args, false)
    }

    fn call_no_return(&mut self, target: CallTarget, args: Vec<Value>) -> CompileResult<BlockLabel> {
        self.terminate(Terminator::CallNoReturn { target, args })
    }

    fn goto(&mut self, target: BlockLabel) -> CompileResult<BlockLabel> {
        self.terminate(Terminator::Goto(target))
    }

    fn if_(&mut self, condition: Value, then_block: BlockLabel, else_block: BlockLabel) -> CompileResult<BlockLabel> {
        self.terminate(Terminator::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn return_value(&mut self, value: Option<Value>) -> CompileResult<BlockLabel> {
        self.terminate(Terminator::Return(value))
    }

    fn unreachable(&mut self) -> CompileResult<BlockLabel> {
        self.terminate(Terminator::Unreachable)
    }

    fn finish(self: Box<Self>) -> CompileResult<Graph> {
        log::debug!(
            "finished graph for {} with {} nodes",
            self.location,
            self.graph.node_count()
        );
        Ok(self.graph)
    }
}
