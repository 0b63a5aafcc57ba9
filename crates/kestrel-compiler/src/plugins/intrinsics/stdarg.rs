//! Variadic argument intrinsics
//!
//! Like the C macros they model, `va_start`, `va_end`, `va_copy` and
//! `va_arg` take a `va_list` by value. The list must have been loaded from
//! memory so the lowering can recover its address.

use std::sync::Arc;

use kestrel_types::{BaseTypeDescriptor, MethodDescriptor, TypeDescriptor};

use super::asm::{class_literal_type, NATIVE_OBJECT};
use super::{invalid_argument, invalid_argument_unreachable, Intrinsics};
use crate::builder::{BasicBlockBuilder, Flow};
use crate::element::MethodElement;
use crate::error::CompileResult;
use crate::node::{CallTarget, NodeKind, Value};

/// Class declaring the stdarg methods
pub const STDARG_OWNER: &str = "kestrel/runtime/stdc/Stdarg";
/// The `va_list` type nested in [`STDARG_OWNER`]
pub const VA_LIST: &str = "kestrel/runtime/stdc/Stdarg$va_list";

/// Runtime method backing `va_start`
pub const VA_START: &str = "va_start";
/// Runtime method backing `va_end`
pub const VA_END: &str = "va_end";
/// Runtime method backing `va_copy`
pub const VA_COPY: &str = "va_copy";

/// Install the stdarg intrinsics
pub fn register(intrinsics: &Intrinsics) {
    let va_list = TypeDescriptor::class(VA_LIST);
    let void: TypeDescriptor = BaseTypeDescriptor::Void.into();
    let va_list_to_void = MethodDescriptor::new(vec![va_list.clone()], void.clone());
    let va_list_va_list_to_void = MethodDescriptor::new(vec![va_list.clone(), va_list.clone()], void);
    let va_list_class_to_object = MethodDescriptor::new(
        vec![va_list, TypeDescriptor::class("java/lang/Class")],
        TypeDescriptor::class(NATIVE_OBJECT),
    );

    intrinsics.register_static(STDARG_OWNER, "va_start", va_list_to_void.clone(), lower_va_start);
    intrinsics.register_static(STDARG_OWNER, "va_end", va_list_to_void, lower_va_end);
    intrinsics.register_static(STDARG_OWNER, "va_copy", va_list_va_list_to_void, lower_va_copy);
    intrinsics.register_static(STDARG_OWNER, "va_arg", va_list_class_to_object, lower_va_arg);
}

/// Address a `va_list` value was loaded from
fn va_list_address(builder: &dyn BasicBlockBuilder, value: Option<&Value>) -> Option<Value> {
    let node = builder.node(value?)?;
    if !matches!(node.kind(), NodeKind::Load) {
        return None;
    }
    node.dependency(0).ok().cloned()
}

fn call_runtime(builder: &mut dyn BasicBlockBuilder, name: &str, args: Vec<Value>) -> CompileResult<Flow> {
    let method = builder.context().runtime_methods().get_method(name)?;
    builder.call(CallTarget::Method(method), args)
}

fn lower_va_start(builder: &mut dyn BasicBlockBuilder, _: &Arc<MethodElement>, args: Vec<Value>) -> CompileResult<Flow> {
    match va_list_address(builder, args.first()) {
        Some(address) => call_runtime(builder, VA_START, vec![address]),
        None => Ok(invalid_argument(
            builder,
            "Invalid ap argument to va_start: must have an address",
        )),
    }
}

fn lower_va_end(builder: &mut dyn BasicBlockBuilder, _: &Arc<MethodElement>, args: Vec<Value>) -> CompileResult<Flow> {
    match va_list_address(builder, args.first()) {
        Some(address) => call_runtime(builder, VA_END, vec![address]),
        None => Ok(invalid_argument(builder, "Invalid ap argument to va_end: must have an address")),
    }
}

fn lower_va_copy(builder: &mut dyn BasicBlockBuilder, _: &Arc<MethodElement>, args: Vec<Value>) -> CompileResult<Flow> {
    let Some(dest) = va_list_address(builder, args.first()) else {
        return Ok(invalid_argument(
            builder,
            "Invalid dest argument to va_copy: must have an address",
        ));
    };
    let Some(src) = va_list_address(builder, args.get(1)) else {
        return Ok(invalid_argument(
            builder,
            "Invalid src argument to va_copy: must have an address",
        ));
    };
    call_runtime(builder, VA_COPY, vec![dest, src])
}

fn lower_va_arg(builder: &mut dyn BasicBlockBuilder, _: &Arc<MethodElement>, args: Vec<Value>) -> CompileResult<Flow> {
    let Some(address) = va_list_address(builder, args.first()) else {
        return invalid_argument_unreachable(builder, "Invalid ap argument to va_arg: must have an address");
    };
    let Some(ty) = args.get(1).and_then(|value| class_literal_type(&*builder, value)) else {
        return invalid_argument_unreachable(builder, "Invalid type argument to va_arg (must be a class literal)");
    };
    builder.va_arg(address, ty).map(Flow::Value)
}
