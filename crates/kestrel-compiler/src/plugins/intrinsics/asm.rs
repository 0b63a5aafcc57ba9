//! Inline assembly intrinsic
//!
//! `asm(Class<T> returnType, String instruction, String operands, int flags, Object... args)`
//! becomes a call to an inline assembly target. Every argument must be
//! written as a constant at the call site: a class literal, two string
//! literals, an integer literal and an immediate array creation.

use std::sync::Arc;

use kestrel_types::{BaseTypeDescriptor, MethodDescriptor, TypeDescriptor, ValueType};

use super::{invalid_argument, Intrinsics};
use crate::builder::{BasicBlockBuilder, Flow};
use crate::element::MethodElement;
use crate::error::CompileResult;
use crate::node::{AsmFlags, NodeKind, Value};

/// Class declaring the `asm` method
pub const ASM_OWNER: &str = "kestrel/runtime/llvm/LLVM";

/// Untyped native value used by the intrinsic signatures
pub const NATIVE_OBJECT: &str = "kestrel/runtime/CNative$object";

/// The fragment has side effects
pub const ASM_FLAG_SIDE_EFFECT: i64 = 1 << 0;
/// The fragment needs an aligned stack
pub const ASM_FLAG_ALIGN_STACK: i64 = 1 << 1;
/// Intel syntax instead of AT&T
pub const ASM_FLAG_INTEL_DIALECT: i64 = 1 << 2;
/// The fragment may unwind
pub const ASM_FLAG_UNWIND: i64 = 1 << 3;
/// Side effects not visible in the operands
pub const ASM_FLAG_IMPLICIT_SIDE_EFFECT: i64 = 1 << 4;
/// Control never returns from the fragment
pub const ASM_FLAG_NO_RETURN: i64 = 1 << 5;

/// Result of decoding the `flags` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAsmFlags {
    /// Flags attached to the asm target
    pub flags: AsmFlags,
    /// The call must be treated as having side effects
    pub side_effects: bool,
    /// The fragment never returns and ends the block
    pub no_return: bool,
}

/// Decode the integer flag argument of `asm`
pub fn decode_asm_flags(bits: i64) -> DecodedAsmFlags {
    let mut flags = AsmFlags::NO_THROW;
    let mut side_effects = false;
    if bits & ASM_FLAG_SIDE_EFFECT != 0 {
        flags |= AsmFlags::SIDE_EFFECT;
        side_effects = true;
    }
    if bits & ASM_FLAG_IMPLICIT_SIDE_EFFECT != 0 {
        flags |= AsmFlags::IMPLICIT_SIDE_EFFECT;
        side_effects = true;
    }
    if bits & ASM_FLAG_ALIGN_STACK != 0 {
        flags |= AsmFlags::ALIGN_STACK;
    }
    if bits & ASM_FLAG_INTEL_DIALECT != 0 {
        flags |= AsmFlags::INTEL_DIALECT;
    }
    if bits & ASM_FLAG_UNWIND != 0 {
        flags |= AsmFlags::UNWIND;
        flags.remove(AsmFlags::NO_THROW);
        side_effects = true;
    }
    DecodedAsmFlags {
        flags,
        side_effects,
        no_return: bits & ASM_FLAG_NO_RETURN != 0,
    }
}

/// Descriptor of `asm`
pub fn asm_descriptor() -> MethodDescriptor {
    let string = TypeDescriptor::class("java/lang/String");
    let object = TypeDescriptor::class(NATIVE_OBJECT);
    MethodDescriptor::new(
        vec![
            TypeDescriptor::class("java/lang/Class"),
            string.clone(),
            string,
            BaseTypeDescriptor::Int.into(),
            TypeDescriptor::array_of(object.clone()),
        ],
        object,
    )
}

/// Install the `asm` intrinsic
pub fn register(intrinsics: &Intrinsics) {
    intrinsics.register_static(ASM_OWNER, "asm", asm_descriptor(), lower_asm);
}

/// Type operand of `ClassOf(TypeLiteral)`
pub(crate) fn class_literal_type(builder: &dyn BasicBlockBuilder, value: &Value) -> Option<ValueType> {
    let node = builder.node(value)?;
    if !matches!(node.kind(), NodeKind::ClassOf) {
        return None;
    }
    node.dependency(0).ok()?.as_literal()?.as_type().cloned()
}

fn string_literal(value: &Value) -> Option<String> {
    value.as_literal()?.as_str().map(str::to_string)
}

fn integer_literal(value: &Value) -> Option<i64> {
    value.as_literal()?.as_i64()
}

fn lower_asm(builder: &mut dyn BasicBlockBuilder, _: &Arc<MethodElement>, args: Vec<Value>) -> CompileResult<Flow> {
    let [return_type, instruction, operands, flags, array] = match <[Value; 5]>::try_from(args) {
        Ok(args) => args,
        Err(_) => return Ok(invalid_argument(builder, "Wrong number of arguments to `asm`")),
    };

    let Some(return_type) = class_literal_type(builder, &return_type) else {
        return Ok(invalid_argument(
            builder,
            "Type argument to `asm` must be a class literal or constant value",
        ));
    };
    let Some(instruction) = string_literal(&instruction) else {
        return Ok(invalid_argument(
            builder,
            "Instruction argument to `asm` must be a string literal or constant value",
        ));
    };
    let Some(operands) = string_literal(&operands) else {
        return Ok(invalid_argument(
            builder,
            "Operands argument to `asm` must be a string literal or constant value",
        ));
    };
    let Some(flags) = integer_literal(&flags) else {
        return Ok(invalid_argument(
            builder,
            "Flags argument to `asm` must be an integer literal or constant value",
        ));
    };

    let size = match builder.node(&array) {
        Some(node) if matches!(node.kind(), NodeKind::NewArray) => node.dependency(0).ok().and_then(integer_literal),
        _ => {
            return Ok(invalid_argument(
                builder,
                "Arguments to `asm` must be an immediate new array creation",
            ))
        }
    };
    let count = match size.and_then(|size| u32::try_from(size).ok()) {
        Some(count) => count,
        None => {
            return Ok(invalid_argument(
                builder,
                "Size of the argument array to `asm` must be an integer literal",
            ))
        }
    };

    let ctx = Arc::clone(builder.context());
    let mut values = Vec::with_capacity(count as usize);
    let mut params = Vec::with_capacity(count as usize);
    for i in 0..count {
        let index = Value::Literal(ctx.literals().literal_of_i32(i as i32));
        let address = builder.element_of(array.clone(), index)?;
        let value = builder.load(address)?;
        params.push(builder.value_type(&value)?);
        values.push(value);
    }
    let ty = ctx.types().function_type(return_type, params);

    let decoded = decode_asm_flags(flags);
    log::debug!("lowering asm {:?} with flags {:?}", instruction, decoded.flags);
    let target = builder.asm(&instruction, &operands, decoded.flags, ty);

    if decoded.no_return {
        return Ok(Flow::Terminated(builder.call_no_return(target, values)?));
    }
    if decoded.side_effects {
        builder.call(target, values)
    } else {
        builder.call_no_side_effects(target, values)
    }
}
