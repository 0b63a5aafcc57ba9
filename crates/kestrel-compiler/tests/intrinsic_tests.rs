//! Intrinsic lowering tests
//!
//! Drives the `asm` and stdarg intrinsics through the standard pipeline,
//! including malformed call sites that must report a diagnostic and keep
//! building.

use std::sync::Arc;

use kestrel_compiler::plugins::intrinsics::asm::{
    asm_descriptor, ASM_FLAG_NO_RETURN, ASM_FLAG_SIDE_EFFECT, ASM_FLAG_UNWIND, ASM_OWNER,
};
use kestrel_compiler::plugins::intrinsics::stdarg::{STDARG_OWNER, VA_COPY, VA_LIST, VA_START};
use kestrel_compiler::plugins::standard_pipeline;
use kestrel_compiler::{
    AsmFlags, BasicBlockBuilder, BasicElement, CallTarget, CompilationContext, CompilerConfig, Flow, Location,
    MethodElement, Modifiers, NodeKind, Terminator, Value,
};
use kestrel_types::{BaseTypeDescriptor, MethodDescriptor, PrimitiveType, TypeDescriptor, ValueType};

fn context() -> Arc<CompilationContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(CompilationContext::new(CompilerConfig::default()).unwrap())
}

fn static_method(ctx: &CompilationContext, owner: &str, name: &str, descriptor: MethodDescriptor) -> CallTarget {
    let object = ctx.core().object.reference_value_type();
    CallTarget::Method(Arc::new(MethodElement::new(
        BasicElement::new(owner, Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::NATIVE),
        name,
        descriptor,
        ctx.types().function_type(object, vec![]),
    )))
}

fn builder(ctx: &Arc<CompilationContext>) -> Box<dyn BasicBlockBuilder> {
    standard_pipeline().builder(ctx, Location::in_element("demo/Native.run()V"))
}

/// Emit `asm(int.class, "...", "...", flags, new Object[] { p0 })`
fn emit_asm(b: &mut dyn BasicBlockBuilder, ctx: &CompilationContext, flags: i64) -> Flow {
    let lf = ctx.literals();
    let class = b
        .class_of(Value::Literal(lf.literal_of_type(PrimitiveType::S32.into())))
        .unwrap();
    let array_type = ctx.core().object.array_class_type();
    let array = b.new_array(array_type, Value::Literal(lf.literal_of_i32(1))).unwrap();
    let args = vec![
        class,
        Value::Literal(lf.literal_of_str("rdtsc")),
        Value::Literal(lf.literal_of_str("={eax},r")),
        Value::Literal(lf.literal_of_i32(flags as i32)),
        array,
    ];
    let asm = static_method(ctx, ASM_OWNER, "asm", asm_descriptor());
    b.call(asm, args).unwrap()
}

fn va_list_descriptor(extra: Vec<TypeDescriptor>, ret: TypeDescriptor) -> MethodDescriptor {
    let mut params = vec![TypeDescriptor::class(VA_LIST)];
    params.extend(extra);
    MethodDescriptor::new(params, ret)
}

// ============================================================================
// Inline assembly
// ============================================================================

mod asm {
    use super::*;

    #[test]
    fn test_side_effect_and_unwind() {
        let ctx = context();
        let mut b = builder(&ctx);
        let flow = emit_asm(b.as_mut(), &ctx, ASM_FLAG_SIDE_EFFECT | ASM_FLAG_UNWIND);
        let result = flow.value().unwrap();
        assert_eq!(b.value_type(&result).unwrap(), ValueType::from(PrimitiveType::S32));
        b.return_value(None).unwrap();
        let graph = b.finish().unwrap();

        let node = graph.node_of(&result).unwrap();
        let NodeKind::Call { target: CallTarget::Asm(handle), side_effects } = node.kind() else {
            panic!("expected asm call, got {}", node.kind());
        };
        assert!(*side_effects);
        assert_eq!(handle.flags, AsmFlags::SIDE_EFFECT | AsmFlags::UNWIND);
        assert!(!handle.flags.contains(AsmFlags::NO_THROW));
        assert_eq!(handle.instruction, "rdtsc");
        assert_eq!(handle.constraints, "={eax},r");
        assert_eq!(handle.ty.params.len(), 1);
        assert_eq!(node.dependency_count(), 1);
        assert_eq!(ctx.diagnostics().error_count(), 0);
    }

    #[test]
    fn test_pure_asm_has_no_side_effects() {
        let ctx = context();
        let mut b = builder(&ctx);
        let result = emit_asm(b.as_mut(), &ctx, 0).value().unwrap();
        let graph = b.finish().unwrap();
        assert!(matches!(
            graph.node_of(&result).unwrap().kind(),
            NodeKind::Call { side_effects: false, .. }
        ));
    }

    #[test]
    fn test_no_return_terminates_block() {
        let ctx = context();
        let mut b = builder(&ctx);
        let flow = emit_asm(b.as_mut(), &ctx, ASM_FLAG_NO_RETURN);
        let Flow::Terminated(label) = flow else {
            panic!("expected termination");
        };
        assert_eq!(b.current_block(), None);
        let graph = b.finish().unwrap();
        let block = graph.block(label).unwrap();
        assert!(matches!(
            block.terminator(),
            Some(Terminator::CallNoReturn { target: CallTarget::Asm(_), .. })
        ));
    }

    #[test]
    fn test_computed_type_argument_reports_and_continues() {
        let ctx = context();
        let mut b = builder(&ctx);
        let lf = ctx.literals();
        let class = b.parameter(0, ctx.core().class.reference_value_type()).unwrap();
        let array = b
            .new_array(ctx.core().object.array_class_type(), Value::Literal(lf.literal_of_i32(0)))
            .unwrap();
        let args = vec![
            class,
            Value::Literal(lf.literal_of_str("nop")),
            Value::Literal(lf.literal_of_str("")),
            Value::Literal(lf.literal_of_i32(0)),
            array,
        ];
        let flow = b.call(static_method(&ctx, ASM_OWNER, "asm", asm_descriptor()), args).unwrap();

        let placeholder = flow.value().unwrap();
        let literal = placeholder.as_literal().unwrap();
        assert!(literal.is_zero());
        assert!(literal.ty().is_void());

        let errors = ctx.diagnostics().errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Type argument to `asm` must be a class literal or constant value"
        );
        assert_eq!(errors[0].location.element.as_deref(), Some("demo/Native.run()V"));

        // building goes on after the bad statement
        b.return_value(None).unwrap();
        assert!(b.finish().is_ok());
    }

    #[test]
    fn test_argument_array_must_be_immediate() {
        let ctx = context();
        let mut b = builder(&ctx);
        let lf = ctx.literals();
        let class = b
            .class_of(Value::Literal(lf.literal_of_type(PrimitiveType::S32.into())))
            .unwrap();
        let array = b.parameter(0, ctx.core().object.array_class_type().reference_value_type()).unwrap();
        let args = vec![
            class,
            Value::Literal(lf.literal_of_str("nop")),
            Value::Literal(lf.literal_of_str("")),
            Value::Literal(lf.literal_of_i32(0)),
            array,
        ];
        let _ = b.call(static_method(&ctx, ASM_OWNER, "asm", asm_descriptor()), args).unwrap();
        assert_eq!(
            ctx.diagnostics().errors()[0].message,
            "Arguments to `asm` must be an immediate new array creation"
        );
    }

    #[test]
    fn test_unregistered_descriptor_is_plain_call() {
        let ctx = context();
        let mut b = builder(&ctx);
        let target = static_method(&ctx, ASM_OWNER, "asm", MethodDescriptor::void());
        let result = b.call(target, vec![]).unwrap().value().unwrap();
        let graph = b.finish().unwrap();
        assert!(matches!(
            graph.node_of(&result).unwrap().kind(),
            NodeKind::Call { target: CallTarget::Method(_), .. }
        ));
    }
}

// ============================================================================
// Variadic arguments
// ============================================================================

mod stdarg {
    use super::*;

    fn void() -> TypeDescriptor {
        BaseTypeDescriptor::Void.into()
    }

    fn register_runtime(ctx: &CompilationContext, name: &str, arity: usize) {
        let address = ctx.types().pointer_to(&PrimitiveType::U8.into());
        let va_list_ptr = TypeDescriptor::class("kestrel/runtime/stdc/Stdarg$va_list_ptr");
        ctx.runtime_methods().register(Arc::new(MethodElement::new(
            BasicElement::new("kestrel/runtime/llvm/LLVM", Modifiers::STATIC),
            name,
            MethodDescriptor::new(vec![va_list_ptr; arity], void()),
            ctx.types().function_type(ValueType::VOID, vec![address; arity]),
        )));
    }

    fn register_va_start(ctx: &CompilationContext) {
        register_runtime(ctx, VA_START, 1);
    }

    /// A `va_list` loaded from a fresh address parameter
    fn loaded_va_list(b: &mut dyn BasicBlockBuilder, ctx: &CompilationContext, index: u32) -> (Value, Value) {
        let address = b
            .parameter(index, ctx.types().pointer_to(&PrimitiveType::U8.into()))
            .unwrap();
        let ap = b.load(address.clone()).unwrap();
        (address, ap)
    }

    fn va_copy_target(ctx: &CompilationContext) -> CallTarget {
        let descriptor = va_list_descriptor(vec![TypeDescriptor::class(VA_LIST)], void());
        static_method(ctx, STDARG_OWNER, "va_copy", descriptor)
    }

    #[test]
    fn test_va_start_calls_runtime_with_address() {
        let ctx = context();
        register_va_start(&ctx);
        let mut b = builder(&ctx);
        let address = b
            .parameter(0, ctx.types().pointer_to(&PrimitiveType::U8.into()))
            .unwrap();
        let ap = b.load(address.clone()).unwrap();
        let target = static_method(&ctx, STDARG_OWNER, "va_start", va_list_descriptor(vec![], void()));
        let result = b.call(target, vec![ap]).unwrap().value().unwrap();
        let graph = b.finish().unwrap();

        let node = graph.node_of(&result).unwrap();
        let NodeKind::Call { target, .. } = node.kind() else {
            panic!("expected call, got {}", node.kind());
        };
        assert_eq!(target.as_method().unwrap().name(), VA_START);
        assert_eq!(node.dependencies(), &[address][..]);
    }

    #[test]
    fn test_va_copy_calls_runtime_with_both_addresses() {
        let ctx = context();
        register_runtime(&ctx, VA_COPY, 2);
        let mut b = builder(&ctx);
        let (dest_address, dest) = loaded_va_list(b.as_mut(), &ctx, 0);
        let (src_address, src) = loaded_va_list(b.as_mut(), &ctx, 1);
        let result = b
            .call(va_copy_target(&ctx), vec![dest, src])
            .unwrap()
            .value()
            .unwrap();
        let graph = b.finish().unwrap();

        let node = graph.node_of(&result).unwrap();
        let NodeKind::Call { target, .. } = node.kind() else {
            panic!("expected call, got {}", node.kind());
        };
        assert_eq!(target.as_method().unwrap().name(), VA_COPY);
        assert_eq!(node.dependencies(), &[dest_address, src_address][..]);
        assert!(!ctx.diagnostics().has_errors());
    }

    #[test]
    fn test_va_copy_without_dest_address_reports() {
        let ctx = context();
        register_runtime(&ctx, VA_COPY, 2);
        let mut b = builder(&ctx);
        let dest = b.parameter(0, PrimitiveType::U64.into()).unwrap();
        let (_, src) = loaded_va_list(b.as_mut(), &ctx, 1);
        let flow = b.call(va_copy_target(&ctx), vec![dest, src]).unwrap();
        assert!(flow.value().unwrap().as_literal().unwrap().is_zero());
        let errors = ctx.diagnostics().errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid dest argument to va_copy: must have an address");
        let graph = b.finish().unwrap();
        assert!(!graph.nodes().iter().any(|n| matches!(n.kind(), NodeKind::Call { .. })));
    }

    #[test]
    fn test_va_copy_without_src_address_reports() {
        let ctx = context();
        register_runtime(&ctx, VA_COPY, 2);
        let mut b = builder(&ctx);
        let (_, dest) = loaded_va_list(b.as_mut(), &ctx, 0);
        let src = b.parameter(1, PrimitiveType::U64.into()).unwrap();
        let flow = b.call(va_copy_target(&ctx), vec![dest, src]).unwrap();
        assert!(flow.value().unwrap().as_literal().unwrap().is_zero());
        let errors = ctx.diagnostics().errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid src argument to va_copy: must have an address");
    }

    #[test]
    fn test_va_end_without_address_reports() {
        let ctx = context();
        let mut b = builder(&ctx);
        let ap = b.parameter(0, PrimitiveType::U64.into()).unwrap();
        let target = static_method(&ctx, STDARG_OWNER, "va_end", va_list_descriptor(vec![], void()));
        let flow = b.call(target, vec![ap]).unwrap();
        assert!(flow.value().unwrap().as_literal().unwrap().is_zero());
        assert_eq!(
            ctx.diagnostics().errors()[0].message,
            "Invalid ap argument to va_end: must have an address"
        );
    }

    #[test]
    fn test_va_arg_lowers_to_node() {
        let ctx = context();
        let mut b = builder(&ctx);
        let lf = ctx.literals();
        let address = b
            .parameter(0, ctx.types().pointer_to(&PrimitiveType::U8.into()))
            .unwrap();
        let ap = b.load(address.clone()).unwrap();
        let class = b
            .class_of(Value::Literal(lf.literal_of_type(PrimitiveType::F64.into())))
            .unwrap();
        let descriptor = va_list_descriptor(
            vec![TypeDescriptor::class("java/lang/Class")],
            TypeDescriptor::class("kestrel/runtime/CNative$object"),
        );
        let value = b
            .call(static_method(&ctx, STDARG_OWNER, "va_arg", descriptor), vec![ap, class])
            .unwrap()
            .value()
            .unwrap();
        assert_eq!(b.value_type(&value).unwrap(), ValueType::from(PrimitiveType::F64));
        let graph = b.finish().unwrap();
        assert_eq!(graph.node_of(&value).unwrap().kind(), &NodeKind::VaArg);
    }

    #[test]
    fn test_va_arg_with_computed_type_is_unreachable() {
        let ctx = context();
        let mut b = builder(&ctx);
        let address = b
            .parameter(0, ctx.types().pointer_to(&PrimitiveType::U8.into()))
            .unwrap();
        let ap = b.load(address).unwrap();
        let class = b.parameter(1, ctx.core().class.reference_value_type()).unwrap();
        let descriptor = va_list_descriptor(
            vec![TypeDescriptor::class("java/lang/Class")],
            TypeDescriptor::class("kestrel/runtime/CNative$object"),
        );
        let flow = b
            .call(static_method(&ctx, STDARG_OWNER, "va_arg", descriptor), vec![ap, class])
            .unwrap();
        let Flow::Terminated(label) = flow else {
            panic!("expected termination");
        };
        let graph = b.finish().unwrap();
        assert_eq!(graph.block(label).unwrap().terminator(), Some(&Terminator::Unreachable));
        assert_eq!(
            ctx.diagnostics().errors()[0].message,
            "Invalid type argument to va_arg (must be a class literal)"
        );
    }
}
