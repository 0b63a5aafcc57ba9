//! Intrinsic lowering
//!
//! Calls to well-known static methods are replaced by primitive graph
//! operations. Intrinsics are registered against the exact owner class,
//! name and descriptor of the method they stand for.

/// The `asm` intrinsic
pub mod asm;
/// Variadic argument intrinsics
pub mod stdarg;

use std::sync::Arc;

use dashmap::DashMap;
use kestrel_types::MethodDescriptor;

use crate::builder::{BasicBlockBuilder, BuilderPass, Flow};
use crate::element::{Element, MethodElement};
use crate::error::CompileResult;
use crate::node::{CallTarget, Value};

/// Lowers a call to a static method
///
/// `builder` is the stage after the lowering pass; the intrinsic emits its
/// replacement there.
pub trait StaticIntrinsic: Send + Sync {
    /// Emit the replacement for a call with `args`
    fn lower(
        &self,
        builder: &mut dyn BasicBlockBuilder,
        target: &Arc<MethodElement>,
        args: Vec<Value>,
    ) -> CompileResult<Flow>;
}

impl<F> StaticIntrinsic for F
where
    F: Fn(&mut dyn BasicBlockBuilder, &Arc<MethodElement>, Vec<Value>) -> CompileResult<Flow> + Send + Sync,
{
    fn lower(
        &self,
        builder: &mut dyn BasicBlockBuilder,
        target: &Arc<MethodElement>,
        args: Vec<Value>,
    ) -> CompileResult<Flow> {
        self(builder, target, args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IntrinsicKey {
    owner: String,
    name: String,
    descriptor: MethodDescriptor,
}

/// Registered intrinsics
pub struct Intrinsics {
    statics: DashMap<IntrinsicKey, Arc<dyn StaticIntrinsic>>,
}

impl Intrinsics {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { statics: DashMap::new() }
    }

    /// Create a registry holding the inline assembly and stdarg intrinsics
    pub fn with_standard() -> Self {
        let intrinsics = Self::new();
        asm::register(&intrinsics);
        stdarg::register(&intrinsics);
        intrinsics
    }

    /// Register `intrinsic` for a static method; replaces any earlier one
    pub fn register_static(
        &self,
        owner: &str,
        name: &str,
        descriptor: MethodDescriptor,
        intrinsic: impl StaticIntrinsic + 'static,
    ) {
        log::debug!("registered intrinsic {}.{}{}", owner, name, descriptor);
        self.statics.insert(
            IntrinsicKey {
                owner: owner.to_string(),
                name: name.to_string(),
                descriptor,
            },
            Arc::new(intrinsic),
        );
    }

    /// Intrinsic registered for exactly this owner, name and descriptor
    pub fn find_static(&self, owner: &str, name: &str, descriptor: &MethodDescriptor) -> Option<Arc<dyn StaticIntrinsic>> {
        let key = IntrinsicKey {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.clone(),
        };
        self.statics.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Intrinsic standing in for `method`, if any
    pub fn find_for(&self, method: &MethodElement) -> Option<Arc<dyn StaticIntrinsic>> {
        if !method.is_static() {
            return None;
        }
        self.find_static(method.enclosing_type(), method.name(), method.descriptor())
    }

    /// Number of registered intrinsics
    pub fn count(&self) -> usize {
        self.statics.len()
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::new()
    }
}

/// Pass that replaces calls to registered intrinsics
#[derive(Debug, Default)]
pub struct IntrinsicLowering;

impl IntrinsicLowering {
    /// Create the pass
    pub fn new() -> Self {
        IntrinsicLowering
    }

    fn lookup(
        next: &dyn BasicBlockBuilder,
        target: &CallTarget,
    ) -> Option<(Arc<MethodElement>, Arc<dyn StaticIntrinsic>)> {
        let method = target.as_method()?;
        let intrinsic = next.context().intrinsics().find_for(method)?;
        Some((Arc::clone(method), intrinsic))
    }
}

impl BuilderPass for IntrinsicLowering {
    fn call(&mut self, next: &mut dyn BasicBlockBuilder, target: CallTarget, args: Vec<Value>) -> CompileResult<Flow> {
        match Self::lookup(next, &target) {
            Some((method, intrinsic)) => {
                log::debug!("lowering intrinsic call to {}", method);
                intrinsic.lower(next, &method, args)
            }
            None => next.call(target, args),
        }
    }

    fn call_no_side_effects(
        &mut self,
        next: &mut dyn BasicBlockBuilder,
        target: CallTarget,
        args: Vec<Value>,
    ) -> CompileResult<Flow> {
        match Self::lookup(next, &target) {
            Some((method, intrinsic)) => {
                log::debug!("lowering intrinsic call to {}", method);
                intrinsic.lower(next, &method, args)
            }
            None => next.call_no_side_effects(target, args),
        }
    }
}

/// Report a malformed intrinsic argument and hand back the void placeholder
pub(crate) fn invalid_argument(builder: &dyn BasicBlockBuilder, message: &str) -> Flow {
    let ctx = builder.context();
    ctx.diagnostics().error(&builder.location(), message);
    Flow::Value(ctx.void_placeholder())
}

/// Report a malformed intrinsic argument and end the block
pub(crate) fn invalid_argument_unreachable(
    builder: &mut dyn BasicBlockBuilder,
    message: &str,
) -> CompileResult<Flow> {
    let location = builder.location();
    builder.context().diagnostics().error(&location, message);
    Ok(Flow::Terminated(builder.unreachable()?))
}
