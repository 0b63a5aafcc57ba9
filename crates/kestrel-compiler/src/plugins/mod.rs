//! Pipeline plugins
//!
//! Each plugin is a [`BuilderPass`](crate::builder::BuilderPass) or a
//! [`TypeDefinitionBuilder`] stage. [`standard_pipeline`] and
//! [`type_builder`] assemble them in their usual order.

/// Intrinsic lowering
pub mod intrinsics;
/// Monitor lowering
pub mod object_monitor;
/// Class patching
pub mod patcher;

use std::sync::Arc;

use crate::builder::Pipeline;
use crate::context::CompilationContext;
use crate::definition::{BasicTypeDefinitionBuilder, TypeDefinitionBuilder};

use intrinsics::IntrinsicLowering;
use object_monitor::ObjectMonitorLowering;
use patcher::PatchedTypeBuilder;

/// Intrinsic lowering in front of object monitor lowering
pub fn standard_pipeline() -> Pipeline {
    Pipeline::new()
        .add_pass(|_| IntrinsicLowering::new())
        .add_pass(|_| ObjectMonitorLowering::new())
}

/// Type definition chain with patching in front of the base builder
pub fn type_builder(ctx: &Arc<CompilationContext>) -> Box<dyn TypeDefinitionBuilder> {
    Box::new(PatchedTypeBuilder::new(
        Arc::clone(ctx),
        Box::new(BasicTypeDefinitionBuilder::new()),
    ))
}
