//! Lowers `monitorenter` / `monitorexit` to runtime calls

use crate::builder::{BasicBlockBuilder, BuilderPass, Flow};
use crate::error::CompileResult;
use crate::node::{CallTarget, Value};

/// Runtime method acquiring an object monitor
pub const MONITOR_ENTER: &str = "monitorEnter";
/// Runtime method releasing an object monitor
pub const MONITOR_EXIT: &str = "monitorExit";

/// Replaces monitor operations with calls to the runtime monitor methods
///
/// The call receives exactly the monitored object. Both runtime methods
/// are required; a missing one aborts the compilation.
#[derive(Debug, Default)]
pub struct ObjectMonitorLowering;

impl ObjectMonitorLowering {
    /// Create the pass
    pub fn new() -> Self {
        ObjectMonitorLowering
    }

    fn lower(next: &mut dyn BasicBlockBuilder, object: Value, function: &str) -> CompileResult<Flow> {
        let method = next.context().runtime_methods().get_method(function)?;
        log::debug!("lowering {} at {}", function, next.location());
        next.call(CallTarget::Method(method), vec![object])
    }
}

impl BuilderPass for ObjectMonitorLowering {
    fn monitor_enter(&mut self, next: &mut dyn BasicBlockBuilder, object: Value) -> CompileResult<Flow> {
        Self::lower(next, object, MONITOR_ENTER)
    }

    fn monitor_exit(&mut self, next: &mut dyn BasicBlockBuilder, object: Value) -> CompileResult<Flow> {
        Self::lower(next, object, MONITOR_EXIT)
    }
}
