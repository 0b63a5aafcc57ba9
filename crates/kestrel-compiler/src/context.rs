//! Shared state of one compilation

use std::sync::Arc;

use kestrel_types::{ObjectType, TypeSystem, ValueType};

use crate::config::{CompilerConfig, Condition};
use crate::diagnostics::Diagnostics;
use crate::error::CompileResult;
use crate::literal::LiteralFactory;
use crate::node::Value;
use crate::plugins::intrinsics::Intrinsics;
use crate::plugins::patcher::PatchRegistry;
use crate::runtime::RuntimeMethods;

/// Object types every compilation needs
#[derive(Debug, Clone)]
pub struct CoreClasses {
    /// Root of the class hierarchy
    pub object: Arc<ObjectType>,
    /// Class objects produced by class literals
    pub class: Arc<ObjectType>,
    /// Type of string constants
    pub string: Arc<ObjectType>,
}

/// Everything shared between the threads compiling one program
///
/// All members are safe for concurrent use; wrap the context in an `Arc`
/// and hand a clone to each builder.
pub struct CompilationContext {
    config: CompilerConfig,
    types: Arc<TypeSystem>,
    literals: LiteralFactory,
    core: CoreClasses,
    runtime_methods: RuntimeMethods,
    diagnostics: Diagnostics,
    intrinsics: Intrinsics,
    patches: PatchRegistry,
}

impl CompilationContext {
    /// Create a context for a validated configuration
    pub fn new(config: CompilerConfig) -> CompileResult<Self> {
        config.validate()?;
        let types = Arc::new(TypeSystem::new(config.target.layout()));
        let object = types.class_type("java/lang/Object", None);
        let core = CoreClasses {
            class: types.class_type("java/lang/Class", Some(Arc::clone(&object))),
            string: types.class_type("java/lang/String", Some(Arc::clone(&object))),
            object,
        };
        let literals = LiteralFactory::new(
            Arc::clone(&types),
            core.string.reference_value_type(),
            ValueType::TypeId(core.object.type_id_type()),
        );
        Ok(CompilationContext {
            config,
            types,
            literals,
            core,
            runtime_methods: RuntimeMethods::new(),
            diagnostics: Diagnostics::new(),
            intrinsics: Intrinsics::with_standard(),
            patches: PatchRegistry::new(),
        })
    }

    /// Configuration the context was created from
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Canonical type caches
    pub fn types(&self) -> &Arc<TypeSystem> {
        &self.types
    }

    /// Literal interning factory
    pub fn literals(&self) -> &LiteralFactory {
        &self.literals
    }

    /// Core object types
    pub fn core(&self) -> &CoreClasses {
        &self.core
    }

    /// Runtime support methods
    pub fn runtime_methods(&self) -> &RuntimeMethods {
        &self.runtime_methods
    }

    /// Diagnostic sink
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Registered intrinsics
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Class patch records
    pub fn patches(&self) -> &PatchRegistry {
        &self.patches
    }

    /// Evaluate a patch condition against the configured build conditions
    pub fn evaluate(&self, condition: &Condition) -> bool {
        condition.evaluate(&self.config)
    }

    /// Neutral stand-in for a value that could not be built
    pub fn void_placeholder(&self) -> Value {
        Value::Literal(self.literals.zero_initializer_of(ValueType::VOID))
    }
}
