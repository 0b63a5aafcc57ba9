//! Type definition stage that applies patches

use std::sync::Arc;

use kestrel_types::{MethodDescriptor, TypeDescriptor};
use parking_lot::Mutex;

use super::info::ClassPatchInfo;
use crate::context::CompilationContext;
use crate::definition::{
    ConstructorResolver, DefinedType, FieldResolver, InitializerResolver, MethodResolver, TypeDefinitionBuilder,
};
use crate::element::{ConstructorElement, Element, FieldElement, MethodElement, Modifiers};
use crate::error::{CompileError, CompileResult};

/// Applies registered patches while forwarding to the next builder
pub struct PatchedTypeBuilder {
    ctx: Arc<CompilationContext>,
    next: Box<dyn TypeDefinitionBuilder>,
    name: Option<String>,
    info: Option<Arc<Mutex<ClassPatchInfo>>>,
}

impl PatchedTypeBuilder {
    /// Wrap `next`, applying the patches registered in `ctx`
    pub fn new(ctx: Arc<CompilationContext>, next: Box<dyn TypeDefinitionBuilder>) -> Self {
        Self {
            ctx,
            next,
            name: None,
            info: None,
        }
    }

    fn class_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

fn field_with_modifiers(resolver: Arc<dyn FieldResolver>, modifiers: Modifiers) -> Arc<dyn FieldResolver> {
    if modifiers.is_empty() {
        return resolver;
    }
    Arc::new(move |index: usize, enclosing: &str| -> CompileResult<FieldElement> {
        let field = resolver.resolve_field(index, enclosing)?;
        field.set_modifier_flags(modifiers);
        Ok(field)
    })
}

fn method_with_modifiers(resolver: Arc<dyn MethodResolver>, modifiers: Modifiers) -> Arc<dyn MethodResolver> {
    if modifiers.is_empty() {
        return resolver;
    }
    Arc::new(move |index: usize, enclosing: &str| -> CompileResult<MethodElement> {
        let method = resolver.resolve_method(index, enclosing)?;
        method.set_modifier_flags(modifiers);
        Ok(method)
    })
}

fn constructor_with_modifiers(
    resolver: Arc<dyn ConstructorResolver>,
    modifiers: Modifiers,
) -> Arc<dyn ConstructorResolver> {
    if modifiers.is_empty() {
        return resolver;
    }
    Arc::new(move |index: usize, enclosing: &str| -> CompileResult<ConstructorElement> {
        let constructor = resolver.resolve_constructor(index, enclosing)?;
        constructor.set_modifier_flags(modifiers);
        Ok(constructor)
    })
}

impl TypeDefinitionBuilder for PatchedTypeBuilder {
    fn set_name(&mut self, internal_name: &str) -> CompileResult<()> {
        if self.ctx.patches().is_patch_class(internal_name) {
            return Err(CompileError::PatchClassLoaded {
                name: internal_name.to_string(),
            });
        }
        // Commit even when nothing is registered yet so late patches fail loudly
        let record = self.ctx.patches().record(internal_name);
        record.lock().commit();
        log::debug!("committed patch record for {}", internal_name);
        self.name = Some(internal_name.to_string());
        self.info = Some(record);
        self.next.set_name(internal_name)
    }

    fn set_initializer(&mut self, resolver: Arc<dyn InitializerResolver>, index: usize) {
        let (deleted, replacement) = match &self.info {
            Some(info) => {
                let info = info.lock();
                (info.is_initializer_deleted(), info.replacement_initializer().cloned())
            }
            None => (false, None),
        };
        if deleted {
            log::debug!("deleted initializer of {}", self.class_name());
            self.next.remove_initializer();
            return;
        }
        match replacement {
            Some(patch) if self.ctx.evaluate(&patch.condition) => {
                log::debug!("replaced initializer of {}", self.class_name());
                self.next.set_initializer(patch.resolver, patch.index);
            }
            _ => self.next.set_initializer(resolver, index),
        }
    }

    fn remove_initializer(&mut self) {
        self.next.remove_initializer();
    }

    fn add_field(&mut self, resolver: Arc<dyn FieldResolver>, index: usize, name: &str, descriptor: &TypeDescriptor) {
        let replacement = match &self.info {
            Some(info) => {
                let info = info.lock();
                if let Some(condition) = info.deleted_field(name, descriptor) {
                    if self.ctx.evaluate(condition) {
                        log::debug!("deleted field {}.{}", info.class(), name);
                        return;
                    }
                }
                info.replacement_field(name, descriptor).cloned()
            }
            None => None,
        };
        match replacement {
            Some(patch) if self.ctx.evaluate(&patch.condition) => {
                log::debug!("replaced field {}.{}", self.class_name(), name);
                let resolver = field_with_modifiers(patch.resolver, patch.additional_modifiers);
                self.next.add_field(resolver, patch.index, name, descriptor);
            }
            _ => self.next.add_field(resolver, index, name, descriptor),
        }
    }

    fn add_constructor(&mut self, resolver: Arc<dyn ConstructorResolver>, index: usize, descriptor: &MethodDescriptor) {
        let replacement = match &self.info {
            Some(info) => {
                let info = info.lock();
                if let Some(condition) = info.deleted_constructor(descriptor) {
                    if self.ctx.evaluate(condition) {
                        log::debug!("deleted constructor {}.<init>{}", info.class(), descriptor);
                        return;
                    }
                }
                info.replacement_constructor(descriptor).cloned()
            }
            None => None,
        };
        match replacement {
            Some(patch) if self.ctx.evaluate(&patch.condition) => {
                log::debug!("replaced constructor {}.<init>{}", self.class_name(), descriptor);
                let resolver = constructor_with_modifiers(patch.resolver, patch.additional_modifiers);
                self.next.add_constructor(resolver, patch.index, descriptor);
            }
            _ => self.next.add_constructor(resolver, index, descriptor),
        }
    }

    fn add_method(
        &mut self,
        resolver: Arc<dyn MethodResolver>,
        index: usize,
        name: &str,
        descriptor: &MethodDescriptor,
    ) {
        let replacement = match &self.info {
            Some(info) => {
                let info = info.lock();
                if let Some(condition) = info.deleted_method(name, descriptor) {
                    if self.ctx.evaluate(condition) {
                        log::debug!("deleted method {}.{}{}", info.class(), name, descriptor);
                        return;
                    }
                }
                info.replacement_method(name, descriptor).cloned()
            }
            None => None,
        };
        match replacement {
            Some(patch) if self.ctx.evaluate(&patch.condition) => {
                log::debug!("replaced method {}.{}{}", self.class_name(), name, descriptor);
                let resolver = method_with_modifiers(patch.resolver, patch.additional_modifiers);
                self.next.add_method(resolver, patch.index, name, descriptor);
            }
            _ => self.next.add_method(resolver, index, name, descriptor),
        }
    }

    fn build(mut self: Box<Self>) -> CompileResult<DefinedType> {
        if let Some(info) = self.info.take() {
            let info = info.lock();
            for patch in info.injected_fields() {
                if self.ctx.evaluate(&patch.condition) {
                    log::debug!("injected field {}.{}", info.class(), patch.name);
                    let resolver = field_with_modifiers(Arc::clone(&patch.resolver), patch.additional_modifiers);
                    self.next.add_field(resolver, patch.index, &patch.name, &patch.descriptor);
                }
            }
            for patch in info.injected_constructors() {
                if self.ctx.evaluate(&patch.condition) {
                    log::debug!("injected constructor {}.<init>{}", info.class(), patch.descriptor);
                    let resolver =
                        constructor_with_modifiers(Arc::clone(&patch.resolver), patch.additional_modifiers);
                    self.next.add_constructor(resolver, patch.index, &patch.descriptor);
                }
            }
            for patch in info.injected_methods() {
                if self.ctx.evaluate(&patch.condition) {
                    log::debug!("injected method {}.{}{}", info.class(), patch.name, patch.descriptor);
                    let resolver = method_with_modifiers(Arc::clone(&patch.resolver), patch.additional_modifiers);
                    self.next.add_method(resolver, patch.index, &patch.name, &patch.descriptor);
                }
            }
        }
        self.next.build()
    }
}
