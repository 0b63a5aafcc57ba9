//! Patch records

use std::sync::Arc;

use kestrel_types::{MethodDescriptor, TypeDescriptor};
use rustc_hash::FxHashMap;

use crate::config::Condition;
use crate::definition::{ConstructorResolver, FieldResolver, InitializerResolver, MethodResolver};
use crate::element::Modifiers;
use crate::error::{CompileError, CompileResult};

/// Replacement or injected field
#[derive(Clone)]
pub struct FieldPatch {
    /// Element name
    pub name: String,
    /// Element descriptor
    pub descriptor: TypeDescriptor,
    /// Resolver that builds the replacement element
    pub resolver: Arc<dyn FieldResolver>,
    /// Index handed to the resolver
    pub index: usize,
    /// Build-time condition gating the patch
    pub condition: Condition,
    /// Flags added to the resolved element
    pub additional_modifiers: Modifiers,
}

impl FieldPatch {
    /// Unconditional patch for the field `name`
    pub fn new(
        name: impl Into<String>,
        descriptor: TypeDescriptor,
        resolver: Arc<dyn FieldResolver>,
        index: usize,
    ) -> Self {
        FieldPatch {
            name: name.into(),
            descriptor,
            resolver,
            index,
            condition: Condition::always(),
            additional_modifiers: Modifiers::empty(),
        }
    }

    /// Apply the patch only when `condition` holds
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Add `modifiers` to the resolved element
    pub fn with_additional_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.additional_modifiers = modifiers;
        self
    }
}

/// Replacement or injected method
#[derive(Clone)]
pub struct MethodPatch {
    /// Element name
    pub name: String,
    /// Element descriptor
    pub descriptor: MethodDescriptor,
    /// Resolver that builds the replacement element
    pub resolver: Arc<dyn MethodResolver>,
    /// Index handed to the resolver
    pub index: usize,
    /// Build-time condition gating the patch
    pub condition: Condition,
    /// Flags added to the resolved element
    pub additional_modifiers: Modifiers,
}

impl MethodPatch {
    /// Unconditional patch for the method `name`
    pub fn new(
        name: impl Into<String>,
        descriptor: MethodDescriptor,
        resolver: Arc<dyn MethodResolver>,
        index: usize,
    ) -> Self {
        MethodPatch {
            name: name.into(),
            descriptor,
            resolver,
            index,
            condition: Condition::always(),
            additional_modifiers: Modifiers::empty(),
        }
    }

    /// Apply the patch only when `condition` holds
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Add `modifiers` to the resolved element
    pub fn with_additional_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.additional_modifiers = modifiers;
        self
    }
}

/// Replacement or injected constructor
#[derive(Clone)]
pub struct ConstructorPatch {
    /// Element descriptor
    pub descriptor: MethodDescriptor,
    /// Resolver that builds the replacement element
    pub resolver: Arc<dyn ConstructorResolver>,
    /// Index handed to the resolver
    pub index: usize,
    /// Build-time condition gating the patch
    pub condition: Condition,
    /// Flags added to the resolved element
    pub additional_modifiers: Modifiers,
}

impl ConstructorPatch {
    /// Unconditional patch for the constructor
    pub fn new(descriptor: MethodDescriptor, resolver: Arc<dyn ConstructorResolver>, index: usize) -> Self {
        ConstructorPatch {
            descriptor,
            resolver,
            index,
            condition: Condition::always(),
            additional_modifiers: Modifiers::empty(),
        }
    }

    /// Apply the patch only when `condition` holds
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Add `modifiers` to the resolved element
    pub fn with_additional_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.additional_modifiers = modifiers;
        self
    }
}

/// Replacement initializer
#[derive(Clone)]
pub struct InitializerPatch {
    /// Resolver that builds the replacement element
    pub resolver: Arc<dyn InitializerResolver>,
    /// Index handed to the resolver
    pub index: usize,
    /// Build-time condition gating the patch
    pub condition: Condition,
}

impl InitializerPatch {
    /// Unconditional initializer patch
    pub fn new(resolver: Arc<dyn InitializerResolver>, index: usize) -> Self {
        InitializerPatch {
            resolver,
            index,
            condition: Condition::always(),
        }
    }

    /// Apply the patch only when `condition` holds
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }
}

/// All patches registered against one class
///
/// Once the class starts loading the record is committed and every further
/// registration fails with [`CompileError::PatchRecordFrozen`].
pub struct ClassPatchInfo {
    class: String,
    committed: bool,
    deleted_fields: FxHashMap<(String, TypeDescriptor), Condition>,
    replaced_fields: FxHashMap<(String, TypeDescriptor), FieldPatch>,
    injected_fields: Vec<FieldPatch>,
    deleted_constructors: FxHashMap<MethodDescriptor, Condition>,
    replaced_constructors: FxHashMap<MethodDescriptor, ConstructorPatch>,
    injected_constructors: Vec<ConstructorPatch>,
    deleted_methods: FxHashMap<(String, MethodDescriptor), Condition>,
    replaced_methods: FxHashMap<(String, MethodDescriptor), MethodPatch>,
    injected_methods: Vec<MethodPatch>,
    deleted_initializer: bool,
    replacement_initializer: Option<InitializerPatch>,
}

impl ClassPatchInfo {
    /// Empty record for `class`
    pub fn new(class: impl Into<String>) -> Self {
        ClassPatchInfo {
            class: class.into(),
            committed: false,
            deleted_fields: FxHashMap::default(),
            replaced_fields: FxHashMap::default(),
            injected_fields: Vec::new(),
            deleted_constructors: FxHashMap::default(),
            replaced_constructors: FxHashMap::default(),
            injected_constructors: Vec::new(),
            deleted_methods: FxHashMap::default(),
            replaced_methods: FxHashMap::default(),
            injected_methods: Vec::new(),
            deleted_initializer: false,
            replacement_initializer: None,
        }
    }

    /// Internal name of the patched class
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Freeze the record; idempotent
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Whether the record is frozen
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn check_open(&self) -> CompileResult<()> {
        if self.committed {
            return Err(CompileError::PatchRecordFrozen {
                class: self.class.clone(),
            });
        }
        Ok(())
    }

    /// Remove the field when `condition` holds
    pub fn delete_field(&mut self, name: &str, descriptor: &TypeDescriptor, condition: Condition) -> CompileResult<()> {
        self.check_open()?;
        self.deleted_fields
            .insert((name.to_string(), descriptor.clone()), condition);
        Ok(())
    }

    /// Replace the field with the same name and descriptor
    pub fn replace_field(&mut self, patch: FieldPatch) -> CompileResult<()> {
        self.check_open()?;
        self.replaced_fields
            .insert((patch.name.clone(), patch.descriptor.clone()), patch);
        Ok(())
    }

    /// Add a field
    pub fn inject_field(&mut self, patch: FieldPatch) -> CompileResult<()> {
        self.check_open()?;
        self.injected_fields.push(patch);
        Ok(())
    }

    /// Remove the constructor when `condition` holds
    pub fn delete_constructor(&mut self, descriptor: &MethodDescriptor, condition: Condition) -> CompileResult<()> {
        self.check_open()?;
        self.deleted_constructors.insert(descriptor.clone(), condition);
        Ok(())
    }

    /// Replace the constructor with the same descriptor
    pub fn replace_constructor(&mut self, patch: ConstructorPatch) -> CompileResult<()> {
        self.check_open()?;
        self.replaced_constructors
            .insert(patch.descriptor.clone(), patch);
        Ok(())
    }

    /// Add a constructor
    pub fn inject_constructor(&mut self, patch: ConstructorPatch) -> CompileResult<()> {
        self.check_open()?;
        self.injected_constructors.push(patch);
        Ok(())
    }

    /// Remove the method when `condition` holds
    pub fn delete_method(&mut self, name: &str, descriptor: &MethodDescriptor, condition: Condition) -> CompileResult<()> {
        self.check_open()?;
        self.deleted_methods
            .insert((name.to_string(), descriptor.clone()), condition);
        Ok(())
    }

    /// Replace the method with the same name and descriptor
    pub fn replace_method(&mut self, patch: MethodPatch) -> CompileResult<()> {
        self.check_open()?;
        self.replaced_methods
            .insert((patch.name.clone(), patch.descriptor.clone()), patch);
        Ok(())
    }

    /// Add a method
    pub fn inject_method(&mut self, patch: MethodPatch) -> CompileResult<()> {
        self.check_open()?;
        self.injected_methods.push(patch);
        Ok(())
    }

    /// Remove the class initializer
    pub fn delete_initializer(&mut self) -> CompileResult<()> {
        self.check_open()?;
        self.deleted_initializer = true;
        Ok(())
    }

    /// Replace the class initializer
    pub fn replace_initializer(&mut self, patch: InitializerPatch) -> CompileResult<()> {
        self.check_open()?;
        self.replacement_initializer = Some(patch);
        Ok(())
    }

    /// Condition under which the field is removed
    pub fn deleted_field(&self, name: &str, descriptor: &TypeDescriptor) -> Option<&Condition> {
        self.deleted_fields.get(&(name.to_string(), descriptor.clone()))
    }

    /// Replacement registered for the field
    pub fn replacement_field(&self, name: &str, descriptor: &TypeDescriptor) -> Option<&FieldPatch> {
        self.replaced_fields.get(&(name.to_string(), descriptor.clone()))
    }

    /// Injected fields in registration order
    pub fn injected_fields(&self) -> &[FieldPatch] {
        &self.injected_fields
    }

    /// Condition under which the constructor is removed
    pub fn deleted_constructor(&self, descriptor: &MethodDescriptor) -> Option<&Condition> {
        self.deleted_constructors.get(descriptor)
    }

    /// Replacement registered for the constructor
    pub fn replacement_constructor(&self, descriptor: &MethodDescriptor) -> Option<&ConstructorPatch> {
        self.replaced_constructors.get(descriptor)
    }

    /// Injected constructors in registration order
    pub fn injected_constructors(&self) -> &[ConstructorPatch] {
        &self.injected_constructors
    }

    /// Condition under which the method is removed
    pub fn deleted_method(&self, name: &str, descriptor: &MethodDescriptor) -> Option<&Condition> {
        self.deleted_methods.get(&(name.to_string(), descriptor.clone()))
    }

    /// Replacement registered for the method
    pub fn replacement_method(&self, name: &str, descriptor: &MethodDescriptor) -> Option<&MethodPatch> {
        self.replaced_methods.get(&(name.to_string(), descriptor.clone()))
    }

    /// Injected methods in registration order
    pub fn injected_methods(&self) -> &[MethodPatch] {
        &self.injected_methods
    }

    /// Whether the class initializer is removed
    pub fn is_initializer_deleted(&self) -> bool {
        self.deleted_initializer
    }

    /// Replacement class initializer
    pub fn replacement_initializer(&self) -> Option<&InitializerPatch> {
        self.replacement_initializer.as_ref()
    }
}
