//! Type definition assembly
//!
//! The front-end registers a type's members as resolvers together with the
//! name and descriptor that identify them. Nothing is resolved until the
//! type is loaded, which lets stages in front of the base builder (such as
//! the patcher) drop or swap members by name and descriptor alone.

use std::fmt;
use std::sync::Arc;

use kestrel_types::{MethodDescriptor, TypeDescriptor};

use crate::element::{ConstructorElement, FieldElement, InitializerElement, MethodElement};
use crate::error::{CompileError, CompileResult};

/// Produces a field element on load
pub trait FieldResolver: Send + Sync {
    /// Build the field declared at `index` of `enclosing_type`
    fn resolve_field(&self, index: usize, enclosing_type: &str) -> CompileResult<FieldElement>;
}

/// Produces a method element on load
pub trait MethodResolver: Send + Sync {
    /// Build the method declared at `index` of `enclosing_type`
    fn resolve_method(&self, index: usize, enclosing_type: &str) -> CompileResult<MethodElement>;
}

/// Produces a constructor element on load
pub trait ConstructorResolver: Send + Sync {
    /// Build the constructor declared at `index` of `enclosing_type`
    fn resolve_constructor(&self, index: usize, enclosing_type: &str) -> CompileResult<ConstructorElement>;
}

/// Produces the initializer element on load
pub trait InitializerResolver: Send + Sync {
    /// Build the initializer of `enclosing_type`
    fn resolve_initializer(&self, index: usize, enclosing_type: &str) -> CompileResult<InitializerElement>;
}

impl<F> FieldResolver for F
where
    F: Fn(usize, &str) -> CompileResult<FieldElement> + Send + Sync,
{
    fn resolve_field(&self, index: usize, enclosing_type: &str) -> CompileResult<FieldElement> {
        self(index, enclosing_type)
    }
}

impl<F> MethodResolver for F
where
    F: Fn(usize, &str) -> CompileResult<MethodElement> + Send + Sync,
{
    fn resolve_method(&self, index: usize, enclosing_type: &str) -> CompileResult<MethodElement> {
        self(index, enclosing_type)
    }
}

impl<F> ConstructorResolver for F
where
    F: Fn(usize, &str) -> CompileResult<ConstructorElement> + Send + Sync,
{
    fn resolve_constructor(&self, index: usize, enclosing_type: &str) -> CompileResult<ConstructorElement> {
        self(index, enclosing_type)
    }
}

impl<F> InitializerResolver for F
where
    F: Fn(usize, &str) -> CompileResult<InitializerElement> + Send + Sync,
{
    fn resolve_initializer(&self, index: usize, enclosing_type: &str) -> CompileResult<InitializerElement> {
        self(index, enclosing_type)
    }
}

/// Assembles one type definition
pub trait TypeDefinitionBuilder {
    /// Set the internal name; always called before any member is added
    fn set_name(&mut self, internal_name: &str) -> CompileResult<()>;
    /// Register the class initializer
    fn set_initializer(&mut self, resolver: Arc<dyn InitializerResolver>, index: usize);
    /// Drop a registered class initializer
    fn remove_initializer(&mut self);
    /// Register a field
    fn add_field(&mut self, resolver: Arc<dyn FieldResolver>, index: usize, name: &str, descriptor: &TypeDescriptor);
    /// Register a constructor
    fn add_constructor(&mut self, resolver: Arc<dyn ConstructorResolver>, index: usize, descriptor: &MethodDescriptor);
    /// Register a method
    fn add_method(
        &mut self,
        resolver: Arc<dyn MethodResolver>,
        index: usize,
        name: &str,
        descriptor: &MethodDescriptor,
    );
    /// Finish the definition
    fn build(self: Box<Self>) -> CompileResult<DefinedType>;
}

#[derive(Clone)]
struct FieldSlot {
    resolver: Arc<dyn FieldResolver>,
    index: usize,
    name: String,
    descriptor: TypeDescriptor,
}

#[derive(Clone)]
struct MethodSlot {
    resolver: Arc<dyn MethodResolver>,
    index: usize,
    name: String,
    descriptor: MethodDescriptor,
}

#[derive(Clone)]
struct ConstructorSlot {
    resolver: Arc<dyn ConstructorResolver>,
    index: usize,
    descriptor: MethodDescriptor,
}

#[derive(Clone)]
struct InitializerSlot {
    resolver: Arc<dyn InitializerResolver>,
    index: usize,
}

/// Base builder that records members in registration order
#[derive(Default)]
pub struct BasicTypeDefinitionBuilder {
    name: Option<String>,
    fields: Vec<FieldSlot>,
    methods: Vec<MethodSlot>,
    constructors: Vec<ConstructorSlot>,
    initializer: Option<InitializerSlot>,
}

impl BasicTypeDefinitionBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }
}

impl TypeDefinitionBuilder for BasicTypeDefinitionBuilder {
    fn set_name(&mut self, internal_name: &str) -> CompileResult<()> {
        self.name = Some(internal_name.to_string());
        Ok(())
    }

    fn set_initializer(&mut self, resolver: Arc<dyn InitializerResolver>, index: usize) {
        self.initializer = Some(InitializerSlot { resolver, index });
    }

    fn remove_initializer(&mut self) {
        self.initializer = None;
    }

    fn add_field(&mut self, resolver: Arc<dyn FieldResolver>, index: usize, name: &str, descriptor: &TypeDescriptor) {
        self.fields.push(FieldSlot {
            resolver,
            index,
            name: name.to_string(),
            descriptor: descriptor.clone(),
        });
    }

    fn add_constructor(&mut self, resolver: Arc<dyn ConstructorResolver>, index: usize, descriptor: &MethodDescriptor) {
        self.constructors.push(ConstructorSlot {
            resolver,
            index,
            descriptor: descriptor.clone(),
        });
    }

    fn add_method(
        &mut self,
        resolver: Arc<dyn MethodResolver>,
        index: usize,
        name: &str,
        descriptor: &MethodDescriptor,
    ) {
        self.methods.push(MethodSlot {
            resolver,
            index,
            name: name.to_string(),
            descriptor: descriptor.clone(),
        });
    }

    fn build(self: Box<Self>) -> CompileResult<DefinedType> {
        let name = self.name.ok_or(CompileError::MissingTypeName)?;
        Ok(DefinedType {
            name,
            fields: self.fields,
            methods: self.methods,
            constructors: self.constructors,
            initializer: self.initializer,
        })
    }
}

/// A fully registered but not yet resolved type
#[derive(Clone)]
pub struct DefinedType {
    name: String,
    fields: Vec<FieldSlot>,
    methods: Vec<MethodSlot>,
    constructors: Vec<ConstructorSlot>,
    initializer: Option<InitializerSlot>,
}

impl DefinedType {
    /// Internal name of the type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered fields as (name, descriptor)
    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> + '_ {
        self.fields.iter().map(|f| (f.name.as_str(), &f.descriptor))
    }

    /// Registered methods as (name, descriptor)
    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodDescriptor)> + '_ {
        self.methods.iter().map(|m| (m.name.as_str(), &m.descriptor))
    }

    /// Registered constructor descriptors
    pub fn constructors(&self) -> impl Iterator<Item = &MethodDescriptor> + '_ {
        self.constructors.iter().map(|c| &c.descriptor)
    }

    /// Whether a class initializer is registered
    pub fn has_initializer(&self) -> bool {
        self.initializer.is_some()
    }

    /// Resolve every registered member
    pub fn load(&self) -> CompileResult<LoadedType> {
        log::debug!("loading type {}", self.name);
        let fields = self
            .fields
            .iter()
            .map(|f| f.resolver.resolve_field(f.index, &self.name).map(Arc::new))
            .collect::<CompileResult<Vec<_>>>()?;
        let methods = self
            .methods
            .iter()
            .map(|m| m.resolver.resolve_method(m.index, &self.name).map(Arc::new))
            .collect::<CompileResult<Vec<_>>>()?;
        let constructors = self
            .constructors
            .iter()
            .map(|c| c.resolver.resolve_constructor(c.index, &self.name).map(Arc::new))
            .collect::<CompileResult<Vec<_>>>()?;
        let initializer = match &self.initializer {
            Some(init) => Some(Arc::new(init.resolver.resolve_initializer(init.index, &self.name)?)),
            None => None,
        };
        Ok(LoadedType {
            name: self.name.clone(),
            fields,
            methods,
            constructors,
            initializer,
        })
    }
}

impl fmt::Debug for DefinedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinedType")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors.len())
            .field("initializer", &self.initializer.is_some())
            .finish()
    }
}

/// A type with all members resolved
#[derive(Debug)]
pub struct LoadedType {
    name: String,
    fields: Vec<Arc<FieldElement>>,
    methods: Vec<Arc<MethodElement>>,
    constructors: Vec<Arc<ConstructorElement>>,
    initializer: Option<Arc<InitializerElement>>,
}

impl LoadedType {
    /// Internal name of the type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved fields in registration order
    pub fn fields(&self) -> &[Arc<FieldElement>] {
        &self.fields
    }

    /// Resolved methods in registration order
    pub fn methods(&self) -> &[Arc<MethodElement>] {
        &self.methods
    }

    /// Resolved constructors in registration order
    pub fn constructors(&self) -> &[Arc<ConstructorElement>] {
        &self.constructors
    }

    /// Resolved class initializer
    pub fn initializer(&self) -> Option<&Arc<InitializerElement>> {
        self.initializer.as_ref()
    }

    /// Field named `name`
    pub fn field(&self, name: &str) -> Option<&Arc<FieldElement>> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Method with the given name and descriptor
    pub fn method(&self, name: &str, descriptor: &MethodDescriptor) -> Option<&Arc<MethodElement>> {
        self.methods.iter().find(|m| m.matches(name, descriptor))
    }

    /// Constructor with the given descriptor
    pub fn constructor(&self, descriptor: &MethodDescriptor) -> Option<&Arc<ConstructorElement>> {
        self.constructors.iter().find(|c| c.descriptor() == descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{BasicElement, Modifiers};
    use kestrel_types::{BaseTypeDescriptor, FunctionType, PrimitiveType, ValueType};

    fn int_field(name: &'static str) -> Arc<dyn FieldResolver> {
        Arc::new(move |index: usize, enclosing: &str| -> CompileResult<FieldElement> {
            Ok(FieldElement::new(
                BasicElement::new(enclosing, Modifiers::PRIVATE).with_index(index),
                name,
                BaseTypeDescriptor::Int.into(),
                PrimitiveType::S32.into(),
            ))
        })
    }

    fn void_method(name: &'static str) -> Arc<dyn MethodResolver> {
        Arc::new(move |index: usize, enclosing: &str| -> CompileResult<MethodElement> {
            Ok(MethodElement::new(
                BasicElement::new(enclosing, Modifiers::PUBLIC).with_index(index),
                name,
                MethodDescriptor::void(),
                Arc::new(FunctionType {
                    return_type: ValueType::VOID,
                    params: vec![],
                }),
            ))
        })
    }

    #[test]
    fn test_build_and_load() {
        let mut builder: Box<dyn TypeDefinitionBuilder> = Box::new(BasicTypeDefinitionBuilder::new());
        builder.set_name("demo/Counter").unwrap();
        builder.add_field(int_field("count"), 0, "count", &BaseTypeDescriptor::Int.into());
        builder.add_method(void_method("reset"), 0, "reset", &MethodDescriptor::void());
        builder.set_initializer(
            Arc::new(|index: usize, enclosing: &str| -> CompileResult<InitializerElement> {
                Ok(InitializerElement::new(BasicElement::new(enclosing, Modifiers::STATIC).with_index(index)))
            }),
            0,
        );
        let defined = builder.build().unwrap();
        assert_eq!(defined.name(), "demo/Counter");
        assert_eq!(defined.fields().count(), 1);
        assert!(defined.has_initializer());

        let loaded = defined.load().unwrap();
        let count = loaded.field("count").unwrap();
        assert_eq!(count.to_string(), "demo/Counter.count");
        assert!(loaded.method("reset", &MethodDescriptor::void()).is_some());
        assert_eq!(loaded.initializer().map(|i| i.to_string()).as_deref(), Some("demo/Counter.<clinit>"));
    }

    #[test]
    fn test_build_requires_name() {
        let builder: Box<dyn TypeDefinitionBuilder> = Box::new(BasicTypeDefinitionBuilder::new());
        assert!(matches!(builder.build(), Err(CompileError::MissingTypeName)));
    }

    #[test]
    fn test_resolver_errors_propagate() {
        let mut builder = Box::new(BasicTypeDefinitionBuilder::new());
        builder.set_name("demo/Broken").unwrap();
        builder.add_field(
            Arc::new(|_: usize, _: &str| -> CompileResult<FieldElement> {
                Err(CompileError::MissingRuntimeMethod { name: "x".to_string() })
            }),
            0,
            "broken",
            &BaseTypeDescriptor::Int.into(),
        );
        let defined = builder.build().unwrap();
        assert!(defined.load().is_err());
    }
}
