//! Program elements: fields, methods, constructors and initializers
//!
//! Elements are shared between compilation threads. Their modifier word is
//! atomic because late passes (e.g. patching) add flags to elements other
//! threads may already be reading.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use kestrel_types::{FunctionType, MethodDescriptor, TypeDescriptor, ValueType};

use crate::literal::Literal;

bitflags! {
    /// Access flags plus compiler-internal bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        /// `public`
        const PUBLIC = 0x0001;
        /// `private`
        const PRIVATE = 0x0002;
        /// `protected`
        const PROTECTED = 0x0004;
        /// `static`
        const STATIC = 0x0008;
        /// `final`
        const FINAL = 0x0010;
        /// `synchronized`
        const SYNCHRONIZED = 0x0020;
        /// `volatile`
        const VOLATILE = 0x0040;
        /// `transient`
        const TRANSIENT = 0x0080;
        /// `native`
        const NATIVE = 0x0100;
        /// Interface type
        const INTERFACE = 0x0200;
        /// `abstract`
        const ABSTRACT = 0x0400;
        /// `strictfp`
        const STRICT = 0x0800;
        /// Compiler-generated
        const SYNTHETIC = 0x1000;
        /// Annotation type
        const ANNOTATION = 0x2000;
        /// Enum type or constant
        const ENUM = 0x4000;
        /// Final field that is written outside of its declaring initializer
        const NOT_REALLY_FINAL = 1 << 16;
        /// Static field with one instance per thread
        const THREAD_LOCAL = 1 << 17;
        /// Runtime support method that must not appear in stack traces
        const HIDDEN = 1 << 18;
    }
}

/// State common to every element
#[derive(Debug)]
pub struct BasicElement {
    enclosing_type: String,
    source_file: Option<String>,
    index: usize,
    modifiers: AtomicU32,
}

impl BasicElement {
    /// Create element state for a member of `enclosing_type`
    pub fn new(enclosing_type: impl Into<String>, modifiers: Modifiers) -> Self {
        BasicElement {
            enclosing_type: enclosing_type.into(),
            source_file: None,
            index: 0,
            modifiers: AtomicU32::new(modifiers.bits()),
        }
    }

    /// Set the source file name
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    /// Set the declaration index within the enclosing type
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// Common element accessors
pub trait Element {
    /// Shared element state
    fn basic(&self) -> &BasicElement;

    /// Internal name of the enclosing type
    fn enclosing_type(&self) -> &str {
        &self.basic().enclosing_type
    }

    /// Source file, if known
    fn source_file(&self) -> Option<&str> {
        self.basic().source_file.as_deref()
    }

    /// Declaration index within the enclosing type
    fn index(&self) -> usize {
        self.basic().index
    }

    /// Current modifiers
    fn modifiers(&self) -> Modifiers {
        Modifiers::from_bits_retain(self.basic().modifiers.load(Ordering::Acquire))
    }

    /// Check that every flag in `mask` is set
    fn has_all_modifiers_of(&self, mask: Modifiers) -> bool {
        self.modifiers().contains(mask)
    }

    /// Check that no flag in `mask` is set
    fn has_no_modifiers_of(&self, mask: Modifiers) -> bool {
        !self.modifiers().intersects(mask)
    }

    /// Atomically set flags
    fn set_modifier_flags(&self, flags: Modifiers) {
        self.basic().modifiers.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Atomically clear flags
    fn clear_modifier_flags(&self, flags: Modifiers) {
        self.basic().modifiers.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Check for the `static` modifier
    fn is_static(&self) -> bool {
        self.has_all_modifiers_of(Modifiers::STATIC)
    }
}

/// A field
#[derive(Debug)]
pub struct FieldElement {
    basic: BasicElement,
    name: String,
    descriptor: TypeDescriptor,
    ty: ValueType,
    initial_value: Option<Literal>,
}

impl FieldElement {
    /// Create a field
    pub fn new(basic: BasicElement, name: impl Into<String>, descriptor: TypeDescriptor, ty: ValueType) -> Self {
        FieldElement {
            basic,
            name: name.into(),
            descriptor,
            ty,
            initial_value: None,
        }
    }

    /// Set the compile-time constant value
    pub fn with_initial_value(mut self, value: Literal) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field descriptor
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Field value type
    pub fn ty(&self) -> &ValueType {
        &self.ty
    }

    /// Compile-time constant value, if any
    pub fn initial_value(&self) -> Option<&Literal> {
        self.initial_value.as_ref()
    }

    /// Whether accesses need volatile semantics
    ///
    /// A final field that is not really final (written after construction)
    /// is treated as volatile, as is a plain volatile field. Any other mix
    /// of the three flags is not.
    pub fn is_volatile(&self) -> bool {
        let masked = self.modifiers()
            & (Modifiers::VOLATILE | Modifiers::FINAL | Modifiers::NOT_REALLY_FINAL);
        masked == Modifiers::VOLATILE || masked == Modifiers::FINAL | Modifiers::NOT_REALLY_FINAL
    }

    /// Final and never written outside of its initializer
    pub fn is_really_final(&self) -> bool {
        self.modifiers() & (Modifiers::FINAL | Modifiers::NOT_REALLY_FINAL) == Modifiers::FINAL
    }

    /// Static field with one instance per thread
    pub fn is_thread_local(&self) -> bool {
        self.has_all_modifiers_of(Modifiers::THREAD_LOCAL)
    }
}

impl Element for FieldElement {
    fn basic(&self) -> &BasicElement {
        &self.basic
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.enclosing_type(), self.name)
    }
}

/// A method
#[derive(Debug)]
pub struct MethodElement {
    basic: BasicElement,
    name: String,
    descriptor: MethodDescriptor,
    ty: Arc<FunctionType>,
}

impl MethodElement {
    /// Create a method
    pub fn new(
        basic: BasicElement,
        name: impl Into<String>,
        descriptor: MethodDescriptor,
        ty: Arc<FunctionType>,
    ) -> Self {
        MethodElement {
            basic,
            name: name.into(),
            descriptor,
            ty,
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method descriptor
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Function type of a call to this method
    pub fn function_type(&self) -> &Arc<FunctionType> {
        &self.ty
    }

    /// Return type of a call
    pub fn return_type(&self) -> &ValueType {
        &self.ty.return_type
    }

    /// Check if this method's name and descriptor match
    pub fn matches(&self, name: &str, descriptor: &MethodDescriptor) -> bool {
        self.name == name && self.descriptor == *descriptor
    }
}

impl Element for MethodElement {
    fn basic(&self) -> &BasicElement {
        &self.basic
    }
}

impl PartialEq for MethodElement {
    fn eq(&self, other: &Self) -> bool {
        self.enclosing_type() == other.enclosing_type()
            && self.name == other.name
            && self.descriptor == other.descriptor
    }
}

impl Eq for MethodElement {}

impl Hash for MethodElement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.enclosing_type().hash(state);
        self.name.hash(state);
        self.descriptor.hash(state);
    }
}

impl fmt::Display for MethodElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.enclosing_type(), self.name, self.descriptor)
    }
}

/// A constructor
#[derive(Debug)]
pub struct ConstructorElement {
    basic: BasicElement,
    descriptor: MethodDescriptor,
}

impl ConstructorElement {
    /// Create a constructor
    pub fn new(basic: BasicElement, descriptor: MethodDescriptor) -> Self {
        ConstructorElement { basic, descriptor }
    }

    /// Constructor descriptor
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }
}

impl Element for ConstructorElement {
    fn basic(&self) -> &BasicElement {
        &self.basic
    }
}

impl fmt::Display for ConstructorElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.<init>{}", self.enclosing_type(), self.descriptor)
    }
}

/// A class initializer
#[derive(Debug)]
pub struct InitializerElement {
    basic: BasicElement,
}

impl InitializerElement {
    /// Create an initializer
    pub fn new(basic: BasicElement) -> Self {
        InitializerElement { basic }
    }
}

impl Element for InitializerElement {
    fn basic(&self) -> &BasicElement {
        &self.basic
    }
}

impl fmt::Display for InitializerElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.<clinit>", self.enclosing_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::{BaseTypeDescriptor, PrimitiveType};

    fn field(modifiers: Modifiers) -> FieldElement {
        FieldElement::new(
            BasicElement::new("demo/Holder", modifiers),
            "value",
            BaseTypeDescriptor::Int.into(),
            PrimitiveType::S32.into(),
        )
    }

    #[test]
    fn test_volatile_truth_table() {
        let v = Modifiers::VOLATILE;
        let f = Modifiers::FINAL;
        let n = Modifiers::NOT_REALLY_FINAL;
        let cases = [
            (Modifiers::empty(), false, false),
            (v, true, false),
            (f, false, true),
            (n, false, false),
            (v | f, false, true),
            (v | n, false, false),
            (f | n, true, false),
            (v | f | n, false, false),
        ];
        for (mods, volatile, really_final) in cases {
            let field = field(mods | Modifiers::PUBLIC);
            assert_eq!(field.is_volatile(), volatile, "is_volatile for {:?}", mods);
            assert_eq!(field.is_really_final(), really_final, "is_really_final for {:?}", mods);
        }
    }

    #[test]
    fn test_modifier_updates_are_visible() {
        let field = field(Modifiers::FINAL | Modifiers::STATIC);
        assert!(field.is_really_final());
        field.set_modifier_flags(Modifiers::NOT_REALLY_FINAL);
        assert!(!field.is_really_final());
        assert!(field.is_volatile());
        field.clear_modifier_flags(Modifiers::NOT_REALLY_FINAL | Modifiers::FINAL);
        assert!(field.has_no_modifiers_of(Modifiers::FINAL | Modifiers::NOT_REALLY_FINAL));
        assert!(field.is_static());
    }

    #[test]
    fn test_thread_local() {
        assert!(field(Modifiers::STATIC | Modifiers::THREAD_LOCAL).is_thread_local());
        assert!(!field(Modifiers::STATIC).is_thread_local());
    }

    #[test]
    fn test_method_identity() {
        let ty = Arc::new(FunctionType {
            return_type: ValueType::VOID,
            params: vec![],
        });
        let a = MethodElement::new(
            BasicElement::new("demo/A", Modifiers::PUBLIC),
            "run",
            MethodDescriptor::void(),
            Arc::clone(&ty),
        );
        let b = MethodElement::new(
            BasicElement::new("demo/A", Modifiers::STATIC).with_index(3),
            "run",
            MethodDescriptor::void(),
            Arc::clone(&ty),
        );
        let c = MethodElement::new(BasicElement::new("demo/B", Modifiers::PUBLIC), "run", MethodDescriptor::void(), ty);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "demo/A.run()V");
    }
}
