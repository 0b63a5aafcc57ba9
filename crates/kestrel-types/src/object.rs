//! Object types and their lazily-derived companions
//!
//! Object types are nominal: two object types are equal when they have the
//! same kind and name. Each one owns three companion slots (its array class,
//! its reference type and its type-id type) which are filled on first use by
//! a lock-free compare-and-install. Racing first requests may each build a
//! candidate, but only the first one installed is ever returned.
//!
//! Companions hold strong references back to their owner, so an object type
//! with derived companions lives until the end of the compilation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::race::OnceBox;

use crate::layout::TargetLayout;
use crate::ty::{PrimitiveType, ReferenceType, TypeIdType, ValueType};

/// What an object type describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Instantiable or abstract class
    Class,
    /// Interface
    Interface,
    /// Array of references
    ReferenceArray,
    /// Array of scalars
    PrimitiveArray(PrimitiveType),
}

/// A class, interface or array type
pub struct ObjectType {
    name: String,
    kind: ObjectKind,
    super_class: Option<Arc<ObjectType>>,
    element: Option<Arc<ObjectType>>,
    layout: TargetLayout,
    array_class: OnceBox<Arc<ObjectType>>,
    reference: OnceBox<Arc<ReferenceType>>,
    type_id: OnceBox<Arc<TypeIdType>>,
}

impl ObjectType {
    pub(crate) fn new(
        name: String,
        kind: ObjectKind,
        super_class: Option<Arc<ObjectType>>,
        layout: TargetLayout,
    ) -> Self {
        ObjectType {
            name,
            kind,
            super_class,
            element: None,
            layout,
            array_class: OnceBox::new(),
            reference: OnceBox::new(),
            type_id: OnceBox::new(),
        }
    }

    /// Internal name, e.g. `java/lang/Object`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of this object type
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Direct superclass, if any
    pub fn super_class(&self) -> Option<&Arc<ObjectType>> {
        self.super_class.as_ref()
    }

    /// Element object type of a reference array
    pub fn element_type(&self) -> Option<&Arc<ObjectType>> {
        self.element.as_ref()
    }

    /// Check if this is an array type
    pub fn is_array(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::ReferenceArray | ObjectKind::PrimitiveArray(_)
        )
    }

    /// Check whether `self` is `other` or one of its subclasses
    pub fn is_subtype_of(&self, other: &ObjectType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == other {
                return true;
            }
            current = ty.super_class.as_deref();
        }
        false
    }

    /// The array class whose elements are references to this type
    pub fn array_class_type(self: &Arc<Self>) -> Arc<ObjectType> {
        Arc::clone(self.array_class.get_or_init(|| {
            log::trace!("deriving array class of {}", self.name);
            let mut array = ObjectType::new(
                format!("{}[]", self.name),
                ObjectKind::ReferenceArray,
                self.array_super_class(),
                self.layout,
            );
            array.element = Some(Arc::clone(self));
            Box::new(Arc::new(array))
        }))
    }

    /// The nullable reference type bounded by this type
    pub fn reference_type(self: &Arc<Self>) -> Arc<ReferenceType> {
        Arc::clone(self.reference.get_or_init(|| {
            Box::new(Arc::new(ReferenceType {
                upper_bound: Arc::clone(self),
                size: self.layout.reference_size,
                align: self.layout.reference_align,
            }))
        }))
    }

    /// The type-id type bounded by this type
    pub fn type_id_type(self: &Arc<Self>) -> Arc<TypeIdType> {
        Arc::clone(self.type_id.get_or_init(|| {
            Box::new(Arc::new(TypeIdType {
                upper_bound: Arc::clone(self),
                size: self.layout.type_id_size,
                align: self.layout.type_id_align,
            }))
        }))
    }

    /// [`ObjectType::reference_type`] as a [`ValueType`]
    pub fn reference_value_type(self: &Arc<Self>) -> ValueType {
        ValueType::Reference(self.reference_type())
    }

    fn array_super_class(self: &Arc<Self>) -> Option<Arc<ObjectType>> {
        // Arrays extend the root class of the element's hierarchy.
        let mut root = Arc::clone(self);
        while let Some(next) = root.super_class.clone() {
            root = next;
        }
        match root.kind {
            ObjectKind::Class => Some(root),
            _ => None,
        }
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name
    }
}

impl Eq for ObjectType {}

impl Hash for ObjectType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("super_class", &self.super_class.as_ref().map(|s| s.name()))
            .finish()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, super_class: Option<Arc<ObjectType>>) -> Arc<ObjectType> {
        Arc::new(ObjectType::new(
            name.to_string(),
            ObjectKind::Class,
            super_class,
            TargetLayout::default(),
        ))
    }

    #[test]
    fn test_companions_are_memoized() {
        let object = class("java/lang/Object", None);
        assert!(Arc::ptr_eq(&object.array_class_type(), &object.array_class_type()));
        assert!(Arc::ptr_eq(&object.reference_type(), &object.reference_type()));
        assert!(Arc::ptr_eq(&object.type_id_type(), &object.type_id_type()));
    }

    #[test]
    fn test_array_class_shape() {
        let object = class("java/lang/Object", None);
        let string = class("java/lang/String", Some(Arc::clone(&object)));
        let array = string.array_class_type();
        assert_eq!(array.name(), "java/lang/String[]");
        assert_eq!(array.kind(), ObjectKind::ReferenceArray);
        assert!(array.is_array());
        assert_eq!(array.element_type().map(|e| e.name()), Some("java/lang/String"));
        assert_eq!(array.super_class().map(|s| s.name()), Some("java/lang/Object"));
    }

    #[test]
    fn test_reference_uses_layout() {
        let object = class("java/lang/Object", None);
        let reference = object.reference_value_type();
        assert_eq!(reference.size(), 4);
        assert_eq!(reference.align(), 4);
        assert_eq!(reference.to_string(), "ref<java/lang/Object>");
    }

    #[test]
    fn test_subtyping_walks_superclasses() {
        let object = class("java/lang/Object", None);
        let number = class("java/lang/Number", Some(Arc::clone(&object)));
        let integer = class("java/lang/Integer", Some(Arc::clone(&number)));
        assert!(integer.is_subtype_of(&object));
        assert!(integer.is_subtype_of(&number));
        assert!(!object.is_subtype_of(&integer));
    }
}
