//! The type system: canonical type caches shared by all compilation threads

use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::compound::{CompoundType, CompoundTypeBuilder, Tag};
use crate::layout::TargetLayout;
use crate::object::{ObjectKind, ObjectType};
use crate::ty::{FunctionType, PointerType, PrimitiveType, ValueType};

/// Factory and structural cache for value types
///
/// Every `get-or-create` call returns the canonical instance for its shape.
/// Concurrent first requests for the same shape race on the cache entry and
/// all of them observe whichever instance was installed first.
#[derive(Debug)]
pub struct TypeSystem {
    layout: TargetLayout,
    pointers: DashMap<Arc<PointerType>, ()>,
    functions: DashMap<Arc<FunctionType>, ()>,
    compounds: DashMap<Arc<CompoundType>, ()>,
    objects: DashMap<String, Arc<ObjectType>>,
    primitive_arrays: DashMap<PrimitiveType, Arc<ObjectType>>,
}

impl TypeSystem {
    /// Create a type system for the given target
    pub fn new(layout: TargetLayout) -> Self {
        TypeSystem {
            layout,
            pointers: DashMap::new(),
            functions: DashMap::new(),
            compounds: DashMap::new(),
            objects: DashMap::new(),
            primitive_arrays: DashMap::new(),
        }
    }

    /// Target layout this type system was created for
    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// The void type
    pub fn void_type(&self) -> ValueType {
        ValueType::VOID
    }

    /// A scalar type
    pub fn primitive(&self, p: PrimitiveType) -> ValueType {
        ValueType::Primitive(p)
    }

    /// Pointer to `pointee`
    pub fn pointer_to(&self, pointee: &ValueType) -> ValueType {
        ValueType::Pointer(canonical(
            &self.pointers,
            PointerType {
                pointee: pointee.clone(),
                size: self.layout.pointer_size,
                align: self.layout.pointer_align,
            },
        ))
    }

    /// Function type with the given signature
    pub fn function_type(&self, return_type: ValueType, params: Vec<ValueType>) -> Arc<FunctionType> {
        canonical(&self.functions, FunctionType { return_type, params })
    }

    /// Get or create the class named `name`
    ///
    /// Object types are nominal, so the first definition of a name wins and
    /// `super_class` is ignored on later calls.
    pub fn class_type(&self, name: &str, super_class: Option<Arc<ObjectType>>) -> Arc<ObjectType> {
        self.object_type(name, ObjectKind::Class, super_class)
    }

    /// Get or create the interface named `name`
    pub fn interface_type(&self, name: &str) -> Arc<ObjectType> {
        self.object_type(name, ObjectKind::Interface, None)
    }

    /// Look up a previously created class or interface
    pub fn find_object_type(&self, name: &str) -> Option<Arc<ObjectType>> {
        self.objects.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn object_type(
        &self,
        name: &str,
        kind: ObjectKind,
        super_class: Option<Arc<ObjectType>>,
    ) -> Arc<ObjectType> {
        if let Some(existing) = self.objects.get(name) {
            return Arc::clone(existing.value());
        }
        let layout = self.layout;
        let entry = self.objects.entry(name.to_string()).or_insert_with(|| {
            log::trace!("installed object type {}", name);
            Arc::new(ObjectType::new(name.to_string(), kind, super_class, layout))
        });
        Arc::clone(entry.value())
    }

    /// Array object type with scalar elements
    pub fn primitive_array_type(&self, element: PrimitiveType) -> Arc<ObjectType> {
        let layout = self.layout;
        let entry = self.primitive_arrays.entry(element).or_insert_with(|| {
            Arc::new(ObjectType::new(
                format!("{}[]", element),
                ObjectKind::PrimitiveArray(element),
                None,
                layout,
            ))
        });
        Arc::clone(entry.value())
    }

    /// Start laying out a new compound type
    pub fn compound_builder(&self) -> CompoundTypeBuilder<'_> {
        CompoundTypeBuilder::new(self)
    }

    /// A forward-declared compound type
    ///
    /// Incomplete types carry no layout and are never cached; each call
    /// returns a fresh instance.
    pub fn incomplete_compound(&self, tag: Tag, name: Option<&str>) -> Arc<CompoundType> {
        Arc::new(CompoundType::incomplete(
            tag,
            name.filter(|n| !n.is_empty()).map(str::to_string),
        ))
    }

    /// Number of distinct complete compound types created so far
    pub fn compound_count(&self) -> usize {
        self.compounds.len()
    }

    pub(crate) fn intern_compound(&self, compound: CompoundType) -> Arc<CompoundType> {
        canonical(&self.compounds, compound)
    }
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new(TargetLayout::default())
    }
}

fn canonical<T: Eq + Hash>(cache: &DashMap<Arc<T>, ()>, value: T) -> Arc<T> {
    match cache.entry(Arc::new(value)) {
        Entry::Occupied(entry) => Arc::clone(entry.key()),
        Entry::Vacant(entry) => {
            let installed = Arc::clone(entry.key());
            entry.insert(());
            log::trace!("installed canonical {}", std::any::type_name::<T>());
            installed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_types_are_canonical() {
        let types = TypeSystem::default();
        let a = types.pointer_to(&PrimitiveType::S32.into());
        let b = types.pointer_to(&PrimitiveType::S32.into());
        assert!(a.ptr_eq(&b));
        assert_eq!(a.size(), 8);
        assert_eq!(a.to_string(), "s32*");
        assert!(!a.ptr_eq(&types.pointer_to(&PrimitiveType::S64.into())));
    }

    #[test]
    fn test_function_types_are_canonical() {
        let types = TypeSystem::default();
        let a = types.function_type(ValueType::VOID, vec![PrimitiveType::S32.into()]);
        let b = types.function_type(ValueType::VOID, vec![PrimitiveType::S32.into()]);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_object_types_are_nominal() {
        let types = TypeSystem::default();
        let object = types.class_type("java/lang/Object", None);
        let again = types.class_type("java/lang/Object", None);
        assert!(Arc::ptr_eq(&object, &again));
        assert!(types.find_object_type("java/lang/Object").is_some());
        assert!(types.find_object_type("java/lang/Missing").is_none());
    }

    #[test]
    fn test_primitive_arrays() {
        let types = TypeSystem::default();
        let ints = types.primitive_array_type(PrimitiveType::S32);
        assert!(Arc::ptr_eq(&ints, &types.primitive_array_type(PrimitiveType::S32)));
        assert_eq!(ints.kind(), ObjectKind::PrimitiveArray(PrimitiveType::S32));
        assert_eq!(ints.name(), "s32[]");
    }

    #[test]
    fn test_incomplete_compounds_are_not_cached() {
        let types = TypeSystem::default();
        let a = types.incomplete_compound(Tag::Struct, Some("fwd"));
        let b = types.incomplete_compound(Tag::Struct, Some("fwd"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(types.compound_count(), 0);
    }
}
