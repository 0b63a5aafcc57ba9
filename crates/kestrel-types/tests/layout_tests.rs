//! Compound layout and canonicalization tests
//!
//! Covers structural equality, layout determinism, member ordering and the
//! memoize-once behaviour of lazily-derived object companions.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use kestrel_types::{CompoundType, PrimitiveType, Tag, TargetLayout, TypeSystem, ValueType};

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn point(types: &TypeSystem, tag: Tag, name: &str) -> Arc<CompoundType> {
    types
        .compound_builder()
        .set_tag(tag)
        .set_name(name)
        .add_member("x", PrimitiveType::S32.into())
        .add_member("y", PrimitiveType::S32.into())
        .build()
        .unwrap()
}

// ============================================================================
// Structural equality
// ============================================================================

mod equality {
    use super::*;

    #[test]
    fn test_name_and_tag_do_not_affect_identity() {
        let types = TypeSystem::default();
        let a = point(&types, Tag::Struct, "point");
        let b = point(&types, Tag::Class, "vec2");
        assert_eq!(*a, *b);
        assert_eq!(hash_of(&*a), hash_of(&*b));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(types.compound_count(), 1);
    }

    #[test]
    fn test_member_names_do_affect_identity() {
        let types = TypeSystem::default();
        let a = point(&types, Tag::Struct, "point");
        let b = types
            .compound_builder()
            .set_name("point")
            .add_member("u", PrimitiveType::S32.into())
            .add_member("v", PrimitiveType::S32.into())
            .build()
            .unwrap();
        assert_ne!(*a, *b);
        assert_eq!(types.compound_count(), 2);
    }

    #[test]
    fn test_nested_compounds_share_instances() {
        let types = TypeSystem::default();
        let inner = point(&types, Tag::Struct, "point");
        let outer = |name: &str| {
            types
                .compound_builder()
                .set_name(name)
                .add_member("origin", ValueType::Compound(Arc::clone(&inner)))
                .add_member("scale", PrimitiveType::F64.into())
                .build()
                .unwrap()
        };
        let a = outer("frame");
        let b = outer("transform");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.member_by_name("scale").unwrap().offset(), 8);
        assert_eq!(a.size(), 16);
    }
}

// ============================================================================
// Layout determinism
// ============================================================================

mod determinism {
    use super::*;

    fn build(types: &TypeSystem) -> Arc<CompoundType> {
        let ptr = types.pointer_to(&PrimitiveType::U8.into());
        types
            .compound_builder()
            .set_tag(Tag::Struct)
            .set_name("record")
            .add_member("flag", PrimitiveType::Boolean.into())
            .add_member("data", ptr)
            .add_member_aligned("len", PrimitiveType::U16.into(), 4)
            .add_member("tail", PrimitiveType::U8.into())
            .build()
            .unwrap()
    }

    #[test]
    fn test_same_sequence_same_layout() {
        let first = build(&TypeSystem::default());
        let second = build(&TypeSystem::default());
        let layout = |c: &CompoundType| {
            c.members()
                .iter()
                .map(|m| (m.offset(), m.align(), m.identity()))
                .collect::<Vec<_>>()
        };
        assert_eq!(layout(&first), layout(&second));
        assert_eq!(first.size(), second.size());
        assert_eq!(first.align(), second.align());
    }

    #[test]
    fn test_expected_offsets() {
        let record = build(&TypeSystem::default());
        let offsets: Vec<u64> = record.members().iter().map(|m| m.offset()).collect();
        assert_eq!(offsets, vec![0, 8, 16, 18]);
        assert_eq!(record.align(), 8);
        assert_eq!(record.size(), 24);
        assert_eq!(record.size() % record.align(), 0);
    }

    #[test]
    fn test_layout_follows_target() {
        let narrow = TypeSystem::new(TargetLayout {
            pointer_size: 4,
            pointer_align: 4,
            ..TargetLayout::default()
        });
        let record = build(&narrow);
        let offsets: Vec<u64> = record.members().iter().map(|m| m.offset()).collect();
        assert_eq!(offsets, vec![0, 4, 8, 10]);
        assert_eq!(record.size(), 12);
    }
}

// ============================================================================
// Member ordering
// ============================================================================

mod ordering {
    use super::*;

    #[test]
    fn test_members_by_offset_is_stable() {
        let types = TypeSystem::default();
        let union = types
            .compound_builder()
            .set_overall_alignment(8)
            .add_anonymous_member(PrimitiveType::U8.into())
            .add_anonymous_member(PrimitiveType::U64.into())
            .build()
            .unwrap();
        let sorted = union.members_by_offset();
        assert_eq!(sorted[0].offset(), 0);
        assert_eq!(sorted[1].offset(), 8);

        let first = union.members_by_offset();
        let second = union.members_by_offset();
        let ids = |v: &[&kestrel_types::Member]| v.iter().map(|m| m.identity()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }
}

// ============================================================================
// Lazily-derived companions
// ============================================================================

mod companions {
    use super::*;

    const THREADS: usize = 16;

    #[test]
    fn test_array_class_memoized_under_contention() {
        let types = TypeSystem::default();
        let object = types.class_type("java/lang/Object", None);
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let object = Arc::clone(&object);
                    scope.spawn(move || object.array_class_type())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for result in &results {
            assert!(Arc::ptr_eq(result, &results[0]));
        }
        assert!(Arc::ptr_eq(&results[0], &object.array_class_type()));
    }

    #[test]
    fn test_reference_type_memoized_under_contention() {
        let types = TypeSystem::default();
        let string = types.class_type("java/lang/String", None);
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| scope.spawn(|| string.reference_type()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn test_concurrent_compound_builds_converge() {
        let types = TypeSystem::default();
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|i| {
                    let types = &types;
                    scope.spawn(move || point(types, Tag::Struct, &format!("point{}", i)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert_eq!(types.compound_count(), 1);
    }
}
