//! Compound (struct and union) types and their layout builder

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::error::TypeError;
use crate::layout::{align_up, check_alignment};
use crate::system::TypeSystem;
use crate::ty::ValueType;

/// Compound type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tag {
    /// No tag
    #[default]
    None,
    /// `class` tag
    Class,
    /// `struct` tag
    Struct,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tag::None => "untagged",
            Tag::Class => "class",
            Tag::Struct => "struct",
        })
    }
}

/// A member of a compound type
#[derive(Debug, Clone)]
pub struct Member {
    name: Option<String>,
    ty: ValueType,
    offset: u64,
    align: u64,
    identity: u64,
}

impl Member {
    fn new(name: Option<String>, ty: ValueType, offset: u64, declared_align: u64) -> Self {
        let align = declared_align.max(ty.align());
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        ty.hash(&mut hasher);
        offset.hash(&mut hasher);
        align.trailing_zeros().hash(&mut hasher);
        Member {
            name,
            ty,
            offset,
            align,
            identity: hasher.finish(),
        }
    }

    /// Member name; `None` for anonymous members
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Member type
    pub fn ty(&self) -> &ValueType {
        &self.ty
    }

    /// Byte offset from the start of the compound
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Effective alignment: the larger of the requested and natural alignment
    pub fn align(&self) -> u64 {
        self.align
    }

    /// Stable key derived from name, type, offset and alignment
    pub fn identity(&self) -> u64 {
        self.identity
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.offset == other.offset
            && self.align == other.align
            && self.name == other.name
            && self.ty == other.ty
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.identity);
    }
}

impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        // Offset first, larger members first at the same offset, then the
        // derived identity so overlapping union members sort predictably.
        self.offset
            .cmp(&other.offset)
            .then_with(|| other.ty.size().cmp(&self.ty.size()))
            .then_with(|| self.identity.cmp(&other.identity))
            .then_with(|| self.align.cmp(&other.align))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@{}",
            self.ty,
            self.name.as_deref().unwrap_or(""),
            self.offset
        )?;
        if self.align > 1 {
            write!(f, " align={}", self.align)?;
        }
        Ok(())
    }
}

/// A struct or union aggregate with explicit offsets
///
/// Equality and hashing consider only the layout (size, alignment,
/// completeness and members). The name and tag are for display, so two
/// identically laid-out compounds built under different names are the same
/// canonical instance.
#[derive(Debug, Clone)]
pub struct CompoundType {
    tag: Tag,
    name: Option<String>,
    size: u64,
    align: u64,
    complete: bool,
    members: Vec<Member>,
}

impl CompoundType {
    pub(crate) fn incomplete(tag: Tag, name: Option<String>) -> Self {
        CompoundType {
            tag,
            name,
            size: 0,
            align: 1,
            complete: false,
            members: Vec::new(),
        }
    }

    /// Compound tag
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Display name, `<anon>` when anonymous
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anon>")
    }

    /// Check if this compound has no name
    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    /// Size in bytes, a multiple of [`CompoundType::align`]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Overall alignment in bytes
    pub fn align(&self) -> u64 {
        self.align
    }

    /// Whether the layout has been finalized
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Members in declaration order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Member at a declaration index
    pub fn member(&self, index: usize) -> Result<&Member, TypeError> {
        self.members
            .get(index)
            .ok_or_else(|| TypeError::MemberIndexOutOfBounds {
                index,
                count: self.members.len(),
                ty: self.friendly_name(),
            })
    }

    /// Member with the given name
    ///
    /// Anonymous compounds have no member names, so asking one is an
    /// [`TypeError::AnonymousMemberLookup`].
    pub fn member_by_name(&self, name: &str) -> Result<&Member, TypeError> {
        if self.is_anonymous() {
            return Err(TypeError::AnonymousMemberLookup {
                ty: self.friendly_name(),
            });
        }
        self.members
            .iter()
            .find(|m| m.name() == Some(name))
            .ok_or_else(|| TypeError::NoSuchMember {
                member: name.to_string(),
                ty: self.friendly_name(),
            })
    }

    /// Members sorted by offset (see [`Member`]'s ordering)
    pub fn members_by_offset(&self) -> Vec<&Member> {
        let mut sorted: Vec<&Member> = self.members.iter().collect();
        sorted.sort();
        sorted
    }

    /// Dotted form used in diagnostics, e.g. `compound.struct.point`
    pub fn friendly_name(&self) -> String {
        format!("compound.{}.{}", self.tag, self.name())
    }
}

impl PartialEq for CompoundType {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && self.align == other.align
            && self.complete == other.complete
            && self.members == other.members
    }
}

impl Eq for CompoundType {}

impl Hash for CompoundType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        self.align.hash(state);
        self.complete.hash(state);
        self.members.hash(state);
    }
}

impl fmt::Display for CompoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("compound ")?;
        if self.tag != Tag::None {
            write!(f, "{} ", self.tag)?;
        }
        f.write_str(self.name())
    }
}

/// Computes the layout of a new compound type
///
/// Members are placed in the order they are added. Errors such as a bad
/// alignment are held until [`CompoundTypeBuilder::build`]. A builder belongs
/// to the thread that created it.
pub struct CompoundTypeBuilder<'a> {
    types: &'a TypeSystem,
    tag: Tag,
    name: Option<String>,
    offset: u64,
    overall_align: u64,
    members: Vec<Member>,
    error: Option<TypeError>,
    _not_send: PhantomData<*const ()>,
}

impl<'a> CompoundTypeBuilder<'a> {
    pub(crate) fn new(types: &'a TypeSystem) -> Self {
        CompoundTypeBuilder {
            types,
            tag: Tag::None,
            name: None,
            offset: 0,
            overall_align: 1,
            members: Vec::new(),
            error: None,
            _not_send: PhantomData,
        }
    }

    /// Set the compound name; an empty name leaves it anonymous
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// Set the compound tag
    pub fn set_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }

    /// Require at least `align` bytes of overall alignment
    pub fn set_overall_alignment(mut self, align: u64) -> Self {
        match check_alignment(align) {
            Ok(()) => self.overall_align = self.overall_align.max(align),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Add a named member at its natural alignment
    pub fn add_member(self, name: impl Into<String>, ty: ValueType) -> Self {
        let align = ty.align();
        self.add_member_aligned(name, ty, align)
    }

    /// Add a named member aligned to at least `align` bytes
    pub fn add_member_aligned(self, name: impl Into<String>, ty: ValueType, align: u64) -> Self {
        let name = name.into();
        let name = if name.is_empty() { None } else { Some(name) };
        self.push(name, ty, align)
    }

    /// Add a member without a name; only valid in anonymous compounds
    pub fn add_anonymous_member(self, ty: ValueType) -> Self {
        let align = ty.align();
        self.push(None, ty, align)
    }

    fn push(mut self, name: Option<String>, ty: ValueType, align: u64) -> Self {
        if let Err(e) = check_alignment(align) {
            self.fail(e);
            return self;
        }
        let size = ty.size();
        let offset = align_up(self.offset, align.max(ty.align()));
        let member = Member::new(name, ty, offset, align);
        self.overall_align = self.overall_align.max(member.align);
        self.offset = offset + size;
        self.members.push(member);
        self
    }

    fn fail(&mut self, error: TypeError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Finish the layout and return the canonical compound type
    pub fn build(self) -> Result<Arc<CompoundType>, TypeError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let display = self.name.clone().unwrap_or_else(|| "<anon>".to_string());
        if self.members.is_empty() {
            return Err(TypeError::EmptyCompound { name: display });
        }
        if self.name.is_some() {
            if let Some(index) = self.members.iter().position(|m| m.name.is_none()) {
                return Err(TypeError::UnnamedMember {
                    name: display,
                    index,
                });
            }
        }
        let size = align_up(self.offset, self.overall_align);
        Ok(self.types.intern_compound(CompoundType {
            tag: self.tag,
            name: self.name,
            size,
            align: self.overall_align,
            complete: true,
            members: self.members,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::PrimitiveType;

    fn s(p: PrimitiveType) -> ValueType {
        ValueType::Primitive(p)
    }

    #[test]
    fn test_struct_layout() {
        let types = TypeSystem::default();
        let ty = types
            .compound_builder()
            .set_tag(Tag::Struct)
            .set_name("mixed")
            .add_member("a", s(PrimitiveType::U8))
            .add_member("b", s(PrimitiveType::S32))
            .add_member("c", s(PrimitiveType::S16))
            .build()
            .unwrap();
        let offsets: Vec<u64> = ty.members().iter().map(|m| m.offset()).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(ty.align(), 4);
        assert_eq!(ty.size(), 12);
        assert!(ty.is_complete());
    }

    #[test]
    fn test_requested_alignment_wins() {
        let types = TypeSystem::default();
        let ty = types
            .compound_builder()
            .set_name("padded")
            .add_member("a", s(PrimitiveType::U8))
            .add_member_aligned("b", s(PrimitiveType::U8), 16)
            .build()
            .unwrap();
        let b = ty.member_by_name("b").unwrap();
        assert_eq!(b.offset(), 16);
        assert_eq!(b.align(), 16);
        assert_eq!(ty.size(), 32);
        assert_eq!(b.to_string(), "u8 b@16 align=16");
    }

    #[test]
    fn test_natural_alignment_beats_smaller_request() {
        let types = TypeSystem::default();
        let ty = types
            .compound_builder()
            .add_anonymous_member(s(PrimitiveType::U8))
            .add_member_aligned("", s(PrimitiveType::S64), 1)
            .build()
            .unwrap();
        let second = ty.member(1).unwrap();
        assert_eq!(second.align(), 8);
        assert_eq!(second.offset(), 8);
        assert_eq!(ty.size(), 16);
    }

    #[test]
    fn test_overall_alignment_rounds_size() {
        let types = TypeSystem::default();
        let ty = types
            .compound_builder()
            .set_overall_alignment(8)
            .add_anonymous_member(s(PrimitiveType::U16))
            .build()
            .unwrap();
        assert_eq!(ty.align(), 8);
        assert_eq!(ty.size(), 8);
    }

    #[test]
    fn test_empty_compound_is_rejected() {
        let types = TypeSystem::default();
        let err = types.compound_builder().set_name("empty").build().unwrap_err();
        assert_eq!(err, TypeError::EmptyCompound { name: "empty".to_string() });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unnamed_member_in_named_compound() {
        let types = TypeSystem::default();
        let err = types
            .compound_builder()
            .set_name("named")
            .add_member("x", s(PrimitiveType::S32))
            .add_anonymous_member(s(PrimitiveType::S32))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            TypeError::UnnamedMember { name: "named".to_string(), index: 1 }
        );
    }

    #[test]
    fn test_invalid_alignment_is_deferred_to_build() {
        let types = TypeSystem::default();
        let err = types
            .compound_builder()
            .add_member_aligned("x", s(PrimitiveType::S32), 3)
            .add_member("y", s(PrimitiveType::S32))
            .build()
            .unwrap_err();
        assert_eq!(err, TypeError::InvalidAlignment { align: 3 });
    }

    #[test]
    fn test_member_lookup() {
        let types = TypeSystem::default();
        let named = types
            .compound_builder()
            .set_tag(Tag::Struct)
            .set_name("point")
            .add_member("x", s(PrimitiveType::S32))
            .add_member("y", s(PrimitiveType::S32))
            .build()
            .unwrap();
        assert_eq!(named.member_by_name("y").unwrap().offset(), 4);
        let err = named.member_by_name("z").unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "No member named 'z' found in compound.struct.point");
        assert!(matches!(
            named.member(2),
            Err(TypeError::MemberIndexOutOfBounds { index: 2, count: 2, .. })
        ));

        let anon = types
            .compound_builder()
            .add_member("x", s(PrimitiveType::S32))
            .build()
            .unwrap();
        let err = anon.member_by_name("x").unwrap_err();
        assert!(matches!(err, TypeError::AnonymousMemberLookup { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_display_forms() {
        let types = TypeSystem::default();
        let ty = types
            .compound_builder()
            .set_tag(Tag::Struct)
            .set_name("foo")
            .add_member("x", s(PrimitiveType::S32))
            .build()
            .unwrap();
        assert_eq!(ty.to_string(), "compound struct foo");
        assert_eq!(ty.friendly_name(), "compound.struct.foo");

        let incomplete = types.incomplete_compound(Tag::None, None);
        assert_eq!(incomplete.to_string(), "compound <anon>");
        assert_eq!(incomplete.friendly_name(), "compound.untagged.<anon>");
        assert!(!incomplete.is_complete());
        assert_eq!(incomplete.size(), 0);
        assert_eq!(incomplete.align(), 1);
    }

    #[test]
    fn test_member_order_at_same_offset() {
        let a = Member::new(Some("a".into()), s(PrimitiveType::U8), 0, 1);
        let b = Member::new(Some("b".into()), s(PrimitiveType::U64), 0, 1);
        let c = Member::new(Some("c".into()), s(PrimitiveType::U16), 4, 1);
        let mut members = vec![c.clone(), a.clone(), b.clone()];
        members.sort();
        assert_eq!(members, vec![b, a, c]);
    }
}
