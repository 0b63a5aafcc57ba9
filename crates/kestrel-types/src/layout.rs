//! Target data layout
//!
//! The word sizes the type system needs but cannot derive on its own:
//! native pointers, object references and type identifiers.

use crate::error::TypeError;

/// Sizes and alignments of the target's address-like types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetLayout {
    /// Size of a native pointer in bytes
    pub pointer_size: u32,
    /// Alignment of a native pointer in bytes
    pub pointer_align: u32,
    /// Size of an object reference in bytes
    pub reference_size: u32,
    /// Alignment of an object reference in bytes
    pub reference_align: u32,
    /// Size of a type identifier in bytes
    pub type_id_size: u32,
    /// Alignment of a type identifier in bytes
    pub type_id_align: u32,
}

impl Default for TargetLayout {
    fn default() -> Self {
        // 64-bit target with compressed references
        TargetLayout {
            pointer_size: 8,
            pointer_align: 8,
            reference_size: 4,
            reference_align: 4,
            type_id_size: 4,
            type_id_align: 4,
        }
    }
}

impl TargetLayout {
    /// Check that every size is non-zero and every alignment a power of two
    pub fn validate(&self) -> Result<(), TypeError> {
        let sizes = [
            ("pointer", self.pointer_size),
            ("reference", self.reference_size),
            ("type id", self.type_id_size),
        ];
        for (what, size) in sizes {
            if size == 0 {
                return Err(TypeError::InvalidLayout {
                    reason: format!("{} size must be non-zero", what),
                });
            }
        }
        for align in [self.pointer_align, self.reference_align, self.type_id_align] {
            check_alignment(align as u64)?;
        }
        Ok(())
    }
}

/// Round `offset` up to the next multiple of `align`
///
/// `align` must be a power of two.
#[inline]
pub const fn align_up(offset: u64, align: u64) -> u64 {
    (offset + (align - 1)) & !(align - 1)
}

/// Reject alignments that are zero or not a power of two
pub fn check_alignment(align: u64) -> Result<(), TypeError> {
    if align.is_power_of_two() {
        Ok(())
    } else {
        Err(TypeError::InvalidAlignment { align })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 4), 12);
        assert_eq!(align_up(13, 1), 13);
    }

    #[test]
    fn test_default_layout_is_valid() {
        assert!(TargetLayout::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_alignment() {
        let layout = TargetLayout {
            reference_align: 6,
            ..TargetLayout::default()
        };
        assert_eq!(layout.validate(), Err(TypeError::InvalidAlignment { align: 6 }));
    }

    #[test]
    fn test_rejects_zero_size() {
        let layout = TargetLayout {
            pointer_size: 0,
            ..TargetLayout::default()
        };
        assert!(matches!(layout.validate(), Err(TypeError::InvalidLayout { .. })));
    }
}
