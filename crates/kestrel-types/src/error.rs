//! Type system errors

use thiserror::Error;

/// Errors raised by type construction and member lookup
///
/// Everything except [`TypeError::NoSuchMember`] and
/// [`TypeError::MemberIndexOutOfBounds`] is an invariant violation that
/// aborts the compilation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    /// A compound type was completed without any members
    #[error("Compound type {name} has no members")]
    EmptyCompound {
        /// Display name of the compound type
        name: String,
    },

    /// A member of a named compound type was added without a name
    #[error("Member #{index} of named compound type {name} has no name")]
    UnnamedMember {
        /// Display name of the compound type
        name: String,
        /// Declaration index of the offending member
        index: usize,
    },

    /// A name-based member lookup was attempted on an anonymous compound type
    #[error("Anonymous compound type {ty} has no member names")]
    AnonymousMemberLookup {
        /// Friendly name of the compound type
        ty: String,
    },

    /// No member with the requested name exists
    #[error("No member named '{member}' found in {ty}")]
    NoSuchMember {
        /// Requested member name
        member: String,
        /// Friendly name of the compound type
        ty: String,
    },

    /// A member index was past the end of the member list
    #[error("Member index {index} out of bounds for {ty} with {count} members")]
    MemberIndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Number of members
        count: usize,
        /// Friendly name of the compound type
        ty: String,
    },

    /// An alignment was zero or not a power of two
    #[error("Invalid alignment {align}: must be a non-zero power of two")]
    InvalidAlignment {
        /// Offending alignment
        align: u64,
    },

    /// A type or method descriptor string is malformed
    #[error("Invalid descriptor '{descriptor}'")]
    InvalidDescriptor {
        /// Offending descriptor text
        descriptor: String,
    },

    /// The target layout is unusable
    #[error("Invalid target layout: {reason}")]
    InvalidLayout {
        /// Reason for invalidity
        reason: String,
    },
}

impl TypeError {
    /// Whether this error indicates a compiler or configuration defect
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TypeError::NoSuchMember { .. } | TypeError::MemberIndexOutOfBounds { .. }
        )
    }
}
