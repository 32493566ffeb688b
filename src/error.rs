//! Error taxonomy for the type-graph core.
//!
//! Per the three categories described in the specification: invariant
//! violations (bugs in this crate, never caught), structural input errors
//! (the driver can localize and report these), and resource errors (which
//! originate outside the core, at the parser/fetch boundary, and are not
//! modeled here).

use crate::type_ref::TypeId;

/// Errors the type-graph core can produce.
///
/// `#[non_exhaustive]` so an embedding driver can add its own error cases
/// (schema fetch failures, parse errors) without this crate needing to
/// anticipate them.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An internal consistency assertion failed: double commit, a
    /// forwarding ref left unbound, a set-once field set twice, a type
    /// referencing another graph, an unknown variant reached in an
    /// exhaustive match. These indicate a bug in this crate.
    #[error("internal error: {0}")]
    Internal(String),

    /// A union was constructed with zero members.
    #[error("union type has no members")]
    EmptyUnion,

    /// Declaration scheduling found a cycle with no forward-declarable
    /// member.
    #[error("cycle among types {cycle:?} has no forward-declarable member")]
    NoForwardDeclarableTypeInCycle { cycle: Vec<TypeId> },

    /// A rewrite pass dropped attributes that could not be losslessly
    /// propagated across reconstitution (e.g. `ReplaceObjectType` folding
    /// `additionalProperties: any` into a class).
    #[error("type attributes were not propagated across rewrite for type {type_id:?}")]
    AttributesNotPropagated { type_id: TypeId },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Asserts `cond`, returning `Error::Internal(msg)` instead of panicking.
///
/// Mirrors the source's `messageAssert`: call sites propagate with `?`
/// instead of letting an assertion abort the whole process. Reserve
/// `debug_assert!`/`unreachable!` for states that indicate a bug in this
/// crate's own bookkeeping rather than a caller-triggerable condition.
pub(crate) fn invariant(cond: bool, msg: impl Into<String>) -> Result<()> {
    match cond {
        true => Ok(()),
        false => Err(Error::Internal(msg.into())),
    }
}
