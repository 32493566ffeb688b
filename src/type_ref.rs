//! Stable handles into a [`crate::type_graph::TypeGraph`].
//!
//! The source represents cyclic structures with back-references (parent
//! pointers). Here the graph is an arena: every [`TypeRef`] is a
//! `(graph-serial, index)` pair with no owning pointer, so parent walks run
//! through the graph's adjacency rather than through backlinks, and cycles
//! are just ordinary edges.

use std::sync::atomic::{AtomicU64, Ordering};

/// Raw index into a graph's type array. Stable and monotonically assigned
/// within one graph/builder.
pub type TypeId = usize;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh serial for a new [`crate::builder::TypeBuilder`] /
/// [`crate::type_graph::TypeGraph`]. Each construction or rewrite produces a
/// new serial, so a [`TypeRef`] minted against one graph can never silently
/// resolve against another.
pub(crate) fn next_serial() -> u64 {
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

/// An opaque, stable handle to a type within one graph.
///
/// `TypeRef`s are the only way types reference each other; there are no
/// direct pointers. Two refs are equal iff they name the same index in the
/// same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeRef {
    graph_serial: u64,
    pub(crate) index: TypeId,
}

impl TypeRef {
    pub(crate) fn new(graph_serial: u64, index: TypeId) -> Self {
        Self { graph_serial, index }
    }

    pub fn index(self) -> TypeId {
        self.index
    }

    pub(crate) fn graph_serial(self) -> u64 {
        self.graph_serial
    }

    /// Asserts this ref was minted against `serial`. Every dereference of a
    /// `TypeRef` should go through a graph/builder method that calls this,
    /// so an inter-graph ref is caught immediately rather than silently
    /// resolving to the wrong type.
    pub(crate) fn assert_graph(self, serial: u64) -> crate::error::Result<()> {
        crate::error::invariant(
            self.graph_serial == serial,
            format!(
                "TypeRef({}, {}) used against graph with serial {}",
                self.graph_serial, self.index, serial
            ),
        )
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}:{}", self.graph_serial, self.index)
    }
}
