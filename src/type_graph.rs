//! The frozen, immutable graph a [`crate::builder::TypeBuilder`] produces.

use indexmap::IndexMap;

use crate::attributes::TypeAttributes;
use crate::error::{invariant, Result};
use crate::type_ref::TypeRef;
use crate::types::{Kind, Type};

#[derive(Debug)]
pub struct TypeGraph {
    pub(crate) serial: u64,
    pub(crate) types: Vec<Type>,
    pub(crate) attributes: Vec<TypeAttributes>,
    pub(crate) top_levels: IndexMap<String, TypeRef>,
}

/// The three separated buckets of named types a renderer iterates over.
pub struct NamedTypes {
    pub objects: Vec<TypeRef>,
    pub enums: Vec<TypeRef>,
    pub unions: Vec<TypeRef>,
}

impl TypeGraph {
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn ref_at(&self, index: usize) -> TypeRef {
        TypeRef::new(self.serial, index)
    }

    pub fn type_of(&self, r: TypeRef) -> Result<&Type> {
        r.assert_graph(self.serial)?;
        self.types.get(r.index()).ok_or_else(|| crate::error::Error::Internal(format!("dangling TypeRef {r}")))
    }

    pub fn attributes_of(&self, r: TypeRef) -> Result<&TypeAttributes> {
        r.assert_graph(self.serial)?;
        self.attributes.get(r.index()).ok_or_else(|| crate::error::Error::Internal(format!("dangling TypeRef {r}")))
    }

    pub fn children_of(&self, r: TypeRef) -> Result<Vec<TypeRef>> {
        Ok(self.type_of(r)?.children(self.attributes_of(r)?))
    }

    pub fn top_levels(&self) -> &IndexMap<String, TypeRef> {
        &self.top_levels
    }

    pub fn all_types_unordered(&self) -> impl Iterator<Item = TypeRef> + '_ {
        (0..self.types.len()).map(move |i| self.ref_at(i))
    }

    pub fn all_named_types_separated(&self) -> NamedTypes {
        let mut named = NamedTypes { objects: vec![], enums: vec![], unions: vec![] };
        for r in self.all_types_unordered() {
            match self.types[r.index()].kind() {
                Kind::Class | Kind::Map | Kind::Object => named.objects.push(r),
                Kind::Enum => named.enums.push(r),
                Kind::Union => named.unions.push(r),
                Kind::Primitive | Kind::Array | Kind::Intersection => {}
            }
        }
        named
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Asserts structural invariants that must hold of any frozen graph:
    /// every union/intersection is non-empty, every array/set-operation's
    /// set-once field is actually set.
    pub fn validate(&self) -> Result<()> {
        for r in self.all_types_unordered() {
            match &self.types[r.index()] {
                Type::Union(None) | Type::Intersection(None) => {
                    return Err(crate::error::Error::Internal(format!("unset set-operation members at {r}")));
                }
                Type::Union(Some(members)) => invariant(!members.is_empty(), "union has no members").map_err(|_| {
                    crate::error::Error::EmptyUnion
                })?,
                Type::Array(None) => return Err(crate::error::Error::Internal(format!("unset array item at {r}"))),
                Type::Class { contents: None, .. } => {
                    return Err(crate::error::Error::Internal(format!("unset class properties at {r}")))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A cycle-safe `Display` wrapper: recursive formatting that tracks visited
/// indices so a self-referential graph prints instead of looping forever.
pub struct CanonicalView<'a> {
    graph: &'a TypeGraph,
    root: TypeRef,
}

impl<'a> CanonicalView<'a> {
    pub fn new(graph: &'a TypeGraph, root: TypeRef) -> Self {
        Self { graph, root }
    }
}

impl std::fmt::Display for CanonicalView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut visited = std::collections::BTreeSet::new();
        fmt_ref(self.graph, self.root, f, &mut visited)
    }
}

fn fmt_ref(graph: &TypeGraph, r: TypeRef, f: &mut std::fmt::Formatter<'_>, visited: &mut std::collections::BTreeSet<usize>) -> std::fmt::Result {
    if !visited.insert(r.index()) {
        return write!(f, "<cycle {}>", r.index());
    }
    let Ok(ty) = graph.type_of(r) else { return write!(f, "<dangling>") };
    match ty {
        Type::Primitive(p) => write!(f, "{p:?}"),
        Type::Array(Some(item)) => {
            write!(f, "[")?;
            fmt_ref(graph, *item, f, visited)?;
            write!(f, "]")
        }
        Type::Array(None) => write!(f, "[?]"),
        Type::Map(values) => {
            write!(f, "{{map: ")?;
            fmt_ref(graph, *values, f, visited)?;
            write!(f, "}}")
        }
        Type::Class { contents: Some(c), .. } | Type::Object(Some(c)) => {
            write!(f, "{{")?;
            for (i, (name, prop)) in c.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name}{}: ", if prop.optional { "?" } else { "" })?;
                fmt_ref(graph, prop.type_ref, f, visited)?;
            }
            if let Some(additional) = c.additional {
                write!(f, ", *: ")?;
                fmt_ref(graph, additional, f, visited)?;
            }
            write!(f, "}}")
        }
        Type::Class { contents: None, .. } | Type::Object(None) => write!(f, "{{?}}"),
        Type::Enum(cases) => write!(f, "enum{{{}}}", cases.iter().cloned().collect::<Vec<_>>().join("|")),
        Type::Union(Some(members)) => {
            write!(f, "(")?;
            for (i, m) in members.iter().enumerate() {
                if i > 0 {
                    write!(f, "|")?;
                }
                fmt_ref(graph, *m, f, visited)?;
            }
            write!(f, ")")
        }
        Type::Union(None) => write!(f, "(?)"),
        Type::Intersection(Some(members)) => {
            write!(f, "(")?;
            for (i, m) in members.iter().enumerate() {
                if i > 0 {
                    write!(f, "&")?;
                }
                fmt_ref(graph, *m, f, visited)?;
            }
            write!(f, ")")
        }
        Type::Intersection(None) => write!(f, "(?)"),
    }
}
