//! The `Type` tagged variant and its per-kind contracts (identity, children,
//! nullability, structural comparison).

use std::collections::{BTreeSet, VecDeque};

use indexmap::IndexMap;

use crate::attributes::TypeAttributes;
use crate::type_ref::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveKind {
    None,
    Any,
    Null,
    Bool,
    Integer,
    Double,
    String,
    Date,
    Time,
    DateTime,
    Uuid,
    Uri,
    IntegerString,
    BoolString,
}

impl PrimitiveKind {
    /// Transformed-string kinds: primitives that are string-shaped on the
    /// wire but carry a decoded interpretation.
    pub fn is_transformed_string(self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::DateTime | Self::Uuid | Self::Uri | Self::IntegerString | Self::BoolString
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassProperty {
    pub type_ref: TypeRef,
    pub optional: bool,
}

/// The structural contents of a class or the base `object` kind: named
/// properties plus, for `object`, an optional additional-properties type.
#[derive(Debug, Clone)]
pub struct ObjectContents {
    pub properties: IndexMap<String, ClassProperty>,
    pub additional: Option<TypeRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Primitive,
    Array,
    Class,
    Map,
    Object,
    Enum,
    Union,
    Intersection,
}

/// A type's structural body. Set-once fields (array item, object contents,
/// set-operation members) start `None` when a type is reserved via a
/// forwarding ref and are committed exactly once by `TypeBuilder`.
#[derive(Debug, Clone)]
pub enum Type {
    Primitive(PrimitiveKind),
    Array(Option<TypeRef>),
    /// A class always has named properties and no additional-properties
    /// type; `is_fixed` mirrors the source's construction-time flag and has
    /// no bearing on a frozen graph's semantics.
    Class { is_fixed: bool, contents: Option<ObjectContents> },
    Map(TypeRef),
    /// The base `object` kind: always constructed unique, may carry both
    /// named properties and an additional-properties type.
    Object(Option<ObjectContents>),
    Enum(BTreeSet<String>),
    Union(Option<BTreeSet<TypeRef>>),
    Intersection(Option<BTreeSet<TypeRef>>),
}

impl Type {
    pub fn kind(&self) -> Kind {
        match self {
            Type::Primitive(_) => Kind::Primitive,
            Type::Array(_) => Kind::Array,
            Type::Class { .. } => Kind::Class,
            Type::Map(_) => Kind::Map,
            Type::Object(_) => Kind::Object,
            Type::Enum(_) => Kind::Enum,
            Type::Union(_) => Kind::Union,
            Type::Intersection(_) => Kind::Intersection,
        }
    }

    pub fn is_primitive_string(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::String))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::Any))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::None))
    }

    /// `None` forces uniqueness: the builder must not attempt identity
    /// dedup for this type (used for `object`, for any type with a
    /// unique-identity-requiring attribute, and for types with an unset
    /// set-once field, which cannot yet have a stable identity).
    pub fn identity(&self) -> Option<TypeIdentity> {
        match self {
            Type::Primitive(p) => Some(TypeIdentity::Primitive(*p)),
            Type::Array(Some(item)) => Some(TypeIdentity::Array(*item)),
            Type::Array(None) => None,
            Type::Class { contents: Some(c), .. } => Some(TypeIdentity::Class(canonical_contents(c))),
            Type::Class { contents: None, .. } => None,
            Type::Map(values) => Some(TypeIdentity::Map(*values)),
            // `object` is always constructed via getUniqueObjectType: no identity dedup.
            Type::Object(_) => None,
            Type::Enum(cases) => Some(TypeIdentity::Enum(cases.iter().cloned().collect())),
            Type::Union(Some(members)) => Some(TypeIdentity::Union(members.iter().copied().collect())),
            Type::Union(None) => None,
            Type::Intersection(Some(members)) => Some(TypeIdentity::Intersection(members.iter().copied().collect())),
            Type::Intersection(None) => None,
        }
    }

    /// Direct structural child refs, ignoring anything carried by
    /// attributes.
    pub fn non_attribute_children(&self) -> Vec<TypeRef> {
        match self {
            Type::Primitive(_) | Type::Enum(_) => vec![],
            Type::Array(item) => item.into_iter().copied().collect(),
            Type::Map(values) => vec![*values],
            Type::Class { contents, .. } | Type::Object(contents) => match contents {
                Some(c) => {
                    let mut refs: Vec<TypeRef> = c.properties.values().map(|p| p.type_ref).collect();
                    refs.extend(c.additional);
                    refs
                }
                None => vec![],
            },
            Type::Union(members) | Type::Intersection(members) => {
                members.iter().flatten().copied().collect()
            }
        }
    }

    /// Non-attribute children plus every child reported by an attached
    /// attribute.
    pub fn children(&self, attrs: &TypeAttributes) -> Vec<TypeRef> {
        let mut refs = self.non_attribute_children();
        refs.extend(attrs.children());
        refs
    }

    /// `null`/`any`/`none` are nullable by convention (callers may treat an
    /// absent value as satisfying them); a union is nullable iff it has a
    /// `null` member among its *unreconstituted* members — the caller must
    /// resolve member kinds via the graph to check this for unions with
    /// member refs rather than inline kinds, so this takes the resolved
    /// member kinds directly.
    pub fn is_nullable(&self, member_kinds: impl Fn(TypeRef) -> PrimitiveKind) -> bool {
        match self {
            Type::Primitive(PrimitiveKind::Null | PrimitiveKind::Any | PrimitiveKind::None) => true,
            Type::Primitive(_) => false,
            Type::Union(Some(members)) => members.iter().any(|m| member_kinds(*m) == PrimitiveKind::Null),
            Type::Union(None) => false,
            Type::Intersection(_) => panic!("is_nullable is not defined for intersection types"),
            _ => false,
        }
    }

    /// One step of structural equality: compares this type's own shape
    /// against `other`'s, pushing child pairs onto `queue` for further
    /// comparison rather than recursing directly (keeps the BFS iterative
    /// and cycle-safe). Returns `false` on an immediate kind/shape mismatch.
    pub fn structural_equality_step(
        &self,
        other: &Type,
        conflate_numbers: bool,
        queue: &mut VecDeque<(TypeRef, TypeRef)>,
    ) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => {
                a == b
                    || (conflate_numbers
                        && matches!(
                            (a, b),
                            (PrimitiveKind::Integer, PrimitiveKind::Double) | (PrimitiveKind::Double, PrimitiveKind::Integer)
                        ))
            }
            (Type::Array(Some(a)), Type::Array(Some(b))) => {
                queue.push_back((*a, *b));
                true
            }
            (Type::Map(a), Type::Map(b)) => {
                queue.push_back((*a, *b));
                true
            }
            (Type::Class { contents: Some(a), .. }, Type::Class { contents: Some(b), .. })
            | (Type::Object(Some(a)), Type::Object(Some(b))) => {
                if a.properties.len() != b.properties.len() {
                    return false;
                }
                for (name, pa) in &a.properties {
                    let Some(pb) = b.properties.get(name) else { return false };
                    if pa.optional != pb.optional {
                        return false;
                    }
                    queue.push_back((pa.type_ref, pb.type_ref));
                }
                match (a.additional, b.additional) {
                    (Some(x), Some(y)) => queue.push_back((x, y)),
                    (None, None) => {}
                    _ => return false,
                }
                true
            }
            (Type::Enum(a), Type::Enum(b)) => a == b,
            (Type::Union(Some(a)), Type::Union(Some(b))) | (Type::Intersection(Some(a)), Type::Intersection(Some(b))) => {
                if a.len() != b.len() {
                    return false;
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    queue.push_back((*x, *y));
                }
                true
            }
            _ => false,
        }
    }
}

fn canonical_contents(c: &ObjectContents) -> Vec<(String, TypeRef, bool)> {
    let mut props: Vec<(String, TypeRef, bool)> =
        c.properties.iter().map(|(k, v)| (k.clone(), v.type_ref, v.optional)).collect();
    props.sort_by(|a, b| a.0.cmp(&b.0));
    props
}

/// Structural identity of a type, independent of identity-affecting
/// attributes (those are appended separately by the builder before caching).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeIdentity {
    Primitive(PrimitiveKind),
    Array(TypeRef),
    Class(Vec<(String, TypeRef, bool)>),
    Map(TypeRef),
    Enum(Vec<String>),
    Union(Vec<TypeRef>),
    Intersection(Vec<TypeRef>),
}
