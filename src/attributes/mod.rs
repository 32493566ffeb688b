//! Pluggable, combinable, identity-affecting metadata attached to types.
//!
//! The source models attribute kinds as singleton interface objects
//! registered by reference identity. The set of kinds here is closed and
//! known ahead of time, so it is modeled as an exhaustive enum instead: the
//! combine/intersect/reconstitute "methods per kind" become match arms on
//! [`AttributeValue`], which is simpler to get right by hand than an open
//! trait-object registry and carries the same contract.

pub mod names;

use std::collections::{BTreeMap, BTreeSet};

use crate::transform::Transformer;
use crate::type_ref::TypeRef;
use names::TypeNames;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKind {
    Names,
    Description,
    PropertyDescription,
    AccessorNames,
    EnumCases,
    MinMax,
    MinMaxLength,
    Pattern,
    UriProtocols,
    UriExtensions,
    StringTypes,
    UnionIdentifier,
    UnionMemberNames,
    Transformation,
    Provenance,
    LostTypeAttributes,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MinMax {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinMaxLength {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvenanceSource {
    Sample,
    Schema,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformation {
    ToDate,
    ToTime,
    ToDateTime,
    ToUuid,
    ToUri,
    ToIntegerString,
    ToBoolString,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTypes {
    pub cases: BTreeMap<String, usize>,
    pub transformations: BTreeSet<Transformation>,
}

#[derive(Debug, Clone)]
pub enum AttributeValue {
    Names(TypeNames),
    Description(BTreeSet<String>),
    PropertyDescription(BTreeMap<String, BTreeSet<String>>),
    AccessorNames(BTreeMap<String, String>),
    EnumCases(BTreeMap<String, usize>),
    MinMax(MinMax),
    MinMaxLength(MinMaxLength),
    Pattern(String),
    UriProtocols(BTreeSet<String>),
    UriExtensions(BTreeSet<String>),
    StringTypes(StringTypes),
    UnionIdentifier(u64),
    UnionMemberNames(BTreeMap<TypeRef, BTreeSet<String>>),
    Transformation(Transformer),
    Provenance(BTreeSet<ProvenanceSource>),
    /// Marks a type whose construction silently dropped a structural
    /// constraint (e.g. `ReplaceObjectType` absorbing `additionalProperties:
    /// any` into a plain class), so downstream code does not assume the
    /// rewrite was lossless.
    LostTypeAttributes,
}

impl AttributeValue {
    fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Names(_) => AttributeKind::Names,
            AttributeValue::Description(_) => AttributeKind::Description,
            AttributeValue::PropertyDescription(_) => AttributeKind::PropertyDescription,
            AttributeValue::AccessorNames(_) => AttributeKind::AccessorNames,
            AttributeValue::EnumCases(_) => AttributeKind::EnumCases,
            AttributeValue::MinMax(_) => AttributeKind::MinMax,
            AttributeValue::MinMaxLength(_) => AttributeKind::MinMaxLength,
            AttributeValue::Pattern(_) => AttributeKind::Pattern,
            AttributeValue::UriProtocols(_) => AttributeKind::UriProtocols,
            AttributeValue::UriExtensions(_) => AttributeKind::UriExtensions,
            AttributeValue::StringTypes(_) => AttributeKind::StringTypes,
            AttributeValue::UnionIdentifier(_) => AttributeKind::UnionIdentifier,
            AttributeValue::UnionMemberNames(_) => AttributeKind::UnionMemberNames,
            AttributeValue::Transformation(_) => AttributeKind::Transformation,
            AttributeValue::Provenance(_) => AttributeKind::Provenance,
            AttributeValue::LostTypeAttributes => AttributeKind::LostTypeAttributes,
        }
    }

    /// Whether this attribute participates in a type's identity (affects
    /// whether two otherwise-identical types are deduplicated).
    fn in_identity(kind: AttributeKind) -> bool {
        matches!(kind, AttributeKind::UnionIdentifier)
    }

    fn requires_unique_identity(&self) -> bool {
        matches!(self, AttributeValue::UnionIdentifier(_))
    }

    fn children(&self) -> Vec<TypeRef> {
        match self {
            AttributeValue::UnionMemberNames(map) => map.keys().copied().collect(),
            _ => vec![],
        }
    }

    fn make_inferred(&self) -> Option<AttributeValue> {
        match self {
            AttributeValue::Names(n) => Some(AttributeValue::Names(n.make_inferred())),
            other => Some(other.clone()),
        }
    }

    fn increase_distance(&self) -> Option<AttributeValue> {
        match self {
            AttributeValue::Names(n) => Some(AttributeValue::Names(n.increase_distance())),
            other => Some(other.clone()),
        }
    }

    fn reconstitute(&self, remap: &mut dyn FnMut(TypeRef) -> crate::error::Result<TypeRef>) -> crate::error::Result<AttributeValue> {
        match self {
            AttributeValue::UnionMemberNames(map) => {
                let mut out = BTreeMap::new();
                for (r, names) in map {
                    out.insert(remap(*r)?, names.clone());
                }
                Ok(AttributeValue::UnionMemberNames(out))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Combines two [`AttributeValue`]s of the *same* kind. Returns `None` when
/// the rule says to drop the attribute (e.g. conflicting patterns).
fn combine_pair(kind: AttributeKind, a: &AttributeValue, b: &AttributeValue) -> Option<AttributeValue> {
    match (a, b) {
        (AttributeValue::Names(x), AttributeValue::Names(y)) => TypeNames::combine([x, y]).map(AttributeValue::Names),
        (AttributeValue::Description(x), AttributeValue::Description(y)) => {
            Some(AttributeValue::Description(x.union(y).cloned().collect()))
        }
        (AttributeValue::PropertyDescription(x), AttributeValue::PropertyDescription(y)) => {
            let mut merged = x.clone();
            for (k, v) in y {
                merged.entry(k.clone()).or_default().extend(v.iter().cloned());
            }
            Some(AttributeValue::PropertyDescription(merged))
        }
        (AttributeValue::AccessorNames(x), AttributeValue::AccessorNames(y)) => {
            let mut merged = x.clone();
            merged.extend(y.clone());
            Some(AttributeValue::AccessorNames(merged))
        }
        (AttributeValue::EnumCases(x), AttributeValue::EnumCases(y)) => {
            let mut merged = x.clone();
            for (k, v) in y {
                *merged.entry(k.clone()).or_insert(0) += v;
            }
            Some(AttributeValue::EnumCases(merged))
        }
        (AttributeValue::MinMax(x), AttributeValue::MinMax(y)) => Some(AttributeValue::MinMax(MinMax {
            min: min_opt(x.min, y.min),
            max: max_opt(x.max, y.max),
        })),
        (AttributeValue::MinMaxLength(x), AttributeValue::MinMaxLength(y)) => Some(AttributeValue::MinMaxLength(MinMaxLength {
            min: match (x.min, y.min) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
            max: match (x.max, y.max) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
        })),
        (AttributeValue::Pattern(x), AttributeValue::Pattern(y)) => (x == y).then(|| AttributeValue::Pattern(x.clone())),
        (AttributeValue::UriProtocols(x), AttributeValue::UriProtocols(y)) => {
            Some(AttributeValue::UriProtocols(x.union(y).cloned().collect()))
        }
        (AttributeValue::UriExtensions(x), AttributeValue::UriExtensions(y)) => {
            Some(AttributeValue::UriExtensions(x.union(y).cloned().collect()))
        }
        (AttributeValue::StringTypes(x), AttributeValue::StringTypes(y)) => {
            let mut cases = x.cases.clone();
            for (k, v) in &y.cases {
                *cases.entry(k.clone()).or_insert(0) += v;
            }
            Some(AttributeValue::StringTypes(StringTypes {
                cases,
                transformations: x.transformations.union(&y.transformations).cloned().collect(),
            }))
        }
        (AttributeValue::UnionIdentifier(_), AttributeValue::UnionIdentifier(_)) => {
            // a combined type needs a fresh unique identity; neither input's
            // identifier is meaningful for the result.
            None
        }
        (AttributeValue::UnionMemberNames(x), AttributeValue::UnionMemberNames(y)) => {
            let mut merged = x.clone();
            for (k, v) in y {
                merged.entry(*k).or_default().extend(v.iter().cloned());
            }
            Some(AttributeValue::UnionMemberNames(merged))
        }
        (AttributeValue::Transformation(x), AttributeValue::Transformation(y)) => (x == y).then(|| a.clone()),
        (AttributeValue::Provenance(x), AttributeValue::Provenance(y)) => Some(AttributeValue::Provenance(x.union(y).cloned().collect())),
        (AttributeValue::LostTypeAttributes, AttributeValue::LostTypeAttributes) => Some(AttributeValue::LostTypeAttributes),
        _ => {
            let _ = kind;
            None
        }
    }
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// An immutable bag of attributes attached to one type.
#[derive(Debug, Clone, Default)]
pub struct TypeAttributes {
    values: BTreeMap<AttributeKind, AttributeValue>,
}

impl TypeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(value: AttributeValue) -> Self {
        let mut attrs = Self::new();
        attrs.values.insert(value.kind(), value);
        attrs
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, kind: AttributeKind) -> Option<&AttributeValue> {
        self.values.get(&kind)
    }

    pub fn names(&self) -> Option<&TypeNames> {
        match self.get(AttributeKind::Names) {
            Some(AttributeValue::Names(n)) => Some(n),
            _ => None,
        }
    }

    pub fn insert(&mut self, value: AttributeValue) {
        self.values.insert(value.kind(), value);
    }

    /// Removes `kind`'s value if present. Returns whether anything was
    /// removed, so a caller rebuilding a type under a narrower kind can tell
    /// whether it actually shed an attribute that no longer applies.
    pub fn remove(&mut self, kind: AttributeKind) -> bool {
        self.values.remove(&kind).is_some()
    }

    pub fn children(&self) -> Vec<TypeRef> {
        self.values.values().flat_map(AttributeValue::children).collect()
    }

    pub fn requires_unique_identity(&self) -> bool {
        self.values.values().any(AttributeValue::requires_unique_identity)
    }

    /// The subset of attributes that participate in type identity.
    pub fn identity_affecting(&self) -> TypeAttributes {
        TypeAttributes {
            values: self.values.iter().filter(|(k, _)| AttributeValue::in_identity(**k)).map(|(k, v)| (*k, v.clone())).collect(),
        }
    }

    /// Merges `others` into this bag's non-identity-affecting attributes;
    /// asserts no identity-affecting attribute differs from what is already
    /// present (the builder guarantees the caller only reaches this path
    /// after an identity hit).
    pub fn add_non_identity(&mut self, others: &TypeAttributes) {
        for (kind, value) in &others.values {
            if AttributeValue::in_identity(*kind) {
                continue;
            }
            match self.values.get(kind) {
                Some(existing) => {
                    if let Some(merged) = combine_pair(*kind, existing, value) {
                        self.values.insert(*kind, merged);
                    } else {
                        self.values.remove(kind);
                    }
                }
                None => {
                    self.values.insert(*kind, value.clone());
                }
            }
        }
    }

    fn combine_with(mode: impl Fn(AttributeKind, &AttributeValue, &AttributeValue) -> Option<AttributeValue>, all: &[&TypeAttributes]) -> TypeAttributes {
        let mut kinds: BTreeSet<AttributeKind> = BTreeSet::new();
        for a in all {
            kinds.extend(a.values.keys().copied());
        }

        let mut result = TypeAttributes::new();
        for kind in kinds {
            let mut acc: Option<AttributeValue> = None;
            for a in all {
                let Some(v) = a.values.get(&kind) else { continue };
                acc = match acc {
                    None => Some(v.clone()),
                    Some(prev) => mode(kind, &prev, v),
                };
                if acc.is_none() {
                    break;
                }
            }
            if let Some(v) = acc {
                result.values.insert(kind, v);
            }
        }
        result
    }

    /// Merges attributes under "union" composition (the default, and also
    /// used by `Remap` when several source types coalesce into one target).
    pub fn combine(all: &[&TypeAttributes]) -> TypeAttributes {
        Self::combine_with(combine_pair, all)
    }

    /// Merges under "intersection" composition. Reuses `combine`'s rules
    /// except numeric ranges narrow instead of widen.
    pub fn intersect(all: &[&TypeAttributes]) -> TypeAttributes {
        Self::combine_with(
            |kind, a, b| match (a, b) {
                (AttributeValue::MinMax(x), AttributeValue::MinMax(y)) => Some(AttributeValue::MinMax(MinMax {
                    min: match (x.min, y.min) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        (a, b) => a.or(b),
                    },
                    max: match (x.max, y.max) {
                        (Some(a), Some(b)) => Some(a.min(b)),
                        (a, b) => a.or(b),
                    },
                })),
                _ => combine_pair(kind, a, b),
            },
            all,
        )
    }

    pub fn make_inferred(&self) -> TypeAttributes {
        TypeAttributes {
            values: self.values.iter().filter_map(|(k, v)| v.make_inferred().map(|v| (*k, v))).collect(),
        }
    }

    pub fn increase_distance(&self) -> TypeAttributes {
        TypeAttributes {
            values: self.values.iter().filter_map(|(k, v)| v.increase_distance().map(|v| (*k, v))).collect(),
        }
    }

    pub fn reconstitute(&self, mut remap: impl FnMut(TypeRef) -> crate::error::Result<TypeRef>) -> crate::error::Result<TypeAttributes> {
        let mut values = BTreeMap::new();
        for (k, v) in &self.values {
            values.insert(*k, v.reconstitute(&mut remap)?);
        }
        Ok(TypeAttributes { values })
    }
}
