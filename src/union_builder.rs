//! Two-phase union construction: an `Accumulator` that partitions fed types
//! (read from a source graph) by kind and merges their attributes, and a
//! `Builder` phase that materializes the final type, resolving any
//! structural children through a caller-supplied `resolve` callback (so this
//! can run either against a frozen graph directly, or inside a
//! [`crate::rewriting::Reconstituter`] during a rewrite pass).

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use crate::attributes::TypeAttributes;
use crate::builder::TypeBuilder;
use crate::error::{Error, Result};
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::{ClassProperty, PrimitiveKind, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccumulatedKind {
    Primitive(PrimitiveKind),
    Array,
    /// object/class/map are collapsed to one bucket during accumulation;
    /// `CombineClasses`/`ReplaceObjectType` decide the final shape later.
    Object,
    Enum,
}

/// Phase 1: callers feed member types (refs into `graph`) one at a time.
#[derive(Default)]
pub struct UnionAccumulator {
    kinds: BTreeMap<AccumulatedKind, Vec<TypeRef>>,
    attrs: BTreeMap<AccumulatedKind, TypeAttributes>,
    /// Raised when an `any` member absorbed other kinds, losing their
    /// structural distinctions (their attributes survive, merged onto `any`).
    pub lost_type_attributes: bool,
}

impl UnionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, graph: &TypeGraph, member: TypeRef) -> Result<()> {
        let ty = graph.type_of(member)?;
        let attrs = graph.attributes_of(member)?.clone();
        let kind = match ty {
            Type::Primitive(p) => AccumulatedKind::Primitive(*p),
            Type::Array(_) => AccumulatedKind::Array,
            Type::Class { .. } | Type::Map(_) | Type::Object(_) => AccumulatedKind::Object,
            Type::Enum(_) => AccumulatedKind::Enum,
            Type::Union(_) | Type::Intersection(_) => {
                return Err(Error::Internal("UnionAccumulator.add requires a flattened (non-union) member".to_string()));
            }
        };
        self.kinds.entry(kind).or_default().push(member);
        let entry = self.attrs.entry(kind).or_default();
        *entry = TypeAttributes::combine(&[entry, &attrs]);
        Ok(())
    }

    /// Applies the kind-reconciliation rules described for accumulation:
    /// numeric conflation, `any`-absorption. Map/class reconciliation (a
    /// `map` present alongside `object`/`class` moving to `class`) and
    /// enum/string reconciliation are handled by `CombineClasses` and
    /// `FlattenStrings` respectively, since both need more structural
    /// context than the accumulator carries.
    pub fn reconcile(mut self, conflate_numbers: bool) -> Self {
        if conflate_numbers {
            if let Some(integer_attrs) = self.attrs.remove(&AccumulatedKind::Primitive(PrimitiveKind::Integer)) {
                let integer_members = self.kinds.remove(&AccumulatedKind::Primitive(PrimitiveKind::Integer)).unwrap_or_default();
                if self.kinds.contains_key(&AccumulatedKind::Primitive(PrimitiveKind::Double)) {
                    let double_attrs = self.attrs.entry(AccumulatedKind::Primitive(PrimitiveKind::Double)).or_default();
                    *double_attrs = TypeAttributes::combine(&[double_attrs, &integer_attrs]);
                    self.kinds.entry(AccumulatedKind::Primitive(PrimitiveKind::Double)).or_default().extend(integer_members);
                } else {
                    self.kinds.insert(AccumulatedKind::Primitive(PrimitiveKind::Integer), integer_members);
                    self.attrs.insert(AccumulatedKind::Primitive(PrimitiveKind::Integer), integer_attrs);
                }
            }
        }

        if self.kinds.contains_key(&AccumulatedKind::Primitive(PrimitiveKind::Any)) {
            let mut merged_members = vec![];
            let mut merged_attrs: Vec<TypeAttributes> = vec![];
            for (_, members) in std::mem::take(&mut self.kinds) {
                merged_members.extend(members);
            }
            for (_, a) in std::mem::take(&mut self.attrs) {
                merged_attrs.push(a);
            }
            let refs: Vec<&TypeAttributes> = merged_attrs.iter().collect();
            self.lost_type_attributes = merged_members.len() > 1;
            self.kinds.insert(AccumulatedKind::Primitive(PrimitiveKind::Any), merged_members);
            self.attrs.insert(AccumulatedKind::Primitive(PrimitiveKind::Any), TypeAttributes::combine(&refs));
        }

        self
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn into_builder(self) -> UnionBuilderPhase {
        UnionBuilderPhase { kinds: self.kinds, attrs: self.attrs }
    }
}

/// Where a union/member type is materialized: gives access to the
/// destination builder and translates a child ref from `graph` into that
/// builder's graph. A single trait (rather than separate `builder`/`resolve`
/// parameters) because both need mutable access to the same underlying
/// state when building during a rewrite pass (a
/// [`crate::rewriting::Reconstituter`] owns both), and Rust can't lend two
/// `&mut` borrows into one value through two separate parameters.
pub trait UnionTarget {
    fn builder(&mut self) -> &mut TypeBuilder;
    fn resolve(&mut self, r: TypeRef) -> Result<TypeRef>;
}

/// Builds directly against a frozen graph: every child ref is already valid
/// in the destination, so resolution is the identity function.
pub struct DirectTarget<'b> {
    pub builder: &'b mut TypeBuilder,
}

impl<'b> UnionTarget for DirectTarget<'b> {
    fn builder(&mut self) -> &mut TypeBuilder {
        self.builder
    }

    fn resolve(&mut self, r: TypeRef) -> Result<TypeRef> {
        Ok(r)
    }
}

/// Phase 2: materializes the final type from the accumulated kinds. `graph`
/// is the source graph the accumulated member refs belong to.
pub struct UnionBuilderPhase {
    kinds: BTreeMap<AccumulatedKind, Vec<TypeRef>>,
    attrs: BTreeMap<AccumulatedKind, TypeAttributes>,
}

impl UnionBuilderPhase {
    pub fn build(self, target: &mut dyn UnionTarget, graph: &TypeGraph, unique: bool) -> Result<TypeRef> {
        if self.kinds.len() == 1 {
            let (&kind, members) = self.kinds.iter().next().unwrap();
            let attrs = self.attrs.get(&kind).cloned().unwrap_or_default().increase_distance();
            return build_kind(target, graph, kind, members, attrs);
        }

        let mut members = BTreeSet::new();
        for (&kind, member_refs) in &self.kinds {
            let attrs = self.attrs.get(&kind).cloned().unwrap_or_default();
            members.insert(build_kind(target, graph, kind, member_refs, attrs)?);
        }

        if unique {
            target.builder().get_unique_union_type(TypeAttributes::new(), Some(members))
        } else {
            target.builder().get_union_type(TypeAttributes::new(), members)
        }
    }
}

fn build_kind(target: &mut dyn UnionTarget, graph: &TypeGraph, kind: AccumulatedKind, members: &[TypeRef], attrs: TypeAttributes) -> Result<TypeRef> {
    match kind {
        AccumulatedKind::Primitive(p) => target.builder().get_primitive_type(p, attrs),
        AccumulatedKind::Enum => {
            let mut cases = BTreeSet::new();
            for &m in members {
                if let Type::Enum(c) = graph.type_of(m)? {
                    cases.extend(c.iter().cloned());
                }
            }
            target.builder().get_enum_type(attrs, cases)
        }
        AccumulatedKind::Array => {
            let mut items = vec![];
            for &m in members {
                if let Type::Array(Some(item)) = graph.type_of(m)? {
                    items.push(*item);
                }
            }
            let item = merge_item_types(target, graph, &items)?;
            target.builder().get_array_type(attrs, Some(item))
        }
        AccumulatedKind::Object => {
            let mut properties: IndexMap<String, (Vec<TypeRef>, bool)> = IndexMap::new();
            let mut additionals = vec![];
            let member_count = members.len();
            for &m in members {
                let ty = graph.type_of(m)?;
                match ty {
                    Type::Class { contents: Some(c), .. } | Type::Object(Some(c)) => {
                        for (name, prop) in &c.properties {
                            let entry = properties.entry(name.clone()).or_insert_with(|| (vec![], false));
                            entry.0.push(prop.type_ref);
                            if prop.optional {
                                entry.1 = true;
                            }
                        }
                        if let Some(a) = c.additional {
                            additionals.push(a);
                        }
                    }
                    Type::Map(values) => additionals.push(*values),
                    _ => {}
                }
            }

            for (_, (seen, optional)) in properties.iter_mut() {
                if seen.len() < member_count {
                    *optional = true;
                }
            }

            let mut merged_properties = IndexMap::new();
            for (name, (refs, optional)) in properties {
                let type_ref = merge_item_types(target, graph, &refs)?;
                merged_properties.insert(name, ClassProperty { type_ref, optional });
            }
            let additional = if additionals.is_empty() { None } else { Some(merge_item_types(target, graph, &additionals)?) };

            target.builder().get_unique_object_type(attrs, Some(merged_properties), additional)
        }
    }
}

/// Merges a set of item/property/additional type refs (possibly just one)
/// into a single resolved ref, building a union when more than one distinct
/// ref is present.
fn merge_item_types(target: &mut dyn UnionTarget, graph: &TypeGraph, refs: &[TypeRef]) -> Result<TypeRef> {
    let distinct: BTreeSet<TypeRef> = refs.iter().copied().collect();
    if distinct.len() == 1 {
        return target.resolve(*distinct.iter().next().unwrap());
    }

    let mut accumulator = UnionAccumulator::new();
    for &r in &distinct {
        accumulator.add(graph, r)?;
    }
    accumulator.reconcile(true).into_builder().build(target, graph, false)
}
