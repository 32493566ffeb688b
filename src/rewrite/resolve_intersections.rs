//! `ResolveIntersections`: narrows an intersection of canonical unions (or
//! plain types) down to whatever kinds are actually common to every member.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::attributes::TypeAttributes;
use crate::error::{Error, Result};
use crate::rewriting::Reconstituter;
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::{ClassProperty, PrimitiveKind, Type};
use crate::union_builder::AccumulatedKind;

fn kind_of(ty: &Type) -> Result<AccumulatedKind> {
    Ok(match ty {
        Type::Primitive(p) => AccumulatedKind::Primitive(*p),
        Type::Array(_) => AccumulatedKind::Array,
        Type::Class { .. } | Type::Map(_) | Type::Object(_) => AccumulatedKind::Object,
        Type::Enum(_) => AccumulatedKind::Enum,
        Type::Union(_) | Type::Intersection(_) => {
            return Err(Error::Internal("unexpected union/intersection while classifying an intersection member".to_string()));
        }
    })
}

/// Per-kind leaf refs a single intersection member offers: its own kind for
/// a plain type, or one entry per sub-member for an already-canonical union.
/// `None` means this member isn't resolvable yet (an intersection, or a
/// union that itself hasn't been flattened).
fn member_kind_map(graph: &TypeGraph, member: TypeRef) -> Result<Option<BTreeMap<AccumulatedKind, TypeRef>>> {
    match graph.type_of(member)? {
        Type::Union(Some(sub)) => {
            let mut map = BTreeMap::new();
            for &s in sub {
                match graph.type_of(s)? {
                    Type::Union(_) | Type::Intersection(_) => return Ok(None),
                    other => {
                        map.insert(kind_of(other)?, s);
                    }
                }
            }
            Ok(Some(map))
        }
        Type::Union(None) => Ok(None),
        Type::Intersection(_) => Ok(None),
        other => {
            let mut map = BTreeMap::new();
            map.insert(kind_of(other)?, member);
            Ok(Some(map))
        }
    }
}

/// Resolves a set of refs that must all hold simultaneously to one ref:
/// the identity if there's only one distinct ref, otherwise a fresh
/// intersection left for the next pass iteration to narrow further.
fn intersect_children(reconstituter: &mut Reconstituter<'_>, refs: &[TypeRef]) -> Result<TypeRef> {
    let distinct: std::collections::BTreeSet<TypeRef> = refs.iter().copied().collect();
    let resolved: Result<std::collections::BTreeSet<TypeRef>> = distinct.iter().map(|&r| reconstituter.reconstitute(r)).collect();
    let resolved = resolved?;
    if resolved.len() == 1 {
        return Ok(*resolved.iter().next().unwrap());
    }
    reconstituter.builder().get_intersection_type(TypeAttributes::new(), resolved)
}

fn build_object_intersection(reconstituter: &mut Reconstituter<'_>, graph: &TypeGraph, refs: &[TypeRef], attrs: TypeAttributes) -> Result<TypeRef> {
    let member_count = refs.len();
    let mut properties: IndexMap<String, (Vec<TypeRef>, usize)> = IndexMap::new();
    let mut additionals = vec![];

    for &r in refs {
        match graph.type_of(r)? {
            Type::Class { contents: Some(c), .. } | Type::Object(Some(c)) => {
                for (name, prop) in &c.properties {
                    let entry = properties.entry(name.clone()).or_insert_with(|| (vec![], 0));
                    entry.0.push(prop.type_ref);
                    if !prop.optional {
                        entry.1 += 1;
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

    let mut merged = IndexMap::new();
    for (name, (refs, required_count)) in properties {
        let type_ref = intersect_children(reconstituter, &refs)?;
        merged.insert(name, ClassProperty { type_ref, optional: required_count < member_count });
    }
    let additional = if additionals.is_empty() { None } else { Some(intersect_children(reconstituter, &additionals)?) };

    reconstituter.builder().get_unique_object_type(attrs, Some(merged), additional)
}

/// Runs `ResolveIntersections` once over `graph`.
pub fn resolve_intersections(graph: &TypeGraph) -> Result<(TypeGraph, bool)> {
    let mut plans = vec![];

    'outer: for r in graph.all_types_unordered() {
        let Type::Intersection(Some(members)) = graph.type_of(r)? else { continue };
        let mut per_member = vec![];
        for &m in members {
            match member_kind_map(graph, m)? {
                Some(map) => per_member.push(map),
                None => continue 'outer,
            }
        }
        plans.push((r, per_member));
    }

    if plans.is_empty() {
        return Ok((crate::rewriting::remap(graph, &std::collections::BTreeMap::new())?, false));
    }

    let planned: std::collections::BTreeSet<TypeRef> = plans.iter().map(|(r, _)| *r).collect();
    let mut reconstituter = Reconstituter::new(graph);

    for (r, per_member) in &plans {
        let mut common: Vec<AccumulatedKind> = per_member[0].keys().copied().collect();
        common.retain(|k| per_member.iter().all(|m| m.contains_key(k)));

        let mut built = vec![];
        for kind in &common {
            let refs: Vec<TypeRef> = per_member.iter().map(|m| m[kind]).collect();
            let attrs = TypeAttributes::intersect(&refs.iter().map(|r| graph.attributes_of(*r)).collect::<Result<Vec<_>>>()?);
            let ref_ = match kind {
                AccumulatedKind::Primitive(p) => reconstituter.builder().get_primitive_type(*p, attrs)?,
                AccumulatedKind::Enum => {
                    let mut cases: Option<std::collections::BTreeSet<String>> = None;
                    for &m in &refs {
                        if let Type::Enum(c) = graph.type_of(m)? {
                            cases = Some(match cases {
                                None => c.clone(),
                                Some(existing) => existing.intersection(c).cloned().collect(),
                            });
                        }
                    }
                    let cases = cases.unwrap_or_default();
                    if cases.is_empty() {
                        continue;
                    }
                    reconstituter.builder().get_enum_type(attrs, cases)?
                }
                AccumulatedKind::Array => {
                    let mut items = vec![];
                    for &m in &refs {
                        if let Type::Array(Some(item)) = graph.type_of(m)? {
                            items.push(*item);
                        }
                    }
                    let item = intersect_children(&mut reconstituter, &items)?;
                    reconstituter.builder().get_array_type(attrs, Some(item))?
                }
                AccumulatedKind::Object => build_object_intersection(&mut reconstituter, graph, &refs, attrs)?,
            };
            built.push(ref_);
        }

        let own_attrs = graph.attributes_of(*r)?.clone();
        let reconstituted_own = own_attrs.reconstitute(|child| reconstituter.reconstitute(child))?;

        let result = match built.len() {
            0 => reconstituter.builder().get_primitive_type(PrimitiveKind::None, TypeAttributes::new())?,
            1 => built[0],
            _ => reconstituter.builder().get_intersection_type(TypeAttributes::new(), built)?,
        };
        reconstituter.builder().add_attributes(result, reconstituted_own)?;
        reconstituter.seed(*r, result);
    }

    for r in graph.all_types_unordered() {
        if planned.contains(&r) {
            continue;
        }
        reconstituter.reconstitute(r)?;
    }

    for (name, &r) in graph.top_levels() {
        let target = reconstituter.reconstitute(r)?;
        reconstituter.builder().add_top_level(name.clone(), target)?;
    }

    Ok((reconstituter.into_builder().finish()?, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TypeBuilder;

    #[test]
    fn intersection_of_overlapping_primitives_narrows_to_one() {
        let mut builder = TypeBuilder::new();
        let int = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let bool_ = builder.get_primitive_type(PrimitiveKind::Bool, TypeAttributes::new()).unwrap();
        let left = builder.get_union_type(TypeAttributes::new(), [int, str_]).unwrap();
        let right = builder.get_union_type(TypeAttributes::new(), [int, bool_]).unwrap();
        let inter = builder.get_unique_intersection_type(TypeAttributes::new(), Some([left, right].into_iter().collect())).unwrap();
        builder.add_top_level("Both", inter).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, changed) = resolve_intersections(&graph).unwrap();
        assert!(changed);
        let top = *rewritten.top_levels().get("Both").unwrap();
        assert!(matches!(rewritten.type_of(top).unwrap(), Type::Primitive(PrimitiveKind::Integer)));
    }

    #[test]
    fn non_intersection_graph_reports_no_change() {
        let mut builder = TypeBuilder::new();
        let int = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        builder.add_top_level("Int", int).unwrap();
        let graph = builder.finish().unwrap();

        let (_, changed) = resolve_intersections(&graph).unwrap();
        assert!(!changed);
    }
}
