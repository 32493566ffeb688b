//! `FlattenUnions`: collapses nested unions into a single canonical union
//! per distinct (recursively expanded) member set.

use std::collections::BTreeSet;

use crate::rewriting::Reconstituter;
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::Type;
use crate::union_builder::UnionAccumulator;

/// Recursively expands `members` through any nested unions. Returns `None`
/// if an intersection is reachable anywhere in the expansion (left for
/// `resolve_intersections` to deal with first).
fn flatten_members(graph: &TypeGraph, members: &BTreeSet<TypeRef>) -> crate::error::Result<Option<BTreeSet<TypeRef>>> {
    let mut result = BTreeSet::new();
    let mut stack: Vec<TypeRef> = members.iter().copied().collect();
    let mut seen_unions = BTreeSet::new();

    while let Some(m) = stack.pop() {
        match graph.type_of(m)? {
            Type::Union(Some(nested)) => {
                if seen_unions.insert(m) {
                    stack.extend(nested.iter().copied());
                }
            }
            Type::Intersection(_) => return Ok(None),
            _ => {
                result.insert(m);
            }
        }
    }
    Ok(Some(result))
}

/// Runs `FlattenUnions` once over `graph`. Returns the rewritten graph and
/// whether any union actually needed flattening.
pub fn flatten_unions(graph: &TypeGraph, conflate_numbers: bool) -> crate::error::Result<(TypeGraph, bool)> {
    let mut plans: Vec<(TypeRef, BTreeSet<TypeRef>)> = vec![];
    let mut changed = false;

    for r in graph.all_types_unordered() {
        let Type::Union(Some(members)) = graph.type_of(r)? else { continue };
        let Some(flat) = flatten_members(graph, members)? else { continue };
        if flat != *members {
            changed = true;
        }
        plans.push((r, flat));
    }

    if !changed {
        return Ok((crate::rewriting::remap(graph, &std::collections::BTreeMap::new())?, false));
    }

    let planned: BTreeSet<TypeRef> = plans.iter().map(|(r, _)| *r).collect();
    let mut reconstituter = Reconstituter::new(graph);

    for (r, flat) in &plans {
        let mut accumulator = UnionAccumulator::new();
        for &m in flat {
            accumulator.add(graph, m)?;
        }
        let built = accumulator.reconcile(conflate_numbers).into_builder().build(&mut reconstituter, graph, false)?;

        let own_attrs = graph.attributes_of(*r)?.clone();
        let reconstituted = own_attrs.reconstitute(|child| reconstituter.reconstitute(child))?;
        reconstituter.builder().add_attributes(built, reconstituted)?;

        reconstituter.seed(*r, built);
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
    use crate::attributes::TypeAttributes;
    use crate::builder::TypeBuilder;
    use crate::types::PrimitiveKind;

    #[test]
    fn nested_union_flattens_to_one_level() {
        let mut builder = TypeBuilder::new();
        let int = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let bool_ = builder.get_primitive_type(PrimitiveKind::Bool, TypeAttributes::new()).unwrap();
        let inner = builder.get_union_type(TypeAttributes::new(), [int, str_]).unwrap();
        let outer = builder.get_unique_union_type(TypeAttributes::new(), Some([inner, bool_].into_iter().collect())).unwrap();
        builder.add_top_level("Outer", outer).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, changed) = flatten_unions(&graph, true).unwrap();
        assert!(changed);
        let top = *rewritten.top_levels().get("Outer").unwrap();
        let Type::Union(Some(members)) = rewritten.type_of(top).unwrap() else { panic!("expected union") };
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn already_flat_union_reports_no_change() {
        let mut builder = TypeBuilder::new();
        let int = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let u = builder.get_union_type(TypeAttributes::new(), [int, str_]).unwrap();
        builder.add_top_level("U", u).unwrap();
        let graph = builder.finish().unwrap();

        let (_, changed) = flatten_unions(&graph, true).unwrap();
        assert!(!changed);
    }
}
