//! `CombineClasses`: greedily cliques together classes whose property sets
//! overlap enough and whose common properties agree structurally, then
//! merges each clique into one class.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::attributes::TypeAttributes;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::inference::infer_maps::structurally_compatible_values;
use crate::rewriting::Reconstituter;
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::{ClassProperty, PrimitiveKind, Type};

fn leaf_alternatives(graph: &TypeGraph, r: TypeRef) -> Result<Vec<TypeRef>> {
    match graph.type_of(r)? {
        Type::Union(Some(members)) => Ok(members.iter().copied().collect()),
        Type::Primitive(PrimitiveKind::Null) => Ok(vec![]),
        _ => Ok(vec![r]),
    }
}

fn overlap(a: &IndexMap<String, ClassProperty>, b: &IndexMap<String, ClassProperty>) -> f64 {
    let shared = a.keys().filter(|k| b.contains_key(*k)).count();
    let larger = a.len().max(b.len()).max(1);
    shared as f64 / larger as f64
}

fn common_properties_compatible(graph: &TypeGraph, a: &IndexMap<String, ClassProperty>, b: &IndexMap<String, ClassProperty>, conflate_numbers: bool) -> Result<bool> {
    for (name, prop_a) in a {
        let Some(prop_b) = b.get(name) else { continue };
        let mut leaves = leaf_alternatives(graph, prop_a.type_ref)?;
        leaves.extend(leaf_alternatives(graph, prop_b.type_ref)?);
        if !structurally_compatible_values(graph, &leaves, conflate_numbers)? {
            return Ok(false);
        }
    }
    Ok(true)
}

struct Clique {
    prototypes: Vec<usize>,
    members: Vec<usize>,
}

/// Runs `CombineClasses` once over `graph`. Returns the rewritten graph and
/// whether any clique of size >1 was found.
pub fn combine_classes(graph: &TypeGraph, config: &PipelineConfig) -> Result<(TypeGraph, bool)> {
    let mut classes: Vec<(TypeRef, IndexMap<String, ClassProperty>)> = vec![];
    for r in graph.all_types_unordered() {
        if let Type::Class { contents: Some(c), .. } = graph.type_of(r)? {
            if c.properties.len() >= config.combine_classes_min_properties {
                classes.push((r, c.properties.clone()));
            }
        }
    }

    let mut cliques: Vec<Clique> = vec![];
    for (idx, (_, props)) in classes.iter().enumerate() {
        let mut joined = false;
        for clique in cliques.iter_mut() {
            let similar_to_any_prototype = clique
                .prototypes
                .iter()
                .any(|&p| overlap(&classes[p].1, props) >= config.combine_classes_required_overlap);
            if similar_to_any_prototype {
                let compatible_with_any = clique.members.iter().any(|&m| common_properties_compatible(graph, &classes[m].1, props, config.conflate_numbers).unwrap_or(false));
                clique.members.push(idx);
                if compatible_with_any {
                    clique.prototypes.push(idx);
                }
                joined = true;
                break;
            }
        }
        if !joined {
            cliques.push(Clique { prototypes: vec![idx], members: vec![idx] });
        }
    }

    let merge_groups: Vec<&Clique> = cliques.iter().filter(|c| c.members.len() > 1).collect();
    if merge_groups.is_empty() {
        return Ok((crate::rewriting::remap(graph, &std::collections::BTreeMap::new())?, false));
    }

    let mut reconstituter = Reconstituter::new(graph);
    let merge_sets: Vec<Vec<TypeRef>> = merge_groups.iter().map(|c| c.members.iter().map(|&i| classes[i].0).collect()).collect();
    let merged_refs = merge_classes(graph, &mut reconstituter, &merge_sets)?;

    let mut planned = std::collections::BTreeSet::new();
    for (set, merged) in merge_sets.iter().zip(merged_refs) {
        for &m in set {
            reconstituter.seed(m, merged);
            planned.insert(m);
        }
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

fn merge_classes(graph: &TypeGraph, reconstituter: &mut Reconstituter<'_>, sets: &[Vec<TypeRef>]) -> Result<Vec<TypeRef>> {
    let mut results = vec![];
    for members in sets {
        let mut properties: IndexMap<String, (Vec<TypeRef>, usize)> = IndexMap::new();
        let member_count = members.len();
        let mut own_attrs = vec![];
        for &m in members {
            let Type::Class { contents: Some(c), .. } = graph.type_of(m)? else { unreachable!() };
            own_attrs.push(graph.attributes_of(m)?.clone());
            for (name, prop) in &c.properties {
                let entry = properties.entry(name.clone()).or_insert_with(|| (vec![], 0));
                entry.0.push(prop.type_ref);
                if !prop.optional {
                    entry.1 += 1;
                }
            }
        }

        let mut merged_properties = IndexMap::new();
        for (name, (refs, required_count)) in properties {
            let distinct: std::collections::BTreeSet<TypeRef> = refs.iter().copied().collect();
            let type_ref = if distinct.len() == 1 {
                reconstituter.reconstitute(*distinct.iter().next().unwrap())?
            } else {
                let mut accumulator = crate::union_builder::UnionAccumulator::new();
                for &r in &distinct {
                    accumulator.add(graph, r)?;
                }
                accumulator.reconcile(true).into_builder().build(reconstituter, graph, false)?
            };
            merged_properties.insert(name, ClassProperty { type_ref, optional: required_count < member_count });
        }

        let attrs_refs: Vec<&TypeAttributes> = own_attrs.iter().collect();
        let combined_attrs = TypeAttributes::combine(&attrs_refs);
        let reconstituted_attrs = combined_attrs.reconstitute(|child| reconstituter.reconstitute(child))?;

        let merged = reconstituter.builder().get_unique_class_type(reconstituted_attrs, true, Some(merged_properties))?;
        results.push(merged);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TypeBuilder;

    #[test]
    fn similar_classes_merge_into_one() {
        let mut builder = TypeBuilder::new();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let int = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();

        let mut props_a = IndexMap::new();
        props_a.insert("name".to_string(), ClassProperty { type_ref: str_, optional: false });
        props_a.insert("age".to_string(), ClassProperty { type_ref: int, optional: false });
        let a = builder.get_class_type(TypeAttributes::new(), props_a).unwrap();

        let mut props_b = IndexMap::new();
        props_b.insert("name".to_string(), ClassProperty { type_ref: str_, optional: false });
        props_b.insert("age".to_string(), ClassProperty { type_ref: int, optional: true });
        let b = builder.get_unique_class_type(TypeAttributes::new(), true, Some(props_b)).unwrap();

        builder.add_top_level("A", a).unwrap();
        builder.add_top_level("B", b).unwrap();
        let graph = builder.finish().unwrap();

        let config = PipelineConfig::default();
        let (rewritten, changed) = combine_classes(&graph, &config).unwrap();
        assert!(changed);
        let a2 = *rewritten.top_levels().get("A").unwrap();
        let b2 = *rewritten.top_levels().get("B").unwrap();
        assert_eq!(a2, b2);
    }

    #[test]
    fn dissimilar_classes_stay_separate() {
        let mut builder = TypeBuilder::new();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();

        let mut props_a = IndexMap::new();
        props_a.insert("name".to_string(), ClassProperty { type_ref: str_, optional: false });
        let a = builder.get_class_type(TypeAttributes::new(), props_a).unwrap();

        let mut props_b = IndexMap::new();
        props_b.insert("totallyDifferent".to_string(), ClassProperty { type_ref: str_, optional: false });
        let b = builder.get_unique_class_type(TypeAttributes::new(), true, Some(props_b)).unwrap();

        builder.add_top_level("A", a).unwrap();
        builder.add_top_level("B", b).unwrap();
        let graph = builder.finish().unwrap();

        let config = PipelineConfig::default();
        let (_, changed) = combine_classes(&graph, &config).unwrap();
        assert!(!changed);
    }
}
