//! `InferMaps`: decides, for each class with enough properties, whether it
//! should really be a map, scoring its property names with a Markov chain.

use std::collections::BTreeSet;

use crate::attributes::TypeAttributes;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::rewriting::Reconstituter;
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::{PrimitiveKind, Type};
use crate::union_builder::UnionAccumulator;

/// `(n+2)^5/scale - 3^5/scale + 0.0025`, the power-law threshold a class's
/// geometric-mean Markov score must beat to stay a class rather than become
/// a map.
fn random_threshold(property_count: usize, scale: f64) -> f64 {
    let n = property_count as f64;
    (n + 2.0).powi(5) / scale - 3f64.powi(5) / scale + 0.0025
}

const THRESHOLD_SCALE: f64 = 6_000_000.0;

fn looks_like_digit_keys(names: &[String]) -> bool {
    names.iter().all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// True if every one of `type_refs` is a primitive string or null (used for
/// the "keep as class" short-circuit on small classes).
fn all_values_primitive_string_or_null(graph: &TypeGraph, type_refs: &[TypeRef]) -> Result<bool> {
    for &r in type_refs {
        match graph.type_of(r)? {
            Type::Primitive(PrimitiveKind::String) | Type::Primitive(PrimitiveKind::Null) => continue,
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn should_convert_to_map(graph: &TypeGraph, class: TypeRef, config: &PipelineConfig) -> Result<bool> {
    let Type::Class { contents: Some(contents), .. } = graph.type_of(class)? else {
        return Ok(false);
    };
    if contents.properties.len() < 2 {
        return Ok(false);
    }

    let names: Vec<String> = contents.properties.keys().cloned().collect();
    if looks_like_digit_keys(&names) {
        return Ok(true);
    }

    let value_refs: Vec<TypeRef> = contents.properties.values().map(|p| p.type_ref).collect();
    if names.len() < 3 && all_values_primitive_string_or_null(graph, &value_refs)? {
        return Ok(false);
    }

    let Some(markov) = &config.markov else {
        return Ok(false);
    };

    let threshold = random_threshold(names.len(), THRESHOLD_SCALE);
    let avg_score = markov.score(&names.join(" "));
    if avg_score >= threshold {
        return Ok(false);
    }

    structurally_compatible_values(graph, &value_refs, config.conflate_numbers)
}

pub(crate) fn structurally_compatible_values(graph: &TypeGraph, refs: &[TypeRef], conflate_numbers: bool) -> Result<bool> {
    let non_null: Vec<TypeRef> = refs
        .iter()
        .copied()
        .filter(|r| !matches!(graph.type_of(*r), Ok(Type::Primitive(PrimitiveKind::Null))))
        .collect();
    if non_null.len() <= 1 {
        return Ok(true);
    }
    let mut queue: std::collections::VecDeque<(TypeRef, TypeRef)> = std::collections::VecDeque::new();
    let first = non_null[0];
    for &other in &non_null[1..] {
        queue.push_back((first, other));
    }
    let mut visited = BTreeSet::new();
    while let Some((a, b)) = queue.pop_front() {
        let key = (a.min(b), a.max(b));
        if !visited.insert(key) {
            continue;
        }
        let ta = graph.type_of(a)?;
        let tb = graph.type_of(b)?;
        if !ta.structural_equality_step(tb, conflate_numbers, &mut queue) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Runs `InferMaps` over every class in `graph`, converting each that
/// `should_convert_to_map` approves into a map over the union of its
/// property value types. Returns the rewritten graph and whether any
/// conversion happened.
pub fn infer_maps(graph: &TypeGraph, config: &PipelineConfig) -> Result<(TypeGraph, bool)> {
    let mut candidates = vec![];
    for r in graph.all_types_unordered() {
        if matches!(graph.type_of(r)?, Type::Class { .. }) && should_convert_to_map(graph, r, config)? {
            candidates.push(r);
        }
    }

    if candidates.is_empty() {
        return Ok((crate::rewriting::remap(graph, &std::collections::BTreeMap::new())?, false));
    }

    let candidate_set: BTreeSet<TypeRef> = candidates.iter().copied().collect();
    let mut reconstituter = Reconstituter::new(graph);

    for &class in &candidates {
        let Type::Class { contents: Some(contents), .. } = graph.type_of(class)? else { unreachable!() };
        let value_refs: Vec<TypeRef> = contents.properties.values().map(|p| p.type_ref).collect();

        let mut accumulator = UnionAccumulator::new();
        for &v in &value_refs {
            accumulator.add(graph, v)?;
        }
        let accumulator = accumulator.reconcile(config.conflate_numbers);
        let values = if accumulator.is_empty() {
            reconstituter.builder().get_primitive_type(PrimitiveKind::Any, TypeAttributes::new())?
        } else {
            accumulator.into_builder().build(&mut reconstituter, graph, false)?
        };

        let own_attrs = graph.attributes_of(class)?.clone();
        let reconstituted_own = own_attrs.reconstitute(|child| reconstituter.reconstitute(child))?;

        let map_ref = reconstituter.builder().get_map_type(reconstituted_own, values)?;
        reconstituter.seed(class, map_ref);
    }

    for r in graph.all_types_unordered() {
        if candidate_set.contains(&r) {
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
