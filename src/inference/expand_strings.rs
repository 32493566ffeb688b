//! `ExpandStrings`: rebuilds restricted-string types (ones carrying a
//! `StringTypes` attribute) as enums, transformation primitives, or plain
//! strings, depending on how distinctive their observed cases are.

use std::collections::{BTreeMap, BTreeSet};

use crate::attributes::{AttributeKind, AttributeValue, StringTypes, TypeAttributes};
use crate::config::{PipelineConfig, StringEnumInference};
use crate::error::Result;
use crate::rewriting::Reconstituter;
use crate::transform::Transformer;
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::Type;

fn is_own_enum(cases: &BTreeMap<String, usize>, config: &PipelineConfig) -> bool {
    match config.string_enum_inference {
        StringEnumInference::All => !cases.is_empty(),
        StringEnumInference::None => false,
        StringEnumInference::Infer => {
            let total: usize = cases.values().sum();
            total >= config.min_length_for_enum && (cases.len() as f64) < (total as f64).sqrt()
        }
    }
}

fn overlap_fraction(cases: &BTreeMap<String, usize>, candidate: &BTreeSet<String>) -> f64 {
    if cases.is_empty() {
        return 0.0;
    }
    let shared = cases.keys().filter(|k| candidate.contains(*k)).count();
    shared as f64 / cases.len() as f64
}

/// Runs `ExpandStrings` over every restricted-string type in `graph`.
/// Returns the rewritten graph and whether anything actually changed.
pub fn expand_strings(graph: &TypeGraph, config: &PipelineConfig) -> Result<(TypeGraph, bool)> {
    if config.string_enum_inference == StringEnumInference::None {
        return Ok((crate::rewriting::remap(graph, &BTreeMap::new())?, false));
    }

    let mut candidates: Vec<(TypeRef, StringTypes)> = vec![];
    for r in graph.all_types_unordered() {
        if !matches!(graph.type_of(r)?, Type::Primitive(crate::types::PrimitiveKind::String)) {
            continue;
        }
        if let Some(AttributeValue::StringTypes(st)) = graph.attributes_of(r)?.get(AttributeKind::StringTypes) {
            if !st.cases.is_empty() || !st.transformations.is_empty() {
                candidates.push((r, st.clone()));
            }
        }
    }

    if candidates.is_empty() {
        return Ok((crate::rewriting::remap(graph, &BTreeMap::new())?, false));
    }

    // First pass: types whose case-set is distinctive enough to be its own
    // enum become the canonical sets later, smaller case-sets can merge
    // into.
    let mut canonical_sets: Vec<BTreeSet<String>> = vec![];
    let mut own_enum: BTreeSet<TypeRef> = BTreeSet::new();
    for (r, st) in &candidates {
        if is_own_enum(&st.cases, config) {
            own_enum.insert(*r);
            canonical_sets.push(st.cases.keys().cloned().collect());
        }
    }

    // Second pass: merge compatible leftover case-sets into a canonical set.
    let mut merge_target: BTreeMap<TypeRef, usize> = BTreeMap::new();
    if config.string_enum_inference == StringEnumInference::Infer {
        for (r, st) in &candidates {
            if own_enum.contains(r) {
                continue;
            }
            let total: usize = st.cases.values().sum();
            if total < config.min_length_for_overlap {
                continue;
            }
            if let Some((idx, _)) = canonical_sets
                .iter()
                .enumerate()
                .find(|(_, set)| overlap_fraction(&st.cases, set) >= config.required_overlap)
            {
                merge_target.insert(*r, idx);
            }
        }
    }

    let mut reconstituter = Reconstituter::new(graph);
    let mut any_changed = false;
    for (r, st) in &candidates {
        let mut members = vec![];

        if own_enum.contains(r) {
            members.push(reconstituter.builder().get_enum_type(TypeAttributes::new(), st.cases.keys().cloned())?);
        } else if let Some(&idx) = merge_target.get(r) {
            members.push(reconstituter.builder().get_enum_type(TypeAttributes::new(), canonical_sets[idx].iter().cloned())?);
        }

        for transformation in &st.transformations {
            let kind = transformation_primitive(transformation);
            let tree_attrs = TypeAttributes::single(AttributeValue::Transformation(Transformer::leaf(transformation.clone())));
            members.push(reconstituter.builder().get_primitive_type(kind, tree_attrs)?);
        }

        // A case-set too small/non-distinctive to become its own enum (and
        // with no recognized transformation) falls back to a plain string.
        let stays_plain_string = members.is_empty();
        if stays_plain_string {
            members.push(reconstituter.builder().get_string_type(TypeAttributes::new())?);
        }

        let replacement = if members.len() == 1 {
            members[0]
        } else {
            reconstituter.builder().get_union_type(TypeAttributes::new(), members)?
        };

        let own_attrs = graph.attributes_of(*r)?.clone();
        let mut reconstituted_own = own_attrs.reconstitute(|child| reconstituter.reconstitute(child))?;

        if stays_plain_string {
            // The `StringTypes` attribute is what made `r` a candidate in
            // the first place; it must not survive onto a plain string or
            // the next pass would see the same candidate again and this
            // pass would never reach a fixpoint.
            if reconstituted_own.remove(AttributeKind::StringTypes) {
                any_changed = true;
            }
        } else {
            any_changed = true;
        }

        reconstituter.builder().add_attributes(replacement, reconstituted_own)?;
        reconstituter.seed(*r, replacement);
    }

    let candidate_set: BTreeSet<TypeRef> = candidates.iter().map(|(r, _)| *r).collect();
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

    Ok((reconstituter.into_builder().finish()?, any_changed))
}

fn transformation_primitive(t: &crate::attributes::Transformation) -> crate::types::PrimitiveKind {
    use crate::attributes::Transformation::*;
    use crate::types::PrimitiveKind;
    match t {
        ToDate => PrimitiveKind::Date,
        ToTime => PrimitiveKind::Time,
        ToDateTime => PrimitiveKind::DateTime,
        ToUuid => PrimitiveKind::Uuid,
        ToUri => PrimitiveKind::Uri,
        ToIntegerString => PrimitiveKind::IntegerString,
        ToBoolString => PrimitiveKind::BoolString,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TypeBuilder;

    fn config_infer() -> PipelineConfig {
        PipelineConfig { string_enum_inference: StringEnumInference::Infer, ..Default::default() }
    }

    #[test]
    fn large_distinctive_case_set_becomes_enum() {
        let mut builder = TypeBuilder::new();
        let mut cases = BTreeMap::new();
        for day in ["mon", "tue", "wed", "thu", "fri", "sat", "sun", "mon", "tue", "wed"] {
            *cases.entry(day.to_string()).or_insert(0) += 1;
        }
        let attrs = TypeAttributes::single(AttributeValue::StringTypes(StringTypes { cases, transformations: Default::default() }));
        let s = builder.get_string_type(attrs).unwrap();
        builder.add_top_level("Day", s).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, changed) = expand_strings(&graph, &config_infer()).unwrap();
        assert!(changed);
        let top = *rewritten.top_levels().get("Day").unwrap();
        assert!(matches!(rewritten.type_of(top).unwrap(), Type::Enum(_)));
    }

    #[test]
    fn small_unrelated_case_set_stays_string() {
        let mut builder = TypeBuilder::new();
        let mut cases = BTreeMap::new();
        cases.insert("x".to_string(), 1);
        let attrs = TypeAttributes::single(AttributeValue::StringTypes(StringTypes { cases, transformations: Default::default() }));
        let s = builder.get_string_type(attrs).unwrap();
        builder.add_top_level("Thing", s).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, _) = expand_strings(&graph, &config_infer()).unwrap();
        let top = *rewritten.top_levels().get("Thing").unwrap();
        assert!(matches!(rewritten.type_of(top).unwrap(), Type::Primitive(crate::types::PrimitiveKind::String)));
    }

    #[test]
    fn rebuilt_plain_string_drops_string_types_so_the_pass_settles() {
        let mut builder = TypeBuilder::new();
        let mut cases = BTreeMap::new();
        cases.insert("x".to_string(), 1);
        let attrs = TypeAttributes::single(AttributeValue::StringTypes(StringTypes { cases, transformations: Default::default() }));
        let s = builder.get_string_type(attrs).unwrap();
        builder.add_top_level("Thing", s).unwrap();
        let graph = builder.finish().unwrap();

        let (once, changed_once) = expand_strings(&graph, &config_infer()).unwrap();
        assert!(changed_once);
        let top = *once.top_levels().get("Thing").unwrap();
        assert!(once.attributes_of(top).unwrap().get(AttributeKind::StringTypes).is_none());

        let (_, changed_twice) = expand_strings(&once, &config_infer()).unwrap();
        assert!(!changed_twice);
    }

    #[test]
    fn none_mode_leaves_graph_unchanged() {
        let mut builder = TypeBuilder::new();
        let mut cases = BTreeMap::new();
        cases.insert("x".to_string(), 50);
        let attrs = TypeAttributes::single(AttributeValue::StringTypes(StringTypes { cases, transformations: Default::default() }));
        let s = builder.get_string_type(attrs).unwrap();
        builder.add_top_level("Thing", s).unwrap();
        let graph = builder.finish().unwrap();

        let config = PipelineConfig { string_enum_inference: StringEnumInference::None, ..Default::default() };
        let (_, changed) = expand_strings(&graph, &config).unwrap();
        assert!(!changed);
    }
}
