//! `FlattenStrings`: collapses an unrestricted plain string alongside its
//! own transformed-string siblings (date, uuid, ...) inside a union, since
//! the plain string already covers every value those siblings could hold.

use std::collections::BTreeSet;

use crate::attributes::{AttributeKind, AttributeValue, TypeAttributes};
use crate::error::Result;
use crate::rewriting::Reconstituter;
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::{PrimitiveKind, Type};

fn is_unrestricted_string(graph: &TypeGraph, r: TypeRef) -> Result<bool> {
    if !matches!(graph.type_of(r)?, Type::Primitive(PrimitiveKind::String)) {
        return Ok(false);
    }
    match graph.attributes_of(r)?.get(AttributeKind::StringTypes) {
        Some(AttributeValue::StringTypes(st)) => Ok(st.cases.is_empty()),
        _ => Ok(true),
    }
}

/// Runs `FlattenStrings` once over `graph`.
pub fn flatten_strings(graph: &TypeGraph) -> Result<(TypeGraph, bool)> {
    let mut plans = vec![];

    for r in graph.all_types_unordered() {
        let Type::Union(Some(members)) = graph.type_of(r)? else { continue };

        let mut plain_string = None;
        let mut transformed = vec![];
        for &m in members {
            if plain_string.is_none() && is_unrestricted_string(graph, m)? {
                plain_string = Some(m);
                continue;
            }
            if let Type::Primitive(p) = graph.type_of(m)? {
                if p.is_transformed_string() {
                    transformed.push(m);
                }
            }
        }

        let Some(plain_string) = plain_string else { continue };
        if transformed.is_empty() {
            continue;
        }

        let kept: BTreeSet<TypeRef> = members.iter().copied().filter(|m| *m != plain_string && !transformed.contains(m)).collect();
        plans.push((r, plain_string, transformed, kept));
    }

    if plans.is_empty() {
        return Ok((crate::rewriting::remap(graph, &std::collections::BTreeMap::new())?, false));
    }

    let planned: BTreeSet<TypeRef> = plans.iter().map(|(r, ..)| *r).collect();
    let mut reconstituter = Reconstituter::new(graph);

    for (r, plain_string, transformed, kept) in &plans {
        let mut merged_attrs = vec![graph.attributes_of(*plain_string)?.clone()];
        for &t in transformed {
            merged_attrs.push(graph.attributes_of(t)?.clone());
        }
        let refs: Vec<&TypeAttributes> = merged_attrs.iter().collect();
        let combined = TypeAttributes::combine(&refs);
        let reconstituted = combined.reconstitute(|child| reconstituter.reconstitute(child))?;
        let string_member = reconstituter.builder().get_string_type(reconstituted)?;

        let mut new_members: BTreeSet<TypeRef> = kept.iter().map(|&k| reconstituter.reconstitute(k)).collect::<Result<_>>()?;
        new_members.insert(string_member);

        let own_attrs = graph.attributes_of(*r)?.clone();
        let reconstituted_own = own_attrs.reconstitute(|child| reconstituter.reconstitute(child))?;

        let result = if new_members.len() == 1 {
            *new_members.iter().next().unwrap()
        } else {
            reconstituter.builder().get_union_type(TypeAttributes::new(), new_members)?
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
    fn plain_string_absorbs_transformed_siblings() {
        let mut builder = TypeBuilder::new();
        let s = builder.get_string_type(TypeAttributes::new()).unwrap();
        let date = builder.get_primitive_type(PrimitiveKind::Date, TypeAttributes::new()).unwrap();
        let u = builder.get_union_type(TypeAttributes::new(), [s, date]).unwrap();
        builder.add_top_level("U", u).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, changed) = flatten_strings(&graph).unwrap();
        assert!(changed);
        let top = *rewritten.top_levels().get("U").unwrap();
        assert!(matches!(rewritten.type_of(top).unwrap(), Type::Primitive(PrimitiveKind::String)));
    }

    #[test]
    fn restricted_string_does_not_absorb() {
        let mut builder = TypeBuilder::new();
        let mut cases = std::collections::BTreeMap::new();
        cases.insert("x".to_string(), 5);
        let attrs = TypeAttributes::single(AttributeValue::StringTypes(crate::attributes::StringTypes { cases, transformations: Default::default() }));
        let s = builder.get_string_type(attrs).unwrap();
        let date = builder.get_primitive_type(PrimitiveKind::Date, TypeAttributes::new()).unwrap();
        let u = builder.get_union_type(TypeAttributes::new(), [s, date]).unwrap();
        builder.add_top_level("U", u).unwrap();
        let graph = builder.finish().unwrap();

        let (_, changed) = flatten_strings(&graph).unwrap();
        assert!(!changed);
    }
}
