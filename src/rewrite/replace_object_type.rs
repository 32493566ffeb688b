//! `ReplaceObjectType`: gets rid of the generic `object` kind in favor of
//! `class` or `map`, the only two shapes generated code actually needs.

use indexmap::IndexMap;

use crate::attributes::{AttributeValue, TypeAttributes};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::rewriting::Reconstituter;
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::{ClassProperty, PrimitiveKind, Type};
use crate::union_builder::UnionAccumulator;

enum Plan {
    KeepAsIs,
    /// `lost_attributes` is set when this class used to carry an
    /// `additionalProperties: any` constraint that is being dropped here.
    Class { properties: IndexMap<String, ClassProperty>, lost_attributes: bool },
    /// No constraint on shape at all: becomes a map over `any`.
    MapOverAny,
    MapOverAdditional(TypeRef),
    MapOverUnion { properties: Vec<TypeRef>, additional: TypeRef },
}

fn plan_for(graph: &TypeGraph, r: TypeRef, config: &PipelineConfig) -> Result<Plan> {
    let Type::Object(contents) = graph.type_of(r)? else { unreachable!() };
    let Some(contents) = contents else {
        return Ok(Plan::MapOverAny);
    };

    let Some(additional) = contents.additional else {
        return Ok(Plan::Class { properties: contents.properties.clone(), lost_attributes: false });
    };

    if contents.properties.is_empty() {
        return Ok(Plan::MapOverAdditional(additional));
    }

    if config.leave_full_objects {
        return Ok(Plan::KeepAsIs);
    }

    if matches!(graph.type_of(additional)?, Type::Primitive(PrimitiveKind::Any)) {
        // `additionalProperties: any` alongside fixed properties is silently
        // dropped; the class that results no longer constrains unlisted
        // keys the way the original object did.
        return Ok(Plan::Class { properties: contents.properties.clone(), lost_attributes: true });
    }

    let properties = contents.properties.values().map(|p| p.type_ref).collect();
    Ok(Plan::MapOverUnion { properties, additional })
}

/// Runs `ReplaceObjectType` once over `graph`.
pub fn replace_object_type(graph: &TypeGraph, config: &PipelineConfig) -> Result<(TypeGraph, bool)> {
    let mut plans = vec![];
    for r in graph.all_types_unordered() {
        if !matches!(graph.type_of(r)?, Type::Object(_)) {
            continue;
        }
        match plan_for(graph, r, config)? {
            Plan::KeepAsIs => continue,
            plan => plans.push((r, plan)),
        }
    }

    if plans.is_empty() {
        return Ok((crate::rewriting::remap(graph, &std::collections::BTreeMap::new())?, false));
    }

    let planned: std::collections::BTreeSet<TypeRef> = plans.iter().map(|(r, _)| *r).collect();
    let mut reconstituter = Reconstituter::new(graph);

    for (r, plan) in &plans {
        let own_attrs = graph.attributes_of(*r)?.clone();
        let mut reconstituted_attrs = own_attrs.reconstitute(|child| reconstituter.reconstitute(child))?;

        let built = match plan {
            Plan::KeepAsIs => unreachable!(),
            Plan::MapOverAny => {
                let values = reconstituter.builder().get_primitive_type(PrimitiveKind::Any, TypeAttributes::new())?;
                reconstituter.builder().get_map_type(reconstituted_attrs, values)?
            }
            Plan::Class { properties, lost_attributes } => {
                let mut rebuilt = IndexMap::new();
                for (name, prop) in properties {
                    let type_ref = reconstituter.reconstitute(prop.type_ref)?;
                    rebuilt.insert(name.clone(), ClassProperty { type_ref, optional: prop.optional });
                }
                if *lost_attributes {
                    reconstituted_attrs.insert(AttributeValue::LostTypeAttributes);
                }
                reconstituter.builder().get_unique_class_type(reconstituted_attrs, true, Some(rebuilt))?
            }
            Plan::MapOverAdditional(values) => {
                let values = reconstituter.reconstitute(*values)?;
                reconstituter.builder().get_map_type(reconstituted_attrs, values)?
            }
            Plan::MapOverUnion { properties, additional } => {
                let mut accumulator = UnionAccumulator::new();
                for &p in properties {
                    accumulator.add(graph, p)?;
                }
                accumulator.add(graph, *additional)?;
                let values = accumulator.reconcile(config.conflate_numbers).into_builder().build(&mut reconstituter, graph, false)?;
                reconstituter.builder().get_map_type(reconstituted_attrs, values)?
            }
        };
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
    use crate::builder::TypeBuilder;

    #[test]
    fn object_with_no_additional_becomes_class() {
        let mut builder = TypeBuilder::new();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let mut props = IndexMap::new();
        props.insert("x".to_string(), ClassProperty { type_ref: str_, optional: false });
        let obj = builder.get_unique_object_type(TypeAttributes::new(), Some(props), None).unwrap();
        builder.add_top_level("Obj", obj).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, changed) = replace_object_type(&graph, &PipelineConfig::default()).unwrap();
        assert!(changed);
        let top = *rewritten.top_levels().get("Obj").unwrap();
        assert!(matches!(rewritten.type_of(top).unwrap(), Type::Class { .. }));
    }

    #[test]
    fn object_with_only_additional_becomes_map() {
        let mut builder = TypeBuilder::new();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let obj = builder.get_unique_object_type(TypeAttributes::new(), Some(IndexMap::new()), Some(str_)).unwrap();
        builder.add_top_level("Obj", obj).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, changed) = replace_object_type(&graph, &PipelineConfig::default()).unwrap();
        assert!(changed);
        let top = *rewritten.top_levels().get("Obj").unwrap();
        assert!(matches!(rewritten.type_of(top).unwrap(), Type::Map(_)));
    }

    #[test]
    fn object_with_properties_and_any_additional_becomes_class_marked_lossy() {
        let mut builder = TypeBuilder::new();
        let str_ = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let any = builder.get_primitive_type(PrimitiveKind::Any, TypeAttributes::new()).unwrap();
        let mut props = IndexMap::new();
        props.insert("x".to_string(), ClassProperty { type_ref: str_, optional: false });
        let obj = builder.get_unique_object_type(TypeAttributes::new(), Some(props), Some(any)).unwrap();
        builder.add_top_level("Obj", obj).unwrap();
        let graph = builder.finish().unwrap();

        let (rewritten, changed) = replace_object_type(&graph, &PipelineConfig::default()).unwrap();
        assert!(changed);
        let top = *rewritten.top_levels().get("Obj").unwrap();
        assert!(matches!(rewritten.type_of(top).unwrap(), Type::Class { .. }));
        let attrs = rewritten.attributes_of(top).unwrap();
        assert!(matches!(attrs.get(crate::attributes::AttributeKind::LostTypeAttributes), Some(AttributeValue::LostTypeAttributes)));
    }
}
