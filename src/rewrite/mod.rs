//! Rewrite passes and the fixpoint driver that runs them until the graph
//! stops changing.

pub mod combine_classes;
pub mod flatten_strings;
pub mod flatten_unions;
pub mod replace_object_type;
pub mod resolve_intersections;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::type_graph::TypeGraph;

/// Runs `FlattenUnions`/`ResolveIntersections` to their own inner fixpoint,
/// then each optional pass once, repeating the whole pipeline until nothing
/// reports a change.
pub fn run(mut graph: TypeGraph, config: &PipelineConfig) -> Result<TypeGraph> {
    loop {
        let mut changed = false;

        loop {
            let (next, union_changed) = flatten_unions::flatten_unions(&graph, config.conflate_numbers)?;
            graph = next;
            let (next, intersection_changed) = resolve_intersections::resolve_intersections(&graph)?;
            graph = next;
            if !union_changed && !intersection_changed {
                break;
            }
            changed = true;
        }

        let (next, c) = crate::inference::expand_strings::expand_strings(&graph, config)?;
        graph = next;
        changed |= c;

        let (next, c) = flatten_strings::flatten_strings(&graph)?;
        graph = next;
        changed |= c;

        if config.infer_maps {
            let (next, c) = crate::inference::infer_maps::infer_maps(&graph, config)?;
            graph = next;
            changed |= c;
        }

        let (next, c) = combine_classes::combine_classes(&graph, config)?;
        graph = next;
        changed |= c;

        let (next, c) = replace_object_type::replace_object_type(&graph, config)?;
        graph = next;
        changed |= c;

        if !changed {
            return Ok(graph);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::TypeAttributes;
    use crate::builder::TypeBuilder;
    use crate::types::PrimitiveKind;

    #[test]
    fn pipeline_reaches_fixpoint_on_a_trivial_graph() {
        let mut builder = TypeBuilder::new();
        let int = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        builder.add_top_level("Int", int).unwrap();
        let graph = builder.finish().unwrap();

        let result = run(graph, &PipelineConfig::default()).unwrap();
        let top = *result.top_levels().get("Int").unwrap();
        assert!(matches!(result.type_of(top).unwrap(), crate::types::Type::Primitive(PrimitiveKind::Integer)));
    }
}
