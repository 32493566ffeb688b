//! Turns sampled `serde_json::Value`s into a `TypeRef`, and the two
//! post-construction rewrite passes that refine the inferred shape further.

pub mod expand_strings;
pub mod infer_maps;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::attributes::{AttributeValue, TypeAttributes};
use crate::builder::TypeBuilder;
use crate::config::{PipelineConfig, StringEnumInference};
use crate::error::Result;
use crate::types::{ClassProperty, PrimitiveKind};

/// Recognizes a string as a transformed-string kind by shape, without a
/// full RFC-grade parser: good enough to decide which primitive kind a
/// sampled string should become.
fn recognize_string_format(s: &str) -> Option<PrimitiveKind> {
    let is_date = s.len() == 10 && s.as_bytes().get(4) == Some(&b'-') && s.as_bytes().get(7) == Some(&b'-') && s.chars().all(|c| c.is_ascii_digit() || c == '-');
    if is_date {
        return Some(PrimitiveKind::Date);
    }
    if s.contains('T') && (s.ends_with('Z') || s.contains('+')) && s.len() >= 19 {
        return Some(PrimitiveKind::DateTime);
    }
    if s.len() == 36 && s.as_bytes().get(8) == Some(&b'-') && s.as_bytes().get(13) == Some(&b'-') {
        return Some(PrimitiveKind::Uuid);
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        return Some(PrimitiveKind::Uri);
    }
    None
}

/// Infers a `TypeRef` from a sequence of sampled JSON values observed for
/// the same logical slot (a top-level document, or one object property
/// across every sample that had it).
pub struct TypeInference<'a> {
    pub builder: &'a mut TypeBuilder,
    pub config: &'a PipelineConfig,
}

impl<'a> TypeInference<'a> {
    pub fn infer(&mut self, samples: &[&Value]) -> Result<crate::type_ref::TypeRef> {
        let mut accumulator = UnionAccumulatorForSamples::default();
        for sample in samples {
            self.accumulate(&mut accumulator, sample)?;
        }
        accumulator.finish(self.builder, self.config)
    }

    fn accumulate(&mut self, acc: &mut UnionAccumulatorForSamples, value: &Value) -> Result<()> {
        match value {
            Value::Null => acc.primitives.insert(PrimitiveKind::Null),
            Value::Bool(_) => acc.primitives.insert(PrimitiveKind::Bool),
            Value::Number(n) if n.is_i64() || n.is_u64() => acc.primitives.insert(PrimitiveKind::Integer),
            Value::Number(_) => acc.primitives.insert(PrimitiveKind::Double),
            Value::String(s) => {
                if let Some(transformed) = recognize_string_format(s) {
                    acc.primitives.insert(transformed);
                } else {
                    *acc.string_cases.entry(s.clone()).or_insert(0) += 1;
                }
                true
            }
            Value::Array(items) => {
                for item in items {
                    acc.array_items.push(item.clone());
                }
                acc.has_array = true;
                true
            }
            Value::Object(map) => {
                for (k, v) in map {
                    acc.object_properties.entry(k.clone()).or_default().push(v.clone());
                }
                acc.object_sample_count += 1;
                true
            }
        };
        Ok(())
    }
}

/// Per-slot accumulation of sampled values prior to building the final
/// type. Kept separate from [`crate::union_builder::UnionAccumulator`]
/// since it works over raw JSON values rather than already-built types.
#[derive(Default)]
struct UnionAccumulatorForSamples {
    primitives: std::collections::BTreeSet<PrimitiveKind>,
    string_cases: BTreeMap<String, usize>,
    array_items: Vec<Value>,
    has_array: bool,
    object_properties: IndexMap<String, Vec<Value>>,
    object_sample_count: usize,
}

impl UnionAccumulatorForSamples {
    fn finish(self, builder: &mut TypeBuilder, config: &PipelineConfig) -> Result<crate::type_ref::TypeRef> {
        let mut members = vec![];

        for &p in &self.primitives {
            members.push(builder.get_primitive_type(p, TypeAttributes::new())?);
        }

        if !self.string_cases.is_empty() {
            members.push(self.build_string_type(builder, config)?);
        }

        if self.has_array {
            let item_samples: Vec<&Value> = self.array_items.iter().collect();
            let item = TypeInference { builder: &mut *builder, config }.infer(&item_samples)?;
            members.push(builder.get_array_type(TypeAttributes::new(), Some(item))?);
        }

        if self.object_sample_count > 0 {
            members.push(self.build_object_type(builder, config)?);
        }

        if members.is_empty() {
            return builder.get_primitive_type(PrimitiveKind::None, TypeAttributes::new());
        }
        if members.len() == 1 {
            return Ok(members[0]);
        }
        builder.get_union_type(TypeAttributes::new(), members)
    }

    fn build_string_type(&self, builder: &mut TypeBuilder, config: &PipelineConfig) -> Result<crate::type_ref::TypeRef> {
        match config.string_enum_inference {
            StringEnumInference::None => builder.get_string_type(TypeAttributes::new()),
            _ => {
                let attrs = TypeAttributes::single(AttributeValue::StringTypes(crate::attributes::StringTypes {
                    cases: self.string_cases.clone(),
                    transformations: Default::default(),
                }));
                builder.get_string_type(attrs)
            }
        }
    }

    fn build_object_type(&self, builder: &mut TypeBuilder, config: &PipelineConfig) -> Result<crate::type_ref::TypeRef> {
        if config.infer_maps && self.object_properties.len() > config.map_inference_property_threshold {
            let value_samples: Vec<&Value> = self.object_properties.values().flatten().collect();
            let values = TypeInference { builder: &mut *builder, config }.infer(&value_samples)?;
            return builder.get_map_type(TypeAttributes::new(), values);
        }

        let mut properties = IndexMap::new();
        for (name, samples) in &self.object_properties {
            let refs: Vec<&Value> = samples.iter().collect();
            let type_ref = TypeInference { builder: &mut *builder, config }.infer(&refs)?;
            let optional = samples.len() < self.object_sample_count;
            properties.insert(name.clone(), ClassProperty { type_ref, optional });
        }
        builder.get_class_type(TypeAttributes::new(), properties)
    }
}
