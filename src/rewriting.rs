//! Graph rewriting: `Remap` (many old types collapse onto one) and
//! `Replace` (disjoint sets, each collapsed by a caller-supplied callback),
//! sharing a reconstitution machinery that rebuilds every reachable type
//! into a fresh graph.

use std::collections::BTreeMap;

use crate::attributes::TypeAttributes;
use crate::builder::TypeBuilder;
use crate::error::{Error, Result};
use crate::type_graph::TypeGraph;
use crate::type_ref::TypeRef;
use crate::types::{ClassProperty, ObjectContents, Type};
use crate::union_builder::UnionTarget;

/// Tracks reconstituted refs so `reconstitute(r)` is idempotent even across
/// cycles: the first call for a ref in a cycle reserves a forwarding ref and
/// returns it immediately, deferring the body until the whole call stack
/// unwinds.
pub struct Reconstituter<'g> {
    source: &'g TypeGraph,
    builder: TypeBuilder,
    done: BTreeMap<TypeRef, TypeRef>,
    in_progress: BTreeMap<TypeRef, TypeRef>,
    depth: usize,
}

impl<'g> Reconstituter<'g> {
    pub fn new(source: &'g TypeGraph) -> Self {
        Self { source, builder: TypeBuilder::new(), done: BTreeMap::new(), in_progress: BTreeMap::new(), depth: 0 }
    }

    pub fn builder(&mut self) -> &mut TypeBuilder {
        &mut self.builder
    }

    /// Reconstitutes `r` into the new graph, rebuilding its Type body on
    /// first visit and returning a forwarding ref immediately for cyclic
    /// re-entry.
    pub fn reconstitute(&mut self, r: TypeRef) -> Result<TypeRef> {
        if let Some(&done) = self.done.get(&r) {
            return Ok(done);
        }
        if let Some(&progress) = self.in_progress.get(&r) {
            return Ok(progress);
        }

        let fwd = self.builder.reserve_forwarding();
        self.in_progress.insert(r, fwd);
        self.depth += 1;
        tracing::trace!(depth = self.depth, from = %r, to = %fwd, "reconstitute");

        let ty = self.source.type_of(r)?.clone();
        let attrs = self.source.attributes_of(r)?.clone();

        let new_ref = self.rebuild(&ty, &attrs, fwd)?;
        self.depth -= 1;
        self.in_progress.remove(&r);
        self.done.insert(r, new_ref);
        Ok(new_ref)
    }

    fn rebuild(&mut self, ty: &Type, attrs: &TypeAttributes, fwd: TypeRef) -> Result<TypeRef> {
        let reconstituted_attrs = attrs.reconstitute(|child| self.reconstitute(child))?;

        match ty {
            Type::Primitive(p) => {
                self.builder.get_primitive_type(*p, reconstituted_attrs).and_then(|r| self.bind(fwd, r))
            }
            Type::Array(Some(item)) => {
                let item = self.reconstitute(*item)?;
                let r = self.builder.get_array_type(reconstituted_attrs, Some(item))?;
                self.bind(fwd, r)
            }
            Type::Array(None) => Err(Error::Internal("cannot reconstitute an array with an unset item".to_string())),
            Type::Map(values) => {
                let values = self.reconstitute(*values)?;
                let r = self.builder.get_map_type(reconstituted_attrs, values)?;
                self.bind(fwd, r)
            }
            Type::Class { contents: Some(c), .. } => {
                let contents = self.reconstitute_contents(c)?;
                let r = self.builder.get_class_type(reconstituted_attrs, contents.properties)?;
                self.bind(fwd, r)
            }
            Type::Class { is_fixed, contents: None } => {
                let r = self.builder.get_unique_class_type(reconstituted_attrs, *is_fixed, None)?;
                self.bind(fwd, r)
            }
            Type::Object(contents) => {
                let rebuilt = match contents {
                    Some(c) => Some(self.reconstitute_contents(c)?),
                    None => None,
                };
                let r = self.builder.get_unique_object_type(
                    reconstituted_attrs,
                    rebuilt.as_ref().map(|c| c.properties.clone()),
                    rebuilt.as_ref().and_then(|c| c.additional),
                )?;
                self.bind(fwd, r)
            }
            Type::Enum(cases) => {
                let r = self.builder.get_enum_type(reconstituted_attrs, cases.iter().cloned())?;
                self.bind(fwd, r)
            }
            Type::Union(Some(members)) => {
                let members: Result<std::collections::BTreeSet<TypeRef>> = members.iter().map(|m| self.reconstitute(*m)).collect();
                let r = self.builder.get_union_type(reconstituted_attrs, members?)?;
                self.bind(fwd, r)
            }
            Type::Union(None) => Err(Error::Internal("cannot reconstitute a union with unset members".to_string())),
            Type::Intersection(Some(members)) => {
                let members: Result<std::collections::BTreeSet<TypeRef>> = members.iter().map(|m| self.reconstitute(*m)).collect();
                let r = self.builder.get_intersection_type(reconstituted_attrs, members?)?;
                self.bind(fwd, r)
            }
            Type::Intersection(None) => Err(Error::Internal("cannot reconstitute an intersection with unset members".to_string())),
        }
    }

    fn reconstitute_contents(&mut self, c: &ObjectContents) -> Result<ObjectContents> {
        let mut properties = indexmap::IndexMap::new();
        for (name, prop) in &c.properties {
            let type_ref = self.reconstitute(prop.type_ref)?;
            properties.insert(name.clone(), ClassProperty { type_ref, optional: prop.optional });
        }
        let additional = c.additional.map(|a| self.reconstitute(a)).transpose()?;
        Ok(ObjectContents { properties, additional })
    }

    /// The identity-dedup machinery may have returned a different ref than
    /// the forwarding one we reserved (e.g. this body turned out identical
    /// to one already reconstituted). Bind the forwarding ref to forward to
    /// it via a one-member intersection, unless they're already the same.
    fn bind(&mut self, fwd: TypeRef, actual: TypeRef) -> Result<TypeRef> {
        if fwd == actual {
            return Ok(fwd);
        }
        self.builder.bind_forwarding_to(fwd, actual)?;
        Ok(fwd)
    }

    /// Pre-seeds the memo so a later `reconstitute(old)` resolves straight to
    /// `new` instead of rebuilding it. Used by rewrite passes that already
    /// decided a replacement before the main reconstitution sweep runs.
    pub fn seed(&mut self, old: TypeRef, new: TypeRef) {
        self.done.insert(old, new);
    }

    /// Consumes the reconstituter, handing back the builder it accumulated
    /// into so the caller can finish and freeze the new graph.
    pub fn into_builder(self) -> TypeBuilder {
        self.builder
    }
}

impl<'g> UnionTarget for Reconstituter<'g> {
    fn builder(&mut self) -> &mut TypeBuilder {
        Reconstituter::builder(self)
    }

    fn resolve(&mut self, r: TypeRef) -> Result<TypeRef> {
        self.reconstitute(r)
    }
}

/// Rewrites `source` so every occurrence of a key in `remap` becomes its
/// value. Multiple sources mapping to the same target have their
/// attributes unioned.
pub fn remap(source: &TypeGraph, remap: &BTreeMap<TypeRef, TypeRef>) -> Result<TypeGraph> {
    let mut reconstituter = Reconstituter::new(source);

    // attributes of coalesced sources are combined onto whichever target
    // ref is reconstituted first.
    let mut combined_attrs: BTreeMap<TypeRef, TypeAttributes> = BTreeMap::new();
    for (&src, &target) in remap {
        let attrs = source.attributes_of(src)?;
        let entry = combined_attrs.entry(target).or_default();
        *entry = TypeAttributes::combine(&[entry, attrs]);
    }

    for r in source.all_types_unordered() {
        let resolved = remap.get(&r).copied().unwrap_or(r);
        let new_ref = reconstituter.reconstitute(resolved)?;
        if let Some(extra) = combined_attrs.get(&resolved) {
            reconstituter.builder().add_attributes(new_ref, extra.clone())?;
        }
    }

    for (name, &r) in source.top_levels() {
        let resolved = remap.get(&r).copied().unwrap_or(r);
        let new_ref = reconstituter.reconstitute(resolved)?;
        reconstituter.builder().add_top_level(name.clone(), new_ref)?;
    }

    reconstituter.builder.finish()
}

/// A set of old types to collapse into a single new type, built by
/// `replacer` which receives the builder and a forwarding ref it may bind
/// into (for self-referential replacements).
pub struct ReplacementSet {
    pub members: Vec<TypeRef>,
    pub replacer: Box<dyn Fn(&[TypeRef], &mut TypeBuilder, TypeRef) -> Result<TypeRef>>,
}

/// Rewrites `source` by collapsing each `ReplacementSet` (assumed disjoint)
/// into whatever its replacer produces, leaving every other type
/// reconstituted unchanged.
pub fn replace(source: &TypeGraph, sets: Vec<ReplacementSet>) -> Result<TypeGraph> {
    let mut owner: BTreeMap<TypeRef, usize> = BTreeMap::new();
    for (i, set) in sets.iter().enumerate() {
        for &m in &set.members {
            owner.insert(m, i);
        }
    }

    let mut builder = TypeBuilder::new();
    let mut replaced: BTreeMap<usize, TypeRef> = BTreeMap::new();

    for (i, set) in sets.iter().enumerate() {
        let fwd = builder.reserve_forwarding();
        replaced.insert(i, fwd);
        let actual = (set.replacer)(&set.members, &mut builder, fwd)?;
        if actual != fwd {
            builder.bind_forwarding_to(fwd, actual)?;
        }
    }

    // Every member of a replaced set resolves straight to that set's target
    // ref: pre-seed the reconstituter's memo so reconstitution of anything
    // still referencing a replaced member redirects to the replacement
    // instead of rebuilding it.
    let mut reconstituter = Reconstituter::new(source);
    reconstituter.builder = builder;
    for (&member, &set_index) in &owner {
        reconstituter.seed(member, replaced[&set_index]);
    }

    for r in source.all_types_unordered() {
        if owner.contains_key(&r) {
            continue;
        }
        reconstituter.reconstitute(r)?;
    }

    for (name, &r) in source.top_levels() {
        let target = reconstituter.reconstitute(r)?;
        reconstituter.builder().add_top_level(name.clone(), target)?;
    }

    reconstituter.builder.finish()
}
