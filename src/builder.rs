//! `TypeBuilder`: the only way to construct types. Owns a growing, partially
//! committed array of types and enforces identity dedup, set-once fields,
//! and single-name top-levels.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::attributes::{AttributeKind, AttributeValue, TypeAttributes};
use crate::error::{invariant, Error, Result};
use crate::type_graph::TypeGraph;
use crate::type_ref::{next_serial, TypeRef};
use crate::types::{ClassProperty, ObjectContents, PrimitiveKind, Type, TypeIdentity};

/// Identity key used for dedup: the structural identity plus the
/// identity-affecting attribute subset (serialized, since `AttributeValue`
/// is not itself `Ord`).
type IdentityKey = (TypeIdentity, Option<u64>);

pub struct TypeBuilder {
    serial: u64,
    types: Vec<Option<Type>>,
    attributes: Vec<TypeAttributes>,
    top_levels: IndexMap<String, TypeRef>,
    identity_cache: BTreeMap<IdentityKey, TypeRef>,
    /// Transformed-string kinds configured to fall back to plain `string`
    /// instead of being preserved as their own primitive.
    string_fallback: BTreeMap<PrimitiveKind, bool>,
}

impl TypeBuilder {
    pub fn new() -> Self {
        Self {
            serial: next_serial(),
            types: vec![],
            attributes: vec![],
            top_levels: IndexMap::new(),
            identity_cache: BTreeMap::new(),
            string_fallback: BTreeMap::new(),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Configures whether `kind` (a transformed-string primitive) falls
    /// back to plain `string` when requested via [`Self::get_primitive_type`].
    pub fn set_string_fallback(&mut self, kind: PrimitiveKind, falls_back: bool) {
        self.string_fallback.insert(kind, falls_back);
    }

    pub fn reserve(&mut self) -> TypeRef {
        let index = self.types.len();
        self.types.push(None);
        self.attributes.push(TypeAttributes::new());
        TypeRef::new(self.serial, index)
    }

    fn identity_key(identity: TypeIdentity, attrs: &TypeAttributes) -> IdentityKey {
        let union_id = match attrs.get(AttributeKind::UnionIdentifier) {
            Some(AttributeValue::UnionIdentifier(id)) => Some(*id),
            _ => None,
        };
        (identity, union_id)
    }

    fn commit(&mut self, r: TypeRef, ty: Type, attrs: TypeAttributes) -> Result<()> {
        r.assert_graph(self.serial)?;
        invariant(self.types[r.index()].is_none(), format!("double commit at {r}"))?;
        self.types[r.index()] = Some(ty);
        self.attributes[r.index()] = attrs;
        Ok(())
    }

    /// The core identity-dedup algorithm described for `get-or-add`.
    ///
    /// `creator` builds the `Type` body given the ref it will live at (so it
    /// can refer to itself for cyclic structures). `forwarding_ref`, if
    /// given, is an already-reserved ref the caller wants bound to the
    /// result rather than a freshly reserved one.
    fn get_or_add(
        &mut self,
        identity: Option<TypeIdentity>,
        attrs: TypeAttributes,
        forwarding_ref: Option<TypeRef>,
        creator: impl FnOnce(&mut Self, TypeRef) -> Type,
    ) -> Result<TypeRef> {
        if attrs.requires_unique_identity() {
            return self.create_fresh(attrs, forwarding_ref, creator);
        }

        let Some(identity) = identity else {
            return self.create_fresh(attrs, forwarding_ref, creator);
        };

        let key = Self::identity_key(identity, &attrs);
        if let Some(&hit) = self.identity_cache.get(&key) {
            self.attributes[hit.index()].add_non_identity(&attrs);
            return match forwarding_ref {
                None => Ok(hit),
                Some(fwd) => {
                    // The caller needed a distinct ref (to break a cycle);
                    // bind it as a single-member intersection forwarding to
                    // the cached type instead of duplicating it.
                    let mut members = std::collections::BTreeSet::new();
                    members.insert(hit);
                    self.commit(fwd, Type::Intersection(Some(members)), TypeAttributes::new())?;
                    Ok(fwd)
                }
            };
        }

        let r = self.create_fresh(attrs.clone(), forwarding_ref, creator)?;
        self.identity_cache.insert(key, r);
        Ok(r)
    }

    fn create_fresh(&mut self, attrs: TypeAttributes, forwarding_ref: Option<TypeRef>, creator: impl FnOnce(&mut Self, TypeRef) -> Type) -> Result<TypeRef> {
        let r = match forwarding_ref {
            Some(r) => {
                r.assert_graph(self.serial)?;
                r
            }
            None => self.reserve(),
        };
        let ty = creator(self, r);
        self.commit(r, ty, attrs)?;
        Ok(r)
    }

    pub fn get_primitive_type(&mut self, kind: PrimitiveKind, attrs: TypeAttributes) -> Result<TypeRef> {
        let kind = if kind.is_transformed_string() && self.string_fallback.get(&kind).copied().unwrap_or(false) {
            PrimitiveKind::String
        } else {
            kind
        };
        self.get_or_add(Some(TypeIdentity::Primitive(kind)), attrs, None, |_, _| Type::Primitive(kind))
    }

    pub fn get_string_type(&mut self, attrs: TypeAttributes) -> Result<TypeRef> {
        self.get_primitive_type(PrimitiveKind::String, attrs)
    }

    pub fn get_enum_type(&mut self, attrs: TypeAttributes, cases: impl IntoIterator<Item = String>) -> Result<TypeRef> {
        let cases: std::collections::BTreeSet<String> = cases.into_iter().collect();
        self.get_or_add(Some(TypeIdentity::Enum(cases.iter().cloned().collect())), attrs, None, move |_, _| Type::Enum(cases))
    }

    /// Array with a known item ref; reserved with the item unset when
    /// `items` is `None` (for a forwarding ref that will be completed later
    /// via [`Self::set_array_item`]).
    pub fn get_array_type(&mut self, attrs: TypeAttributes, items: Option<TypeRef>) -> Result<TypeRef> {
        match items {
            Some(item) => self.get_or_add(Some(TypeIdentity::Array(item)), attrs, None, move |_, _| Type::Array(Some(item))),
            None => self.create_fresh(attrs, None, |_, _| Type::Array(None)),
        }
    }

    pub fn get_map_type(&mut self, attrs: TypeAttributes, values: TypeRef) -> Result<TypeRef> {
        self.get_or_add(Some(TypeIdentity::Map(values)), attrs, None, move |_, _| Type::Map(values))
    }

    pub fn get_class_type(&mut self, attrs: TypeAttributes, properties: IndexMap<String, ClassProperty>) -> Result<TypeRef> {
        let contents = ObjectContents { properties, additional: None };
        let identity = TypeIdentity::Class(canonical(&contents));
        self.get_or_add(Some(identity), attrs, None, move |_, _| Type::Class { is_fixed: true, contents: Some(contents) })
    }

    pub fn get_unique_class_type(
        &mut self,
        attrs: TypeAttributes,
        is_fixed: bool,
        properties: Option<IndexMap<String, ClassProperty>>,
    ) -> Result<TypeRef> {
        let ty = Type::Class {
            is_fixed,
            contents: properties.map(|properties| ObjectContents { properties, additional: None }),
        };
        self.create_fresh(attrs, None, move |_, _| ty)
    }

    pub fn get_unique_object_type(
        &mut self,
        attrs: TypeAttributes,
        properties: Option<IndexMap<String, ClassProperty>>,
        additional: Option<TypeRef>,
    ) -> Result<TypeRef> {
        let contents = properties.map(|properties| ObjectContents { properties, additional });
        self.create_fresh(attrs, None, move |_, _| Type::Object(contents))
    }

    pub fn get_union_type(&mut self, attrs: TypeAttributes, members: impl IntoIterator<Item = TypeRef>) -> Result<TypeRef> {
        let members: std::collections::BTreeSet<TypeRef> = members.into_iter().collect();
        invariant(!members.is_empty(), "union requires at least one member").map_err(|_| Error::EmptyUnion)?;
        self.get_or_add(Some(TypeIdentity::Union(members.iter().copied().collect())), attrs, None, move |_, _| Type::Union(Some(members)))
    }

    pub fn get_unique_union_type(&mut self, attrs: TypeAttributes, members: Option<std::collections::BTreeSet<TypeRef>>) -> Result<TypeRef> {
        self.create_fresh(attrs, None, move |_, _| Type::Union(members))
    }

    pub fn get_intersection_type(&mut self, attrs: TypeAttributes, members: impl IntoIterator<Item = TypeRef>) -> Result<TypeRef> {
        let members: std::collections::BTreeSet<TypeRef> = members.into_iter().collect();
        invariant(!members.is_empty(), "intersection requires at least one member")?;
        self.get_or_add(Some(TypeIdentity::Intersection(members.iter().copied().collect())), attrs, None, move |_, _| {
            Type::Intersection(Some(members))
        })
    }

    pub fn get_unique_intersection_type(&mut self, attrs: TypeAttributes, members: Option<std::collections::BTreeSet<TypeRef>>) -> Result<TypeRef> {
        self.create_fresh(attrs, None, move |_, _| Type::Intersection(members))
    }

    /// Reserves a ref whose body isn't known yet; used for forwarding refs
    /// broken cycles need.
    pub fn reserve_forwarding(&mut self) -> TypeRef {
        self.reserve()
    }

    /// Binds a still-bare forwarding ref (from [`Self::reserve_forwarding`],
    /// never committed) to forward to `target` via a single-member
    /// intersection. Used when reconstitution discovers that a
    /// provisionally-reserved ref's real body turned out to be identical to
    /// an already-reconstituted type.
    pub fn bind_forwarding_to(&mut self, fwd: TypeRef, target: TypeRef) -> Result<()> {
        let mut members = std::collections::BTreeSet::new();
        members.insert(target);
        self.commit(fwd, Type::Intersection(Some(members)), TypeAttributes::new())
    }

    pub fn set_array_item(&mut self, target: TypeRef, item: TypeRef) -> Result<()> {
        target.assert_graph(self.serial)?;
        let slot = self.types[target.index()].take();
        match slot {
            None | Some(Type::Array(None)) => {
                self.types[target.index()] = Some(Type::Array(Some(item)));
                Ok(())
            }
            Some(other) => {
                self.types[target.index()] = Some(other);
                Err(Error::Internal(format!("array item already set at {target}")))
            }
        }
    }

    pub fn set_object_properties(&mut self, target: TypeRef, properties: IndexMap<String, ClassProperty>, additional: Option<TypeRef>) -> Result<()> {
        target.assert_graph(self.serial)?;
        let slot = self.types[target.index()].take();
        match slot {
            Some(Type::Class { is_fixed, contents: None }) => {
                invariant(additional.is_none(), "a class has no additional-properties")?;
                self.types[target.index()] = Some(Type::Class { is_fixed, contents: Some(ObjectContents { properties, additional: None }) });
                Ok(())
            }
            Some(Type::Object(None)) => {
                self.types[target.index()] = Some(Type::Object(Some(ObjectContents { properties, additional })));
                Ok(())
            }
            Some(other) => {
                self.types[target.index()] = Some(other);
                Err(Error::Internal(format!("object properties already set (or wrong kind) at {target}")))
            }
            None => Err(Error::Internal(format!("no reserved slot at {target}"))),
        }
    }

    pub fn set_set_operation_members(&mut self, target: TypeRef, members: std::collections::BTreeSet<TypeRef>) -> Result<()> {
        target.assert_graph(self.serial)?;
        let slot = self.types[target.index()].take();
        match slot {
            Some(Type::Union(None)) => {
                invariant(!members.is_empty(), "union requires at least one member").map_err(|_| Error::EmptyUnion)?;
                self.types[target.index()] = Some(Type::Union(Some(members)));
                Ok(())
            }
            Some(Type::Intersection(None)) => {
                self.types[target.index()] = Some(Type::Intersection(Some(members)));
                Ok(())
            }
            Some(other) => {
                self.types[target.index()] = Some(other);
                Err(Error::Internal(format!("set-operation members already set at {target}")))
            }
            None => Err(Error::Internal(format!("no reserved slot at {target}"))),
        }
    }

    pub fn add_attributes(&mut self, target: TypeRef, attrs: TypeAttributes) -> Result<()> {
        target.assert_graph(self.serial)?;
        self.attributes[target.index()].add_non_identity(&attrs);
        Ok(())
    }

    pub fn add_top_level(&mut self, name: impl Into<String>, r: TypeRef) -> Result<()> {
        r.assert_graph(self.serial)?;
        let name = name.into();
        invariant(!self.top_levels.contains_key(&name), format!("top-level name already present: {name}"))?;
        self.top_levels.insert(name, r);
        Ok(())
    }

    pub fn finish(self) -> Result<TypeGraph> {
        let mut types = Vec::with_capacity(self.types.len());
        for (i, slot) in self.types.into_iter().enumerate() {
            match slot {
                Some(ty) => types.push(ty),
                None => return Err(Error::Internal(format!("reserved index {i} was never committed"))),
            }
        }
        let graph = TypeGraph { serial: self.serial, types, attributes: self.attributes, top_levels: self.top_levels };
        graph.validate()?;
        Ok(graph)
    }
}

impl Default for TypeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical(c: &ObjectContents) -> Vec<(String, TypeRef, bool)> {
    let mut props: Vec<(String, TypeRef, bool)> = c.properties.iter().map(|(k, v)| (k.clone(), v.type_ref, v.optional)).collect();
    props.sort_by(|a, b| a.0.cmp(&b.0));
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    #[test]
    fn identical_primitives_dedup() {
        let mut builder = TypeBuilder::new();
        let a = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        let b = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_primitives_are_distinct() {
        let mut builder = TypeBuilder::new();
        let a = builder.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::new()).unwrap();
        let b = builder.get_primitive_type(PrimitiveKind::Double, TypeAttributes::new()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_union_is_rejected() {
        let mut builder = TypeBuilder::new();
        let result = builder.get_union_type(TypeAttributes::new(), std::iter::empty());
        assert!(matches!(result, Err(Error::EmptyUnion)));
    }

    #[test]
    fn array_item_settable_once() {
        let mut builder = TypeBuilder::new();
        let item = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        let array = builder.get_array_type(TypeAttributes::new(), None).unwrap();
        builder.set_array_item(array, item).unwrap();
        assert!(builder.set_array_item(array, item).is_err());
    }

    #[test]
    fn duplicate_top_level_name_rejected() {
        let mut builder = TypeBuilder::new();
        let a = builder.get_primitive_type(PrimitiveKind::String, TypeAttributes::new()).unwrap();
        builder.add_top_level("Root", a).unwrap();
        assert!(builder.add_top_level("Root", a).is_err());
    }

    #[test]
    fn finish_rejects_uncommitted_reservation() {
        let mut builder = TypeBuilder::new();
        builder.reserve_forwarding();
        assert!(builder.finish().is_err());
    }
}
