//! Collision-free name assignment: namespaces with mutual forbidden sets,
//! four kinds of `Name`, and an iterative assignment algorithm that picks
//! off whatever is ready (dependencies assigned, forbidding namespaces
//! settled) a batch at a time. Grounded in the teacher's own
//! `NameRegistry`/`NameCollector` pair (BTreeMap-keyed collectors feeding a
//! single resolution pass), generalized from a one-shot bipartite match to
//! the iterative, dependency-aware scheme the renderer needs.

pub mod namer;

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::error::{Error, Result};

pub use namer::Namer;

pub type NameId = usize;
pub type NamespaceId = usize;

enum NameKind {
    Fixed(String),
    Simple { candidates: Vec<String> },
    Dependency { depends_on: BTreeSet<NameId>, build: Box<dyn Fn(&dyn Fn(NameId) -> Option<String>) -> String> },
    Associated { sponsor: NameId, transform: Box<dyn Fn(&str) -> String> },
}

struct NameEntry {
    kind: NameKind,
    namer: Option<Rc<Namer>>,
    namespace: NamespaceId,
    order: u32,
    assigned: Option<String>,
}

#[derive(Default)]
struct NamespaceNode {
    name_ids: Vec<NameId>,
    forbidden: BTreeSet<NamespaceId>,
}

/// Owns every [`Name`] and [`Namespace`] for one naming pass and runs the
/// assignment algorithm over them.
#[derive(Default)]
pub struct NamingEngine {
    names: Vec<NameEntry>,
    namespaces: Vec<NamespaceNode>,
}

impl NamingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&mut self) -> NamespaceId {
        self.namespaces.push(NamespaceNode::default());
        self.namespaces.len() - 1
    }

    /// Declares that names owned by `namespace` must never collide with
    /// names already assigned in `other`.
    pub fn forbid(&mut self, namespace: NamespaceId, other: NamespaceId) {
        self.namespaces[namespace].forbidden.insert(other);
    }

    /// A name whose styled form is already fixed and carries no
    /// dependencies; assigned the moment it's created.
    pub fn add_fixed_name(&mut self, namespace: NamespaceId, order: u32, styled: impl Into<String>) -> NameId {
        let styled = styled.into();
        let id = self.push_entry(NameEntry { kind: NameKind::Fixed(styled.clone()), namer: None, namespace, order, assigned: Some(styled) });
        self.namespaces[namespace].name_ids.push(id);
        id
    }

    /// A name chosen from a fixed set of raw candidates via `namer`, with
    /// no dependencies on any other name.
    pub fn add_simple_name(&mut self, namespace: NamespaceId, order: u32, candidates: Vec<String>, namer: Rc<Namer>) -> NameId {
        let id = self.push_entry(NameEntry { kind: NameKind::Simple { candidates }, namer: Some(namer), namespace, order, assigned: None });
        self.namespaces[namespace].name_ids.push(id);
        id
    }

    /// A name whose single raw candidate is produced by calling `build`
    /// with a lookup from `NameId` to its assigned string. `build` is
    /// called once here with a probing lookup to discover which ids it
    /// actually queries; those become this name's dependencies.
    pub fn add_dependency_name(&mut self, namespace: NamespaceId, order: u32, namer: Rc<Namer>, build: impl Fn(&dyn Fn(NameId) -> Option<String>) -> String + 'static) -> NameId {
        let queried = std::cell::RefCell::new(BTreeSet::new());
        let probe = |id: NameId| -> Option<String> {
            queried.borrow_mut().insert(id);
            None
        };
        let _ = build(&probe);
        let depends_on = queried.into_inner();

        let build = Box::new(build);
        let id = self.push_entry(NameEntry { kind: NameKind::Dependency { depends_on, build }, namer: Some(namer), namespace, order, assigned: None });
        self.namespaces[namespace].name_ids.push(id);
        id
    }

    /// A name that transforms its `sponsor`'s assigned string directly,
    /// bypassing collision selection entirely (it is never chosen from
    /// alternatives, only derived).
    pub fn add_associated_name(&mut self, namespace: NamespaceId, order: u32, sponsor: NameId, transform: impl Fn(&str) -> String + 'static) -> NameId {
        let id = self.push_entry(NameEntry { kind: NameKind::Associated { sponsor, transform: Box::new(transform) }, namer: None, namespace, order, assigned: None });
        self.namespaces[namespace].name_ids.push(id);
        id
    }

    pub fn assigned_name(&self, id: NameId) -> Option<&str> {
        self.names[id].assigned.as_deref()
    }

    fn push_entry(&mut self, entry: NameEntry) -> NameId {
        self.names.push(entry);
        self.names.len() - 1
    }

    fn dependencies_assigned(&self, id: NameId) -> bool {
        match &self.names[id].kind {
            NameKind::Fixed(_) | NameKind::Simple { .. } => true,
            NameKind::Dependency { depends_on, .. } => depends_on.iter().all(|&d| self.names[d].assigned.is_some()),
            NameKind::Associated { sponsor, .. } => self.names[*sponsor].assigned.is_some(),
        }
    }

    fn namespace_fully_assigned(&self, ns: NamespaceId) -> bool {
        self.namespaces[ns].name_ids.iter().all(|&id| self.names[id].assigned.is_some())
    }

    fn forbidden_names_for(&self, namespace: NamespaceId) -> BTreeSet<String> {
        let mut forbidden = BTreeSet::new();
        for &id in &self.namespaces[namespace].name_ids {
            if let Some(name) = &self.names[id].assigned {
                forbidden.insert(name.clone());
            }
        }
        for &foreign in &self.namespaces[namespace].forbidden {
            for &id in &self.namespaces[foreign].name_ids {
                if let Some(name) = &self.names[id].assigned {
                    forbidden.insert(name.clone());
                }
            }
        }
        forbidden
    }

    fn candidates_for(&self, id: NameId) -> Vec<String> {
        match &self.names[id].kind {
            NameKind::Simple { candidates } => candidates.clone(),
            NameKind::Dependency { build, .. } => {
                let lookup = |nid: NameId| self.names[nid].assigned.clone();
                vec![build(&lookup)]
            }
            NameKind::Fixed(_) | NameKind::Associated { .. } => {
                unreachable!("fixed/associated names never enter the namer batch path")
            }
        }
    }

    fn group_key(&self, id: NameId) -> (u32, usize) {
        let order = self.names[id].order;
        let namer_ptr = self.names[id].namer.as_ref().map(|n| Rc::as_ptr(n) as *const () as usize).unwrap_or(0);
        (order, namer_ptr)
    }

    /// Direct-assigns every [`NameKind::Associated`] name whose sponsor is
    /// now assigned. Returns whether any progress was made.
    fn propagate_associated(&mut self) -> bool {
        let mut updates = vec![];
        for id in 0..self.names.len() {
            if self.names[id].assigned.is_some() {
                continue;
            }
            if let NameKind::Associated { sponsor, transform } = &self.names[id].kind {
                if let Some(sponsor_name) = &self.names[*sponsor].assigned {
                    updates.push((id, transform(sponsor_name)));
                }
            }
        }
        let progressed = !updates.is_empty();
        for (id, styled) in updates {
            self.names[id].assigned = Some(styled);
        }
        progressed
    }

    /// Runs the assignment algorithm to completion: every `FixedName` is
    /// already assigned; repeatedly finds namespaces whose forbidding
    /// namespaces have fully settled, batches their ready names by
    /// `(order, namer)`, and assigns each batch. Fails if a round makes no
    /// progress while names remain unassigned (a true dependency cycle
    /// outside the type graph's own cycle breaking, which would be a bug in
    /// how the caller built dependency names).
    pub fn assign_all(&mut self) -> Result<()> {
        loop {
            let mut progressed = self.propagate_associated();

            let ready_namespaces: Vec<NamespaceId> = (0..self.namespaces.len()).filter(|&ns| self.namespaces[ns].forbidden.iter().all(|&f| self.namespace_fully_assigned(f))).collect();

            let mut groups: BTreeMap<(u32, usize), Vec<NameId>> = BTreeMap::new();
            for &ns in &ready_namespaces {
                for &id in &self.namespaces[ns].name_ids {
                    if self.names[id].assigned.is_some() {
                        continue;
                    }
                    if !matches!(self.names[id].kind, NameKind::Simple { .. } | NameKind::Dependency { .. }) {
                        continue;
                    }
                    if !self.dependencies_assigned(id) {
                        continue;
                    }
                    groups.entry(self.group_key(id)).or_default().push(id);
                }
            }

            for ids in groups.into_values() {
                let namer = self.names[ids[0]].namer.clone().expect("grouped name has a namer");
                let items: Vec<(NameId, Vec<String>, BTreeSet<String>)> = ids.iter().map(|&id| (id, self.candidates_for(id), self.forbidden_names_for(self.names[id].namespace))).collect();
                let assigned = namer.assign_batch(&items);
                if !assigned.is_empty() {
                    progressed = true;
                }
                for (id, name) in assigned {
                    self.names[id].assigned = Some(name);
                }
            }

            if !progressed {
                break;
            }
        }

        if self.names.iter().any(|n| n.assigned.is_none()) {
            return Err(Error::Internal("name assignment stalled with unassigned names remaining".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::namer::pascal_case;

    #[test]
    fn fixed_name_is_assigned_immediately() {
        let mut engine = NamingEngine::new();
        let ns = engine.add_namespace();
        let id = engine.add_fixed_name(ns, 0, "Root");
        assert_eq!(engine.assigned_name(id), Some("Root"));
    }

    #[test]
    fn simple_names_in_forbidding_namespaces_avoid_each_other() {
        let mut engine = NamingEngine::new();
        let top = engine.add_namespace();
        let property = engine.add_namespace();
        engine.forbid(property, top);

        let namer = Rc::new(Namer::new(pascal_case, []));
        let a = engine.add_simple_name(top, 0, vec!["value".to_string()], namer.clone());
        let b = engine.add_simple_name(property, 1, vec!["value".to_string()], namer);

        engine.assign_all().unwrap();
        assert_ne!(engine.assigned_name(a), engine.assigned_name(b));
    }

    #[test]
    fn dependency_name_waits_for_its_probed_dependency() {
        let mut engine = NamingEngine::new();
        let ns = engine.add_namespace();
        let sponsor = engine.add_fixed_name(ns, 0, "User");
        let namer = Rc::new(Namer::new(pascal_case, []));
        let derived = engine.add_dependency_name(ns, 1, namer, move |lookup| format!("{}List", lookup(sponsor).unwrap_or_default()));

        engine.assign_all().unwrap();
        assert_eq!(engine.assigned_name(derived), Some("UserList"));
    }

    #[test]
    fn associated_name_follows_its_sponsor_without_selection() {
        let mut engine = NamingEngine::new();
        let ns = engine.add_namespace();
        let sponsor = engine.add_fixed_name(ns, 0, "User");
        let associated = engine.add_associated_name(ns, 1, sponsor, |s| format!("{s}Builder"));

        engine.assign_all().unwrap();
        assert_eq!(engine.assigned_name(associated), Some("UserBuilder"));
    }
}
