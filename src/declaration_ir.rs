//! Topological ordering with forward declarations, and the companion
//! DFS-based cycle breaker for types. Grounded on the index-based
//! [`crate::cycle_breaker::break_cycles`] and [`crate::graph::Graph`]
//! machinery, specialized to walk an actual type graph by [`TypeRef`].

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::type_ref::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationStep {
    Forward(TypeRef),
    Define(TypeRef),
}

/// Builds a topological emission order over `nodes`, inserting forward
/// declarations wherever a dependency cycle leaves no other way to break
/// it. `children_of` gives each node's structural dependencies;
/// `can_be_forward_declared` says which nodes a target language is able to
/// forward-declare; `needs_declaration` filters out nodes (e.g. primitives)
/// that never need their own declaration at all.
pub fn build_declaration_order(
    nodes: &[TypeRef],
    children_of: impl Fn(TypeRef) -> Vec<TypeRef>,
    can_be_forward_declared: impl Fn(TypeRef) -> bool,
    needs_declaration: impl Fn(TypeRef) -> bool,
) -> Result<Vec<DeclarationStep>> {
    let index_of: std::collections::BTreeMap<TypeRef, usize> = nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let graph = Graph::new(nodes.to_vec(), |i| children_of(nodes[i]).into_iter().filter_map(|c| index_of.get(&c).copied()).collect(), false);

    let sccs = graph.strongly_connected_components()?;
    let roots = sccs.find_roots();

    let mut steps = vec![];
    let mut emitted = BTreeSet::new();
    for root in roots {
        emit_scc_tree(&graph, &sccs, root, &can_be_forward_declared, &needs_declaration, &mut steps, &mut emitted)?;
    }
    for ci in 0..sccs.size() {
        if !emitted.contains(&ci) {
            emit_scc_tree(&graph, &sccs, ci, &can_be_forward_declared, &needs_declaration, &mut steps, &mut emitted)?;
        }
    }
    Ok(steps)
}

fn emit_scc_tree(
    node_at: &Graph<TypeRef>,
    sccs: &Graph<Vec<usize>>,
    ci: usize,
    can_break: &impl Fn(TypeRef) -> bool,
    needs_decl: &impl Fn(TypeRef) -> bool,
    steps: &mut Vec<DeclarationStep>,
    emitted: &mut BTreeSet<usize>,
) -> Result<()> {
    if !emitted.insert(ci) {
        return Ok(());
    }
    for succ in sccs.successors(ci) {
        emit_scc_tree(node_at, sccs, succ, can_break, needs_decl, steps, emitted)?;
    }
    emit_scc(node_at, sccs.node(ci), can_break, needs_decl, steps)
}

fn emit_scc(node_at: &Graph<TypeRef>, members: &[usize], can_break: &impl Fn(TypeRef) -> bool, needs_decl: &impl Fn(TypeRef) -> bool, steps: &mut Vec<DeclarationStep>) -> Result<()> {
    if members.len() == 1 {
        let t = *node_at.node(members[0]);
        if needs_decl(t) {
            steps.push(DeclarationStep::Define(t));
        }
        return Ok(());
    }

    let forwardable: Vec<TypeRef> = members.iter().map(|&i| *node_at.node(i)).filter(|&t| can_break(t)).collect();
    if forwardable.is_empty() {
        let cycle = members.iter().map(|&i| node_at.node(i).index()).collect();
        return Err(Error::NoForwardDeclarableTypeInCycle { cycle });
    }

    for &t in &forwardable {
        steps.push(DeclarationStep::Forward(t));
    }

    let forwarded: BTreeSet<TypeRef> = forwardable.iter().copied().collect();
    for &i in members {
        let t = *node_at.node(i);
        if forwarded.contains(&t) {
            continue;
        }
        if needs_decl(t) {
            steps.push(DeclarationStep::Define(t));
        }
    }
    for &t in &forwardable {
        if needs_decl(t) {
            steps.push(DeclarationStep::Define(t));
        }
    }
    Ok(())
}

/// Walks the type graph by DFS tracking the current path; whenever a back
/// edge lands on a path member that isn't an implicit cycle breaker, picks
/// the nearest path member (scanning back toward the root) that `can_break`
/// approves, to forward-declare. Fails if no such member exists anywhere on
/// that path.
pub fn find_cycle_breakers(
    nodes: &[TypeRef],
    children_of: impl Fn(TypeRef) -> Vec<TypeRef>,
    is_implicit_cycle_breaker: impl Fn(TypeRef) -> bool,
    can_break: impl Fn(TypeRef) -> bool,
) -> Result<BTreeSet<TypeRef>> {
    let mut visited = BTreeSet::new();
    let mut breakers = BTreeSet::new();

    for &start in nodes {
        if visited.contains(&start) {
            continue;
        }
        let mut path = vec![];
        let mut on_path = BTreeSet::new();
        dfs_find_breakers(start, &children_of, &is_implicit_cycle_breaker, &can_break, &mut path, &mut on_path, &mut visited, &mut breakers)?;
    }
    Ok(breakers)
}

#[allow(clippy::too_many_arguments)]
fn dfs_find_breakers(
    node: TypeRef,
    children_of: &impl Fn(TypeRef) -> Vec<TypeRef>,
    is_implicit_cycle_breaker: &impl Fn(TypeRef) -> bool,
    can_break: &impl Fn(TypeRef) -> bool,
    path: &mut Vec<TypeRef>,
    on_path: &mut BTreeSet<TypeRef>,
    visited: &mut BTreeSet<TypeRef>,
    breakers: &mut BTreeSet<TypeRef>,
) -> Result<()> {
    visited.insert(node);
    path.push(node);
    on_path.insert(node);

    for child in children_of(node) {
        if on_path.contains(&child) {
            if !is_implicit_cycle_breaker(child) {
                match path.iter().rev().find(|&&p| can_break(p)) {
                    Some(&breaker) => {
                        breakers.insert(breaker);
                    }
                    None => {
                        let cycle = path.iter().map(|t| t.index()).collect();
                        return Err(Error::NoForwardDeclarableTypeInCycle { cycle });
                    }
                }
            }
        } else if !visited.contains(&child) {
            dfs_find_breakers(child, children_of, is_implicit_cycle_breaker, can_break, path, on_path, visited, breakers)?;
        }
    }

    path.pop();
    on_path.remove(&node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: usize) -> TypeRef {
        TypeRef::new(1, i)
    }

    #[test]
    fn acyclic_chain_emits_children_before_parents() {
        // 0 -> 1 -> 2 (0 depends on 1, 1 depends on 2)
        let nodes = [t(0), t(1), t(2)];
        let children = |n: TypeRef| match n.index() {
            0 => vec![t(1)],
            1 => vec![t(2)],
            _ => vec![],
        };
        let steps = build_declaration_order(&nodes, children, |_| false, |_| true).unwrap();
        let order: Vec<usize> = steps
            .iter()
            .map(|s| match s {
                DeclarationStep::Define(r) => r.index(),
                DeclarationStep::Forward(r) => r.index(),
            })
            .collect();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn cycle_with_no_forward_declarable_member_fails() {
        let nodes = [t(0), t(1)];
        let children = |n: TypeRef| match n.index() {
            0 => vec![t(1)],
            1 => vec![t(0)],
            _ => vec![],
        };
        let err = build_declaration_order(&nodes, children, |_| false, |_| true).unwrap_err();
        assert!(matches!(err, Error::NoForwardDeclarableTypeInCycle { .. }));
    }

    #[test]
    fn cycle_breaks_at_forward_declarable_member() {
        let nodes = [t(0), t(1)];
        let children = |n: TypeRef| match n.index() {
            0 => vec![t(1)],
            1 => vec![t(0)],
            _ => vec![],
        };
        let steps = build_declaration_order(&nodes, children, |r| r.index() == 1, |_| true).unwrap();
        assert!(steps.contains(&DeclarationStep::Forward(t(1))));
        assert!(steps.contains(&DeclarationStep::Define(t(1))));
        assert!(steps.contains(&DeclarationStep::Define(t(0))));
    }
}
