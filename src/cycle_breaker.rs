//! Repeatedly strip degree-zero nodes; when none remain but nodes are still
//! undone, walk forward from an undone node until a node repeats (the
//! cycle), hand it to a chooser, and remove the chosen breaker.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

/// Breaks cycles in a successor-list graph by repeatedly removing
/// zero-in/out-degree nodes, falling back to `choose` when a real cycle is
/// found. Returns `(breaker_node, info)` pairs in removal order.
pub fn break_cycles<I>(size: usize, successors: impl Fn(usize) -> Vec<usize>, mut choose: impl FnMut(&[usize]) -> (usize, I)) -> Result<Vec<(usize, I)>> {
    let mut out_edges: BTreeMap<usize, BTreeSet<usize>> = (0..size).map(|i| (i, successors(i).into_iter().collect())).collect();
    let mut in_edges: BTreeMap<usize, BTreeSet<usize>> = (0..size).map(|i| (i, BTreeSet::new())).collect();
    for (&from, tos) in out_edges.iter() {
        for &to in tos {
            in_edges.entry(to).or_default().insert(from);
        }
    }

    let mut done: BTreeSet<usize> = BTreeSet::new();
    let mut removed: Vec<(usize, I)> = vec![];

    loop {
        let zero_degree: Vec<usize> = (0..size)
            .filter(|n| !done.contains(n))
            .filter(|n| out_edges[n].is_empty() || in_edges[n].is_empty())
            .collect();

        if !zero_degree.is_empty() {
            for n in zero_degree {
                if done.contains(&n) {
                    continue;
                }
                remove_node(n, &mut out_edges, &mut in_edges, &mut done);
            }
            continue;
        }

        let Some(&start) = (0..size).find(|n| !done.contains(n)).as_ref() else { break };

        let mut path = vec![start];
        let mut position: BTreeMap<usize, usize> = BTreeMap::from([(start, 0)]);
        let cycle = loop {
            let current = *path.last().unwrap();
            let Some(&next) = out_edges[&current].iter().find(|n| !done.contains(n)) else {
                return Err(Error::Internal(format!("node {current} claimed to be in a cycle but has no live successor")));
            };
            if let Some(&start_idx) = position.get(&next) {
                break path[start_idx..].to_vec();
            }
            position.insert(next, path.len());
            path.push(next);
        };

        let (breaker, info) = choose(&cycle);
        if !cycle.contains(&breaker) {
            return Err(Error::Internal("chooser selected a node outside the detected cycle".to_string()));
        }
        removed.push((breaker, info));
        remove_node(breaker, &mut out_edges, &mut in_edges, &mut done);
    }

    Ok(removed)
}

fn remove_node(n: usize, out_edges: &mut BTreeMap<usize, BTreeSet<usize>>, in_edges: &mut BTreeMap<usize, BTreeSet<usize>>, done: &mut BTreeSet<usize>) {
    done.insert(n);
    let outs = out_edges.remove(&n).unwrap_or_default();
    for o in outs {
        in_edges.entry(o).or_default().remove(&n);
    }
    let ins = in_edges.remove(&n).unwrap_or_default();
    for i in ins {
        out_edges.entry(i).or_default().remove(&n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_graph_yields_no_breaks() {
        let result = break_cycles::<()>(3, |i| if i < 2 { vec![i + 1] } else { vec![] }, |_| panic!("no cycle expected")).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn self_loop_is_broken() {
        let result = break_cycles(1, |_| vec![0], |cycle| (cycle[0], ())).unwrap();
        assert_eq!(result, vec![(0, ())]);
    }

    #[test]
    fn three_cycle_breaks_at_chosen_node() {
        let result = break_cycles(3, |i| vec![(i + 1) % 3], |cycle| {
            let chosen = *cycle.iter().max().unwrap();
            (chosen, "chosen")
        })
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].1, "chosen");
    }
}
