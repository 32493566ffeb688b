//! `Namer`: turns a name's raw candidate strings into one final styled,
//! collision-free string within a batch.

use std::collections::{BTreeMap, BTreeSet};

use convert_case::{Case, Casing};

use crate::naming::NameId;

/// A styling function plus a set of prefixes tried before falling back to
/// numeric suffixes. Two [`crate::naming::Name`]s sharing the same `Namer`
/// (by `Rc` identity) are batch-assigned together so they never collide
/// with each other.
pub struct Namer {
    style: fn(&str) -> String,
    prefixes: Vec<String>,
}

impl Namer {
    pub fn new(style: fn(&str) -> String, prefixes: impl IntoIterator<Item = String>) -> Self {
        Self { style, prefixes: prefixes.into_iter().collect() }
    }

    pub fn styled(&self, raw: &str) -> String {
        (self.style)(raw)
    }

    /// Styled candidates in priority order: each raw candidate as-is, each
    /// raw candidate with a prefix, then raw candidates with numeric
    /// suffixes starting at 1. Unbounded; a caller always finds a free slot
    /// eventually since the suffix sequence never repeats.
    fn propose<'a>(&'a self, candidates: &'a [String]) -> impl Iterator<Item = String> + 'a {
        let plain = candidates.iter().map(|c| self.styled(c));
        let prefixed = self.prefixes.iter().flat_map(move |prefix| candidates.iter().map(move |c| self.styled(&format!("{prefix}{c}"))));
        let suffixed = (1..).flat_map(move |n| candidates.iter().map(move |c| self.styled(&format!("{c}{n}"))));
        plain.chain(prefixed).chain(suffixed)
    }

    /// Assigns a collision-free name to each `(id, candidates, forbidden)`
    /// triple, in order, tracking names claimed earlier in this same batch
    /// so two items in the batch never pick the same string.
    pub fn assign_batch(&self, items: &[(NameId, Vec<String>, BTreeSet<String>)]) -> BTreeMap<NameId, String> {
        let mut claimed = BTreeSet::new();
        let mut result = BTreeMap::new();
        for (id, candidates, forbidden) in items {
            for candidate in self.propose(candidates) {
                if forbidden.contains(&candidate) || claimed.contains(&candidate) {
                    continue;
                }
                claimed.insert(candidate.clone());
                result.insert(*id, candidate);
                break;
            }
        }
        result
    }
}

pub fn pascal_case(raw: &str) -> String {
    raw.to_case(Case::Pascal)
}

pub fn camel_case(raw: &str) -> String {
    raw.to_case(Case::Camel)
}

pub fn screaming_snake_case(raw: &str) -> String {
    raw.to_case(Case::ScreamingSnake)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_wins_when_nothing_collides() {
        let namer = Namer::new(pascal_case, []);
        let items = vec![(0, vec!["user_id".to_string()], BTreeSet::new())];
        let assigned = namer.assign_batch(&items);
        assert_eq!(assigned[&0], "UserId");
    }

    #[test]
    fn collision_falls_through_to_numeric_suffix() {
        let namer = Namer::new(pascal_case, []);
        let mut forbidden = BTreeSet::new();
        forbidden.insert("User".to_string());
        let items = vec![(0, vec!["user".to_string()], forbidden)];
        let assigned = namer.assign_batch(&items);
        assert_eq!(assigned[&0], "User1");
    }

    #[test]
    fn two_items_in_one_batch_never_collide() {
        let namer = Namer::new(pascal_case, []);
        let items = vec![(0, vec!["item".to_string()], BTreeSet::new()), (1, vec!["item".to_string()], BTreeSet::new())];
        let assigned = namer.assign_batch(&items);
        assert_ne!(assigned[&0], assigned[&1]);
    }
}
