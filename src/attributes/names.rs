//! `TypeNames`: the richest attribute kind. Tracks the set of candidate
//! names a type has accrued, at what "distance" (0 = given directly by the
//! input, >0 = inferred by walking further from an explicit name), and
//! degrades to a single synthetic name once too many candidates accrue.

use std::collections::BTreeSet;

/// Adjectives used to build a synthetic name once a type's candidate-name
/// set grows past the configured threshold. Small and deterministic:
/// callers seed the index themselves so results stay repeatable.
const ADJECTIVES: &[&str] = &[
    "fancy", "ancient", "awesome", "curious", "odd", "quiet", "rapid", "silent", "bold", "gentle",
];
const NOUNS: &[&str] = &[
    "union", "thing", "object", "value", "entry", "item", "element", "record", "shape", "blob",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeNames {
    Regular { names: BTreeSet<String>, alternative_names: BTreeSet<String>, distance: u32 },
    TooMany { distance: u32, synthetic_name: String },
}

impl TypeNames {
    pub fn new(names: impl IntoIterator<Item = String>, distance: u32) -> Self {
        Self::Regular { names: names.into_iter().collect(), alternative_names: BTreeSet::new(), distance }
    }

    pub fn distance(&self) -> u32 {
        match self {
            TypeNames::Regular { distance, .. } => *distance,
            TypeNames::TooMany { distance, .. } => *distance,
        }
    }

    /// Deterministic synthetic name from `ADJECTIVES`/`NOUNS`, seeded by a
    /// caller-supplied index so the same type always gets the same name
    /// across a run regardless of accumulation order.
    pub fn synthetic_name(seed: usize) -> String {
        format!("{}{}", ADJECTIVES[seed % ADJECTIVES.len()], capitalize(NOUNS[(seed / ADJECTIVES.len()) % NOUNS.len()]))
    }

    /// Promotes to `TooMany` if the live name count exceeds `threshold`.
    pub fn check_too_many(self, threshold: usize, seed: usize) -> Self {
        match self {
            TypeNames::Regular { names, distance, .. } if names.len() > threshold => {
                TypeNames::TooMany { distance, synthetic_name: Self::synthetic_name(seed) }
            }
            other => other,
        }
    }

    /// Combines `self` with `others`, keeping only the names at the
    /// smallest distance among all operands (ties union their name sets).
    /// A `TooMany` operand participates only via its distance; if the
    /// overall winner is a `TooMany` operand, the result stays `TooMany`.
    pub fn combine<'a>(values: impl IntoIterator<Item = &'a TypeNames>) -> Option<TypeNames> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let mut best_distance = first.distance();
        let mut regulars: Vec<&TypeNames> = vec![];
        let mut too_many: Option<&TypeNames> = None;
        match first {
            TypeNames::Regular { .. } => regulars.push(first),
            TypeNames::TooMany { .. } => too_many = Some(first),
        }

        for v in iter {
            match v.distance().cmp(&best_distance) {
                std::cmp::Ordering::Less => {
                    best_distance = v.distance();
                    regulars.clear();
                    too_many = None;
                    match v {
                        TypeNames::Regular { .. } => regulars.push(v),
                        TypeNames::TooMany { .. } => too_many = Some(v),
                    }
                }
                std::cmp::Ordering::Equal => match v {
                    TypeNames::Regular { .. } => regulars.push(v),
                    TypeNames::TooMany { .. } => too_many = Some(v),
                },
                std::cmp::Ordering::Greater => {}
            }
        }

        if let Some(tm) = too_many {
            if regulars.is_empty() {
                return Some(tm.clone());
            }
        }

        let mut names = BTreeSet::new();
        let mut alternative_names = BTreeSet::new();
        for r in regulars {
            if let TypeNames::Regular { names: n, alternative_names: a, .. } = r {
                names.extend(n.iter().cloned());
                alternative_names.extend(a.iter().cloned());
            }
        }
        Some(TypeNames::Regular { names, alternative_names, distance: best_distance })
    }

    /// Erases names that were purely inferred (`distance > 0`), returning an
    /// empty-but-valid `Regular` at distance 0.
    pub fn clear_inferred(&self) -> TypeNames {
        match self {
            TypeNames::Regular { distance, .. } if *distance > 0 => {
                TypeNames::Regular { names: BTreeSet::new(), alternative_names: BTreeSet::new(), distance: 0 }
            }
            TypeNames::TooMany { distance, .. } if *distance > 0 => {
                TypeNames::Regular { names: BTreeSet::new(), alternative_names: BTreeSet::new(), distance: 0 }
            }
            other => other.clone(),
        }
    }

    pub fn increase_distance(&self) -> TypeNames {
        match self {
            TypeNames::Regular { names, alternative_names, distance } => {
                TypeNames::Regular { names: names.clone(), alternative_names: alternative_names.clone(), distance: distance + 1 }
            }
            TypeNames::TooMany { distance, synthetic_name } => {
                TypeNames::TooMany { distance: distance + 1, synthetic_name: synthetic_name.clone() }
            }
        }
    }

    pub fn make_inferred(&self) -> TypeNames {
        self.increase_distance()
    }

    pub fn singularize(&self, singular: impl Fn(&str) -> String) -> TypeNames {
        match self {
            TypeNames::Regular { names, alternative_names, distance } => TypeNames::Regular {
                names: names.iter().map(|n| singular(n)).collect(),
                alternative_names: alternative_names.iter().map(|n| singular(n)).collect(),
                distance: *distance,
            },
            TypeNames::TooMany { .. } => self.clone(),
        }
    }

    /// A representative name derived from the longest common word prefix
    /// and suffix (each only counted if >=3 characters once joined),
    /// falling back to the first name alphabetically.
    pub fn combined_name(&self) -> String {
        match self {
            TypeNames::TooMany { synthetic_name, .. } => synthetic_name.clone(),
            TypeNames::Regular { names, .. } if names.is_empty() => "unknown".to_string(),
            TypeNames::Regular { names, .. } => {
                let word_lists: Vec<Vec<String>> = names.iter().map(|n| split_words(n)).collect();
                let prefix = common_prefix(&word_lists);
                let suffix = common_suffix(&word_lists, prefix.len());

                let mut combined = String::new();
                for w in &prefix {
                    combined.push_str(w);
                }
                for w in &suffix {
                    combined.push_str(w);
                }

                if combined.len() >= 3 {
                    combined
                } else {
                    names.iter().next().cloned().unwrap_or_else(|| "unknown".to_string())
                }
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c.to_ascii_lowercase());
            prev_lower = c.is_lowercase() || c.is_numeric();
        } else {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn common_prefix(word_lists: &[Vec<String>]) -> Vec<String> {
    let Some(first) = word_lists.first() else { return vec![] };
    let mut prefix = vec![];
    'outer: for (i, word) in first.iter().enumerate() {
        for other in &word_lists[1..] {
            if other.get(i) != Some(word) {
                break 'outer;
            }
        }
        prefix.push(word.clone());
    }
    prefix
}

fn common_suffix(word_lists: &[Vec<String>], prefix_len: usize) -> Vec<String> {
    let Some(first) = word_lists.first() else { return vec![] };
    let mut suffix = vec![];
    let max_len = first.len().saturating_sub(prefix_len);
    for i in 0..max_len {
        let idx_from_end = first.len() - 1 - i;
        if idx_from_end < prefix_len {
            break;
        }
        let word = &first[idx_from_end];
        for other in &word_lists[1..] {
            if other.len() <= i || other.len() - 1 - i < prefix_len {
                return suffix;
            }
            if &other[other.len() - 1 - i] != word {
                return suffix;
            }
        }
        suffix.insert(0, word.clone());
    }
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_keeps_smallest_distance() {
        let explicit = TypeNames::new(["user".to_string()], 0);
        let inferred = TypeNames::new(["account".to_string()], 1);
        let combined = TypeNames::combine([&explicit, &inferred]).unwrap();
        assert_eq!(combined, TypeNames::new(["user".to_string()], 0));
    }

    #[test]
    fn combine_unions_names_at_tied_distance() {
        let a = TypeNames::new(["user".to_string()], 0);
        let b = TypeNames::new(["account".to_string()], 0);
        let combined = TypeNames::combine([&a, &b]).unwrap();
        match combined {
            TypeNames::Regular { names, .. } => {
                assert!(names.contains("user"));
                assert!(names.contains("account"));
            }
            _ => panic!("expected Regular"),
        }
    }

    #[test]
    fn combined_name_uses_common_prefix() {
        let names = TypeNames::new(["userAddress".to_string(), "userEmail".to_string()], 0);
        assert_eq!(names.combined_name(), "user");
    }

    #[test]
    fn combined_name_falls_back_when_prefix_too_short() {
        let names = TypeNames::new(["foo".to_string(), "bar".to_string()], 0);
        let result = names.combined_name();
        assert!(result == "foo" || result == "bar");
    }
}
