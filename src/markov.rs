//! Character-level Markov model used to tell "these property names look like
//! natural words" (a `class`) from "these look like opaque keys" (a `map`).
//!
//! A driver can ship a larger trained model as a gzip+base64 blob via
//! [`MarkovTrie::from_base64_gzip`]; [`MarkovTrie::default`] falls back to a
//! small built-in corpus. Either way the result is an owned value threaded
//! through [`crate::config::PipelineConfig`], not process-global state.

use std::collections::HashMap;
use std::io::Read;

use base64::Engine;

const ORDER: usize = 3;

/// A corpus of n-gram log-frequencies plus the average used as a smoothing
/// fallback for n-grams never observed in training.
#[derive(Debug, Clone)]
pub struct MarkovTrie {
    order: usize,
    log_freq: HashMap<String, f64>,
    average: f64,
}

/// Words used to seed the built-in model. Deliberately small: enough to
/// separate "englishLikeIdentifier" from "a3f9c2e1", not a real corpus.
const BUILTIN_WORDS: &[&str] = &[
    "name", "value", "id", "type", "description", "title", "status", "count",
    "created", "updated", "user", "email", "address", "city", "state",
    "country", "code", "price", "amount", "total", "quantity", "item",
    "order", "customer", "product", "category", "tag", "label", "key",
    "index", "parent", "child", "owner", "group", "role", "permission",
    "message", "content", "body", "header", "footer", "date", "time",
    "timestamp", "duration", "version", "language", "locale", "currency",
];

impl MarkovTrie {
    /// Builds a model from a stream of training words.
    pub fn trained<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut total: u64 = 0;

        for word in words {
            let padded = format!("^{}$", word.as_ref().to_lowercase());
            let chars: Vec<char> = padded.chars().collect();
            if chars.len() < ORDER {
                continue;
            }
            for window in chars.windows(ORDER) {
                let gram: String = window.iter().collect();
                *counts.entry(gram).or_insert(0) += 1;
                total += 1;
            }
        }

        let total = total.max(1) as f64;
        let log_freq: HashMap<String, f64> = counts
            .into_iter()
            .map(|(gram, count)| (gram, (count as f64 / total).ln()))
            .collect();
        let average = log_freq.values().copied().sum::<f64>() / (log_freq.len().max(1) as f64);

        Self { order: ORDER, log_freq, average }
    }

    /// Decodes a base64-encoded, gzip-compressed serialized model.
    ///
    /// Wire format: newline-separated `gram<TAB>log_freq` lines followed by
    /// a trailing `#average<TAB>value` line. This is the format a driver
    /// would export a larger trained model in.
    pub fn from_base64_gzip(data: &str) -> crate::error::Result<Self> {
        let compressed = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| crate::error::Error::Internal(format!("invalid base64 markov blob: {e}")))?;

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(|e| crate::error::Error::Internal(format!("invalid gzip markov blob: {e}")))?;

        let mut log_freq = HashMap::new();
        let mut average = 0.0;
        for line in text.lines() {
            let Some((key, value)) = line.split_once('\t') else { continue };
            let Ok(value) = value.parse::<f64>() else { continue };
            if key == "#average" {
                average = value;
            } else {
                log_freq.insert(key.to_string(), value);
            }
        }

        Ok(Self { order: ORDER, log_freq, average })
    }

    /// Per-character average log-probability of `s` under this model; higher
    /// (closer to zero) means more word-like.
    pub fn score(&self, s: &str) -> f64 {
        let padded = format!("^{}$", s.to_lowercase());
        let chars: Vec<char> = padded.chars().collect();
        if chars.len() < self.order {
            return self.average;
        }
        let windows: Vec<_> = chars.windows(self.order).collect();
        let sum: f64 = windows
            .iter()
            .map(|w| {
                let gram: String = w.iter().collect();
                *self.log_freq.get(&gram).unwrap_or(&self.average)
            })
            .sum();
        sum / windows.len() as f64
    }

    /// True if the average score of `names` falls below `threshold`, i.e.
    /// they look more like opaque keys than natural-language property names.
    pub fn looks_random(&self, names: &[String], threshold: f64) -> bool {
        if names.is_empty() {
            return false;
        }
        let avg = names.iter().map(|n| self.score(n)).sum::<f64>() / names.len() as f64;
        avg < threshold
    }
}

impl Default for MarkovTrie {
    fn default() -> Self {
        Self::trained(BUILTIN_WORDS.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_like_names_score_higher_than_random_keys() {
        let markov = MarkovTrie::default();
        let words = vec!["name".to_string(), "description".to_string(), "status".to_string()];
        let keys = vec!["a3f9c2e1".to_string(), "x9z1q2w3".to_string(), "zzqv7j2k".to_string()];

        let word_score: f64 = words.iter().map(|w| markov.score(w)).sum::<f64>() / words.len() as f64;
        let key_score: f64 = keys.iter().map(|k| markov.score(k)).sum::<f64>() / keys.len() as f64;

        assert!(word_score > key_score);
    }

    #[test]
    fn roundtrips_through_base64_gzip() {
        use std::io::Write;

        let trained = MarkovTrie::trained(BUILTIN_WORDS.iter());
        let mut text = String::new();
        for (gram, freq) in &trained.log_freq {
            text.push_str(&format!("{gram}\t{freq}\n"));
        }
        text.push_str(&format!("#average\t{}\n", trained.average));

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);

        let decoded = MarkovTrie::from_base64_gzip(&encoded).unwrap();
        assert_eq!(decoded.log_freq.len(), trained.log_freq.len());
    }
}
