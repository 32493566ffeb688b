//! Pipeline-level configuration.
//!
//! The source hardcodes several inference heuristic constants (spec §9,
//! Open Questions). This crate exposes them as fields on [`PipelineConfig`]
//! with the source's own defaults, so a driver can tune them without
//! forking the crate.

use crate::markov::MarkovTrie;

/// Tunable knobs for the inference and rewrite passes.
///
/// Constructed once by the driver and threaded through the pipeline;
/// nothing here is process-global state (see spec §9's "Singleton mutable
/// state" redesign note).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Property count above which [`crate::inference::infer_object`] collapses
    /// an object straight to a map instead of a class. Source default: 500.
    pub map_inference_property_threshold: usize,

    /// Whether the `InferMaps` rewrite pass is enabled at all.
    pub infer_maps: bool,

    /// How `ExpandStrings` treats restricted strings with enum cases.
    pub string_enum_inference: StringEnumInference,

    /// Minimum sample count for a string to be considered its "own enum"
    /// during enum expansion. Source default: 10.
    pub min_length_for_enum: usize,

    /// Minimum sample count for a string's case-set to be eligible to merge
    /// into an existing enum set. Source default: 5.
    pub min_length_for_overlap: usize,

    /// Fraction of a newer case-set that must already be covered by an
    /// existing enum set for the two to merge. Source default: 3/4.
    pub required_overlap: f64,

    /// Whether numeric conflation (`integer`+`double` -> `double`) is
    /// enabled when computing structural compatibility and union members.
    pub conflate_numbers: bool,

    /// Whether `ReplaceObjectType` keeps `object` types that carry both
    /// fixed properties and an `additionalProperties` type, rather than
    /// converting them to a `class` or `map`.
    pub leave_full_objects: bool,

    /// Minimum property-name count above which `CombineClasses` considers
    /// merging two classes. Below this, classes are left alone even if
    /// their name overlap looks high, since the signal is noisy on tiny
    /// classes. Source behavior treats any class as eligible; this is kept
    /// configurable instead of hardcoded true for all sizes.
    pub combine_classes_min_properties: usize,

    /// Overlap fraction required for two classes to be considered similar
    /// enough to merge. Source default: 3/4.
    pub combine_classes_required_overlap: f64,

    /// Threshold above which a [`crate::attributes::names::TypeNames`] value
    /// becomes `TooMany`. Source default: ~1000.
    pub too_many_names_threshold: usize,

    /// Lazily-decoded Markov chain handle used by `InferMaps` to score
    /// property-name sets. `None` disables the Markov heuristic, falling
    /// back to the digit-keys-only rule.
    pub markov: Option<MarkovTrie>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEnumInference {
    /// Every distinct case-set becomes its own enum.
    All,
    /// Apply the length/overlap heuristics from spec §4.8.
    Infer,
    /// Strings stay strings; no enum expansion.
    None,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            map_inference_property_threshold: 500,
            infer_maps: true,
            string_enum_inference: StringEnumInference::Infer,
            min_length_for_enum: 10,
            min_length_for_overlap: 5,
            required_overlap: 3.0 / 4.0,
            conflate_numbers: true,
            leave_full_objects: false,
            combine_classes_min_properties: 1,
            combine_classes_required_overlap: 3.0 / 4.0,
            too_many_names_threshold: 1000,
            markov: None,
        }
    }
}
