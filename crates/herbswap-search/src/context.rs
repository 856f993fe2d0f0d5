// Search context
//
// One value holds every parameter of a search run. Searchers are built from
// a context and own all derived state (relevance index, fit cache, seen
// set), so changing parameters means building a new searcher; there is no
// way to mutate a context under a live cache.

use std::collections::BTreeSet;

use herbswap_core::Composition;

use crate::error::SearchError;

/// Default cap on compound formulas per combination.
pub const DEFAULT_MAX_CFORMULAS: usize = 2;

/// Default cap on simple formulas per combination.
pub const DEFAULT_MAX_SFORMULAS: usize = 3;

/// Default weight on herbs the target does not ask for.
pub const DEFAULT_PENALTY_FACTOR: f64 = 2.0;

/// Default upper dosage bound, in units, for either formula kind.
pub const DEFAULT_MAX_DOSE: f64 = 50.0;

/// Default decimal places for reported dosages.
pub const DEFAULT_PLACES: u32 = 1;

/// Default number of results to keep.
pub const DEFAULT_TOP_N: usize = 5;

/// Parameters of one search run.
#[derive(Debug, Clone)]
pub struct SearchContext {
    /// Desired end mixture.
    pub target: Composition,

    /// Formula keys to leave out of the search.
    pub excludes: BTreeSet<String>,

    /// Maximum number of compound formulas per combination.
    pub max_cformulas: usize,

    /// Maximum number of simple formulas per combination.
    pub max_sformulas: usize,

    /// Weight amplifying off-target herbs in the fitted distance.
    pub penalty_factor: f64,

    /// Decimal places for reported dosages; also the resolution of the
    /// zero-dosage pruning test.
    pub places: u32,

    /// Smallest useful compound-formula dosage; fitted dosages rounding
    /// below it are treated as zero.
    pub min_cformula_dose: f64,

    /// Smallest useful simple-formula dosage.
    pub min_sformula_dose: f64,

    /// Upper dosage bound for compound formulas.
    pub max_cformula_dose: f64,

    /// Upper dosage bound for simple formulas.
    pub max_sformula_dose: f64,

    /// Number of results the caller intends to keep; sizes the beam pool.
    pub top_n: usize,

    /// Beam pool width as a multiple of `top_n`.
    pub beam_width_factor: f64,

    /// Extra pool headroom before heuristic pruning. `0.0` disables the
    /// heuristic entirely and expands every candidate (exhaustive one-step
    /// expansion).
    pub beam_multiplier: f64,
}

impl Default for SearchContext {
    fn default() -> Self {
        Self {
            target: Composition::new(),
            excludes: BTreeSet::new(),
            max_cformulas: DEFAULT_MAX_CFORMULAS,
            max_sformulas: DEFAULT_MAX_SFORMULAS,
            penalty_factor: DEFAULT_PENALTY_FACTOR,
            places: DEFAULT_PLACES,
            min_cformula_dose: 0.0,
            min_sformula_dose: 0.0,
            max_cformula_dose: DEFAULT_MAX_DOSE,
            max_sformula_dose: DEFAULT_MAX_DOSE,
            top_n: DEFAULT_TOP_N,
            beam_width_factor: 3.0,
            beam_multiplier: 4.0,
        }
    }
}

impl SearchContext {
    /// Context for the given target with default parameters.
    pub fn new(target: Composition) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    /// Set the exclusion set.
    pub fn with_excludes(mut self, excludes: impl IntoIterator<Item = String>) -> Self {
        self.excludes = excludes.into_iter().collect();
        self
    }

    /// Set the compound/simple combination caps.
    pub fn with_limits(mut self, max_cformulas: usize, max_sformulas: usize) -> Self {
        self.max_cformulas = max_cformulas;
        self.max_sformulas = max_sformulas;
        self
    }

    /// Set the off-target penalty factor.
    pub fn with_penalty_factor(mut self, penalty_factor: f64) -> Self {
        self.penalty_factor = penalty_factor;
        self
    }

    /// Set the dosage rounding precision.
    pub fn with_places(mut self, places: u32) -> Self {
        self.places = places;
        self
    }

    /// Set per-kind dosage bounds.
    pub fn with_dose_bounds(
        mut self,
        min_cformula_dose: f64,
        min_sformula_dose: f64,
        max_cformula_dose: f64,
        max_sformula_dose: f64,
    ) -> Self {
        self.min_cformula_dose = min_cformula_dose;
        self.min_sformula_dose = min_sformula_dose;
        self.max_cformula_dose = max_cformula_dose;
        self.max_sformula_dose = max_sformula_dose;
        self
    }

    /// Set beam-search tuning values.
    pub fn with_beam(mut self, top_n: usize, width_factor: f64, multiplier: f64) -> Self {
        self.top_n = top_n;
        self.beam_width_factor = width_factor;
        self.beam_multiplier = multiplier;
        self
    }

    /// Check caller preconditions before a search is built.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.penalty_factor < 0.0 {
            return Err(SearchError::InvalidParameter(format!(
                "penalty factor must be non-negative, got {}",
                self.penalty_factor
            )));
        }
        if self.max_cformula_dose <= 0.0 || self.max_sformula_dose <= 0.0 {
            return Err(SearchError::InvalidParameter(
                "dosage upper bounds must be positive".to_string(),
            ));
        }
        if self.min_cformula_dose < 0.0 || self.min_sformula_dose < 0.0 {
            return Err(SearchError::InvalidParameter(
                "dosage lower bounds must be non-negative".to_string(),
            ));
        }
        if self.min_cformula_dose > self.max_cformula_dose
            || self.min_sformula_dose > self.max_sformula_dose
        {
            return Err(SearchError::InvalidParameter(
                "dosage lower bound exceeds upper bound".to_string(),
            ));
        }
        if self.beam_width_factor < 0.0 || self.beam_multiplier < 0.0 {
            return Err(SearchError::InvalidParameter(
                "beam tuning values must be non-negative".to_string(),
            ));
        }
        if self.places > 6 {
            return Err(SearchError::InvalidParameter(format!(
                "places must be at most 6, got {}",
                self.places
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = SearchContext::default();
        assert_eq!(ctx.max_cformulas, 2);
        assert_eq!(ctx.max_sformulas, 3);
        assert_eq!(ctx.penalty_factor, 2.0);
        assert_eq!(ctx.max_cformula_dose, 50.0);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let ctx = SearchContext::default().with_penalty_factor(-1.0);
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_inverted_dose_bounds_rejected() {
        let ctx = SearchContext::default().with_dose_bounds(10.0, 0.0, 5.0, 50.0);
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_builders() {
        let target: Composition = [("桂枝", 1.0)].into_iter().collect();
        let ctx = SearchContext::new(target)
            .with_excludes(["桂枝湯".to_string()])
            .with_limits(3, 1)
            .with_beam(10, 2.0, 0.0);
        assert!(ctx.excludes.contains("桂枝湯"));
        assert_eq!(ctx.max_cformulas, 3);
        assert_eq!(ctx.top_n, 10);
        assert_eq!(ctx.beam_multiplier, 0.0);
    }
}
