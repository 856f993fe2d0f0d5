// Shared candidate evaluation
//
// Both search strategies funnel every combination through one evaluator:
// fit (memoized), zero-dosage pruning, duplicate suppression on the pruned
// set, then match scoring. A failed fit skips the candidate without
// aborting the surrounding search.

use std::collections::{BTreeSet, HashSet};

use herbswap_core::FormulaDatabase;
use tracing::debug;

use crate::candidate::Candidate;
use crate::context::SearchContext;
use crate::error::FitError;
use crate::fit::{round_to, DosageFitter, Fit};
use crate::score::match_percentage;

/// Fits, dedups, and scores combinations for one search run.
pub struct Evaluator<'db> {
    fitter: DosageFitter<'db>,
    seen: HashSet<BTreeSet<String>>,
}

impl<'db> Evaluator<'db> {
    /// Build an evaluator scoped to one search run.
    pub fn new(database: &'db FormulaDatabase, context: &SearchContext) -> Self {
        Self {
            fitter: DosageFitter::new(database, context),
            seen: HashSet::new(),
        }
    }

    /// Access to the underlying fitter (searchers reuse its memoized fits
    /// when computing remaining targets).
    pub fn fit(&mut self, combination: &[String]) -> Result<Fit, FitError> {
        self.fitter.fit(combination)
    }

    /// Combined composition of a fit at its fitted dosages.
    pub fn combined(&self, fit: &Fit) -> herbswap_core::Composition {
        self.fitter.combined(fit)
    }

    /// Target magnitude for this run.
    pub fn variance(&self) -> f64 {
        self.fitter.variance()
    }

    /// Evaluate a combination into a candidate.
    ///
    /// Returns `None` when the fit fails or when the pruned formula set was
    /// already emitted earlier in this run.
    pub fn evaluate(&mut self, combination: &[String]) -> Option<Candidate> {
        let fit = match self.fitter.fit(combination) {
            Ok(fit) => fit,
            Err(err) => {
                debug!("skipping combination {combination:?}: {err}");
                return None;
            }
        };

        let identity: BTreeSet<String> = fit.combination.iter().cloned().collect();
        if !self.seen.insert(identity) {
            return None;
        }

        let places = self.fitter.places();
        Some(Candidate {
            match_percentage: match_percentage(fit.delta, self.fitter.variance()),
            dosages: fit.dosages.iter().map(|d| round_to(*d, places)).collect(),
            combination: fit.combination,
        })
    }
}
