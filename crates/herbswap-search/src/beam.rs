// Beam searcher
//
// Grows combinations one compound formula per depth and prunes the
// expansion frontier with a cheap cosine heuristic before paying for the
// exact nonlinear fit. The heuristic only ranks candidates; every emitted
// candidate is scored by the real fitter. Survivors of every depth are
// yielded, not just the deepest, because a shorter combination may beat a
// longer one.

use std::collections::VecDeque;

use herbswap_core::{Composition, FormulaDatabase};

use crate::candidate::Candidate;
use crate::context::SearchContext;
use crate::eval::Evaluator;
use crate::fit::Fit;

/// Lazy depth-bounded beam search over one context.
pub struct BeamSearch<'db> {
    database: &'db FormulaDatabase,
    evaluator: Evaluator<'db>,
    target: Composition,
    cformulas: Vec<String>,
    penalty_factor: f64,
    max_cformulas: usize,
    top_n: usize,
    beam_width_factor: f64,
    beam_multiplier: f64,
    depth: usize,
    parents: Vec<Vec<String>>,
    buffer: VecDeque<Candidate>,
    started: bool,
}

impl<'db> BeamSearch<'db> {
    /// Build the searcher; the relevance partition is computed here, once.
    pub fn new(database: &'db FormulaDatabase, context: &SearchContext) -> Self {
        let index = crate::index::RelevanceIndex::build(
            database,
            &context.target,
            &context.excludes,
        );

        Self {
            database,
            evaluator: Evaluator::new(database, context),
            target: context.target.clone(),
            cformulas: index.cformulas,
            penalty_factor: context.penalty_factor,
            max_cformulas: context.max_cformulas,
            top_n: context.top_n,
            beam_width_factor: context.beam_width_factor,
            beam_multiplier: context.beam_multiplier,
            depth: 0,
            parents: Vec::new(),
            buffer: VecDeque::new(),
            started: false,
        }
    }

    /// Heuristic candidates kept per parent, or `None` when pruning is
    /// disabled (`beam_multiplier == 0`).
    fn quota(&self, surviving_parents: usize) -> Option<usize> {
        if self.beam_multiplier <= 0.0 {
            return None;
        }
        let pool = self.top_n as f64 * self.beam_width_factor * self.beam_multiplier;
        Some((pool / surviving_parents as f64).ceil() as usize)
    }

    /// Target herbs still unsatisfied by the parent's fitted combination.
    fn remaining_target(&mut self, parent: &[String]) -> Composition {
        let fit: Fit = match self.evaluator.fit(parent) {
            Ok(fit) => fit,
            // Parents come from successful evaluations, so this fit is
            // already cached and cannot fail.
            Err(_) => return self.target.clone(),
        };
        let combined = self.evaluator.combined(&fit);
        self.target
            .iter()
            .filter_map(|(herb, amount)| {
                let remaining = amount - combined.amount(herb);
                (remaining > 0.0).then(|| (herb, remaining))
            })
            .collect()
    }

    /// Expand one depth: heuristic-rank extensions per parent, exact-fit
    /// the kept ones, and queue the survivors.
    fn expand(&mut self) {
        let parents = std::mem::take(&mut self.parents);
        let quota = self.quota(parents.len().max(1));
        let mut next_parents = Vec::new();

        for parent in &parents {
            let remaining = self.remaining_target(parent);

            let mut extensions: Vec<(f64, String)> = self
                .cformulas
                .iter()
                .filter(|formula| !parent.contains(formula))
                .map(|formula| {
                    let score = self
                        .database
                        .get(formula)
                        .map(|composition| {
                            heuristic_score(&remaining, composition, self.penalty_factor)
                        })
                        .unwrap_or(0.0);
                    (score, formula.clone())
                })
                .collect();

            if let Some(quota) = quota {
                extensions.sort_by(|a, b| b.0.total_cmp(&a.0));
                extensions.truncate(quota);
            }

            for (_, formula) in extensions {
                let mut combination = parent.clone();
                combination.push(formula);
                if let Some(candidate) = self.evaluator.evaluate(&combination) {
                    next_parents.push(candidate.combination.clone());
                    self.buffer.push_back(candidate);
                }
            }
        }

        self.parents = next_parents;
    }
}

impl Iterator for BeamSearch<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some(candidate) = self.buffer.pop_front() {
                return Some(candidate);
            }

            if !self.started {
                self.started = true;
                // Depth 0: the empty combination is a real survivor; it
                // scores 0% against a non-empty target and anchors the
                // ranking floor.
                self.parents.push(Vec::new());
                if let Some(candidate) = self.evaluator.evaluate(&[]) {
                    self.buffer.push_back(candidate);
                }
                continue;
            }

            if self.depth >= self.max_cformulas || self.parents.is_empty() {
                return None;
            }
            self.expand();
            self.depth += 1;
        }
    }
}

/// Cosine-similarity ranking heuristic in `[0, 1]`.
///
/// Compares the remaining target against a candidate formula's composition.
/// The candidate's herbs outside the remaining target are scaled by
/// `1/penalty_factor` before normalization, mirroring how the exact fit
/// discounts what the penalty will suppress. Ranking only; never a
/// substitute for the exact fit.
pub fn heuristic_score(
    remaining: &Composition,
    candidate: &Composition,
    penalty_factor: f64,
) -> f64 {
    if remaining.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let remaining_norm = remaining.variance();
    if remaining_norm == 0.0 {
        return 0.0;
    }

    let mut dot = 0.0;
    for (herb, amount) in remaining.iter() {
        dot += amount * candidate.amount(herb);
    }

    let off_scale = if penalty_factor > 0.0 {
        1.0 / penalty_factor
    } else {
        1.0
    };
    let mut norm_squared = 0.0;
    for (herb, amount) in candidate.iter() {
        let scaled = if remaining.contains(herb) {
            amount
        } else {
            amount * off_scale
        };
        norm_squared += scaled * scaled;
    }
    if norm_squared == 0.0 {
        return 0.0;
    }

    dot / (remaining_norm * norm_squared.sqrt())
}
