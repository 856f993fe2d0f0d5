// Exhaustive searcher
//
// Enumerates every compound-formula subset up to the size cap, then grows
// each subset with simple formulas through a greedy single-herb extension:
// fit the current combination, find the target herb with the largest
// unsatisfied remainder, and branch over every simple formula providing it.
// Extension state lives on an explicit stack rather than the call stack so
// traversal order and memory stay bounded and predictable.

use std::collections::VecDeque;

use herbswap_core::{Composition, FormulaDatabase};
use itertools::Itertools;

use crate::candidate::Candidate;
use crate::context::SearchContext;
use crate::eval::Evaluator;
use crate::fit::round_to;
use crate::index::RelevanceIndex;

/// Lazy exhaustive search over one context.
///
/// Yields every distinct evaluable combination; callers usually feed this
/// into [`crate::rank::top_matches`].
pub struct ExhaustiveSearch<'db> {
    evaluator: Evaluator<'db>,
    target: Composition,
    index: RelevanceIndex,
    max_sformulas: usize,
    places: u32,
    subsets: Box<dyn Iterator<Item = Vec<String>>>,
    stack: Vec<(Vec<String>, usize)>,
}

impl<'db> ExhaustiveSearch<'db> {
    /// Build the searcher; derived indices are computed here, once.
    pub fn new(database: &'db FormulaDatabase, context: &SearchContext) -> Self {
        let index = RelevanceIndex::build(database, &context.target, &context.excludes);

        let cformulas = index.cformulas.clone();
        let size_cap = context.max_cformulas.min(cformulas.len());
        let subsets = Box::new(
            (0..=size_cap).flat_map(move |k| cformulas.clone().into_iter().combinations(k)),
        );

        Self {
            evaluator: Evaluator::new(database, context),
            target: context.target.clone(),
            index,
            max_sformulas: context.max_sformulas,
            places: context.places,
            subsets,
            stack: Vec::new(),
        }
    }

    /// Push the simple-formula children of `combination` onto the stack.
    ///
    /// Greedy step: only the herb with the largest unsatisfied remainder
    /// branches; deeper levels pick up the rest.
    fn push_extensions(&mut self, combination: &[String], used: usize) {
        let Ok(fit) = self.evaluator.fit(combination) else {
            return;
        };
        let combined = self.evaluator.combined(&fit);

        let mut best: Option<(&str, f64)> = None;
        for (herb, amount) in self.target.iter() {
            let remaining = amount - combined.amount(herb);
            if round_to(remaining, self.places) <= 0.0 {
                continue;
            }
            if best.map_or(true, |(_, current)| remaining > current) {
                best = Some((herb, remaining));
            }
        }
        let Some((herb, _)) = best else {
            return;
        };

        let mut children: VecDeque<Vec<String>> = VecDeque::new();
        for provider in self.index.providers(herb) {
            if combination.iter().any(|key| key == provider) {
                continue;
            }
            let mut child = combination.to_vec();
            child.push(provider.clone());
            children.push_back(child);
        }
        // Reversed so the stack pops providers in database order.
        while let Some(child) = children.pop_back() {
            self.stack.push((child, used + 1));
        }
    }
}

impl Iterator for ExhaustiveSearch<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            let (combination, used) = match self.stack.pop() {
                Some(entry) => entry,
                None => (self.subsets.next()?, 0),
            };

            if used < self.max_sformulas {
                self.push_extensions(&combination, used);
            }

            // The bare empty combination drives extensions but is not a
            // result in itself.
            if combination.is_empty() {
                continue;
            }
            if let Some(candidate) = self.evaluator.evaluate(&combination) {
                return Some(candidate);
            }
        }
    }
}
