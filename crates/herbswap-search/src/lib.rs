//! Combination search engine for herbal formula substitution.
//!
//! Given a target mixture and a formula database, finds combinations of
//! stocked formulas whose combined composition approximates the target,
//! with per-formula dosages fitted by bounded least squares. Two search
//! strategies are provided: [`ExhaustiveSearch`] enumerates every compound
//! subset and grows it with simple formulas, while [`BeamSearch`] expands
//! depth-wise under a heuristic pruning pool. Both are lazy iterators of
//! [`Candidate`] values, usually fed into [`top_matches`].
//!
//! ```no_run
//! use herbswap_core::{Composition, FormulaDatabase};
//! use herbswap_search::{find_best_matches, SearchContext, Strategy};
//!
//! # fn run(database: &FormulaDatabase) -> Result<(), herbswap_search::SearchError> {
//! let target: Composition = [("桂枝", 3.0), ("甘草", 2.0)].into_iter().collect();
//! let context = SearchContext::new(target);
//! let matches = find_best_matches(database, &context, Strategy::Exhaustive)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod beam;
pub mod candidate;
pub mod context;
pub mod error;
pub mod eval;
pub mod exhaustive;
pub mod fit;
pub mod index;
pub mod rank;
pub mod score;

pub use beam::{heuristic_score, BeamSearch};
pub use candidate::Candidate;
pub use context::SearchContext;
pub use error::{FitError, SearchError};
pub use exhaustive::ExhaustiveSearch;
pub use fit::{round_to, DosageFitter, Fit};
pub use index::RelevanceIndex;
pub use rank::top_matches;
pub use score::{match_percentage, match_ratio};

use herbswap_core::FormulaDatabase;
use serde::{Deserialize, Serialize};

/// Which search strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Enumerate every compound subset up to the size cap.
    #[default]
    Exhaustive,
    /// Depth-wise expansion with heuristic frontier pruning.
    Beam,
}

/// A running search of either strategy.
///
/// Yields candidates lazily; callers can stop early (deadlines, first good
/// enough match) without paying for the rest of the space.
pub enum Searcher<'db> {
    /// Exhaustive enumeration.
    Exhaustive(ExhaustiveSearch<'db>),
    /// Beam expansion.
    Beam(BeamSearch<'db>),
}

impl Iterator for Searcher<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        match self {
            Searcher::Exhaustive(search) => search.next(),
            Searcher::Beam(search) => search.next(),
        }
    }
}

/// Start an exhaustive search after validating the context.
pub fn search_exhaustive<'db>(
    database: &'db FormulaDatabase,
    context: &SearchContext,
) -> Result<ExhaustiveSearch<'db>, SearchError> {
    context.validate()?;
    Ok(ExhaustiveSearch::new(database, context))
}

/// Start a beam search after validating the context.
pub fn search_beam<'db>(
    database: &'db FormulaDatabase,
    context: &SearchContext,
) -> Result<BeamSearch<'db>, SearchError> {
    context.validate()?;
    Ok(BeamSearch::new(database, context))
}

/// Start a search with the given strategy.
pub fn search<'db>(
    database: &'db FormulaDatabase,
    context: &SearchContext,
    strategy: Strategy,
) -> Result<Searcher<'db>, SearchError> {
    match strategy {
        Strategy::Exhaustive => search_exhaustive(database, context).map(Searcher::Exhaustive),
        Strategy::Beam => search_beam(database, context).map(Searcher::Beam),
    }
}

/// Run a search to completion and return the top `context.top_n` matches in
/// descending match-percentage order.
pub fn find_best_matches(
    database: &FormulaDatabase,
    context: &SearchContext,
    strategy: Strategy,
) -> Result<Vec<Candidate>, SearchError> {
    let searcher = search(database, context, strategy)?;
    Ok(top_matches(searcher, context.top_n))
}

/// Fit dosages for one explicit combination outside a search run.
///
/// Convenience wrapper for callers who already know the combination and only
/// want the fitted dosages and distance.
pub fn fit_dosages(
    database: &FormulaDatabase,
    combination: &[String],
    context: &SearchContext,
) -> Result<Fit, FitError> {
    DosageFitter::new(database, context).fit(combination)
}
