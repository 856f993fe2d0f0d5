// Dosage fitter
//
// Given a fixed combination of formulas, finds the non-negative per-formula
// dosages minimizing the weighted distance to the target. The objective
//
//   delta(x)^2 = Σ_{c in target} (target_c - combined_c)^2
//              + Σ_{c not in target} (penalty_factor * combined_c)^2
//
// is a convex quadratic in x under box constraints 0 <= x_j <= max_dose, so
// projected gradient descent with a Lipschitz step converges to the global
// minimum. Outcomes are memoized per unordered formula set for the lifetime
// of one search run; fitted dosages rounding to zero drop their formula and
// the reduced set is re-fit from a warm start until a fixed point.

use std::collections::HashMap;

use herbswap_core::{Composition, FormulaDatabase};
use tracing::trace;

use crate::context::SearchContext;
use crate::error::FitError;

/// Iteration cap for the projected gradient loop.
const MAX_ITERATIONS: usize = 100_000;

/// Sup-norm change per iteration below which the fit is converged.
const CONVERGENCE_TOL: f64 = 1e-10;

/// Round to the given number of decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Result of fitting one combination.
///
/// `combination` is the input minus any formulas pruned at zero dosage;
/// `dosages` aligns with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fit {
    /// Surviving formula keys, in input order.
    pub combination: Vec<String>,

    /// Fitted dosage per surviving formula.
    pub dosages: Vec<f64>,

    /// Weighted distance to the target at the fitted dosages.
    pub delta: f64,
}

impl Fit {
    fn empty(delta: f64) -> Self {
        Self {
            combination: Vec::new(),
            dosages: Vec::new(),
            delta,
        }
    }
}

/// Bounded least-squares fitter with a per-run memo cache.
pub struct DosageFitter<'db> {
    database: &'db FormulaDatabase,
    target: Composition,
    variance: f64,
    penalty_factor: f64,
    places: u32,
    min_cformula_dose: f64,
    min_sformula_dose: f64,
    max_cformula_dose: f64,
    max_sformula_dose: f64,
    cache: HashMap<Vec<String>, Result<Fit, FitError>>,
}

impl<'db> DosageFitter<'db> {
    /// Build a fitter for one search run.
    pub fn new(database: &'db FormulaDatabase, context: &SearchContext) -> Self {
        Self {
            database,
            variance: context.target.variance(),
            target: context.target.clone(),
            penalty_factor: context.penalty_factor,
            places: context.places,
            min_cformula_dose: context.min_cformula_dose,
            min_sformula_dose: context.min_sformula_dose,
            max_cformula_dose: context.max_cformula_dose,
            max_sformula_dose: context.max_sformula_dose,
            cache: HashMap::new(),
        }
    }

    /// The target this fitter was built for.
    pub fn target(&self) -> &Composition {
        &self.target
    }

    /// Euclidean magnitude of the target.
    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Dosage rounding precision.
    pub fn places(&self) -> u32 {
        self.places
    }

    /// Fit the combination, memoized by its unordered formula set.
    pub fn fit(&mut self, combination: &[String]) -> Result<Fit, FitError> {
        let mut key = combination.to_vec();
        key.sort_unstable();
        if let Some(result) = self.cache.get(&key) {
            return result.clone();
        }
        let result = self.fit_uncached(combination);
        self.cache.insert(key, result.clone());
        result
    }

    /// Combined composition of a fit's formulas at their fitted dosages.
    pub fn combined(&self, fit: &Fit) -> Composition {
        herbswap_core::combine(
            fit.combination
                .iter()
                .zip(&fit.dosages)
                .filter_map(|(key, dosage)| {
                    self.database.get(key).map(|composition| (composition, *dosage))
                }),
        )
    }

    /// Weighted distance of an explicit dosage vector, without optimizing.
    pub fn evaluate_delta(
        &self,
        combination: &[String],
        dosages: &[f64],
    ) -> Result<f64, FitError> {
        let problem = Problem::assemble(self, combination)?;
        Ok(problem.objective(dosages).sqrt())
    }

    fn fit_uncached(&self, combination: &[String]) -> Result<Fit, FitError> {
        let mut combination = combination.to_vec();
        let mut guess: Option<Vec<f64>> = None;

        // Fixed-point pruning loop: terminates because each pass either
        // keeps every formula or strictly shrinks the combination.
        loop {
            if combination.is_empty() {
                return Ok(Fit::empty(self.variance));
            }

            let (dosages, delta) = self.solve(&combination, guess.as_deref())?;

            let mut kept = Vec::with_capacity(combination.len());
            let mut kept_dosages = Vec::with_capacity(dosages.len());
            for (formula, dosage) in combination.iter().zip(&dosages) {
                if self.effectively_zero(*dosage, formula) {
                    trace!("dropping zero-dosage formula {formula}");
                } else {
                    kept.push(formula.clone());
                    kept_dosages.push(*dosage);
                }
            }

            if kept.len() == combination.len() {
                return Ok(Fit {
                    combination,
                    dosages,
                    delta,
                });
            }

            combination = kept;
            guess = Some(kept_dosages);
        }
    }

    fn effectively_zero(&self, dosage: f64, formula: &str) -> bool {
        let rounded = round_to(dosage, self.places);
        rounded <= 0.0 || rounded < self.min_dose(formula)
    }

    fn min_dose(&self, formula: &str) -> f64 {
        match self.database.get(formula) {
            Some(composition) if composition.is_compound() => self.min_cformula_dose,
            _ => self.min_sformula_dose,
        }
    }

    fn max_dose(&self, formula: &str) -> f64 {
        match self.database.get(formula) {
            Some(composition) if composition.is_compound() => self.max_cformula_dose,
            _ => self.max_sformula_dose,
        }
    }

    fn solve(
        &self,
        combination: &[String],
        guess: Option<&[f64]>,
    ) -> Result<(Vec<f64>, f64), FitError> {
        let problem = Problem::assemble(self, combination)?;
        let n = combination.len();

        if problem.lipschitz == 0.0 {
            // Every composition in the combination is empty; nothing to fit.
            return Ok((vec![0.0; n], self.variance));
        }
        let step = 1.0 / problem.lipschitz;

        let mut x: Vec<f64> = match guess {
            Some(values) if values.len() == n => values.to_vec(),
            _ => vec![1.0; n],
        };
        for (value, bound) in x.iter_mut().zip(&problem.upper) {
            *value = value.clamp(0.0, *bound);
        }

        let mut gradient = vec![0.0; n];
        let mut converged = false;
        for _ in 0..MAX_ITERATIONS {
            problem.gradient(&x, &mut gradient);
            let mut max_change = 0.0f64;
            for j in 0..n {
                let next = (x[j] - step * gradient[j]).clamp(0.0, problem.upper[j]);
                max_change = max_change.max((next - x[j]).abs());
                x[j] = next;
            }
            if max_change < CONVERGENCE_TOL {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(FitError::DidNotConverge);
        }

        let delta = problem.objective(&x).sqrt();
        Ok((x, delta))
    }
}

/// Dense per-combination view of the least-squares problem.
///
/// Columns are the union of target herbs and combination herbs; target
/// herbs carry weight 1 and amount `target_c`, off-target herbs carry weight
/// `penalty_factor` and amount 0.
struct Problem {
    /// `amounts[j][i]`: herb `i` per unit dosage of formula `j`.
    amounts: Vec<Vec<f64>>,
    targets: Vec<f64>,
    weights: Vec<f64>,
    upper: Vec<f64>,
    /// Trace bound on the gradient's Lipschitz constant.
    lipschitz: f64,
}

impl Problem {
    fn assemble(fitter: &DosageFitter<'_>, combination: &[String]) -> Result<Self, FitError> {
        let compositions: Vec<&Composition> = combination
            .iter()
            .map(|key| {
                fitter
                    .database
                    .get(key)
                    .ok_or_else(|| FitError::UnknownFormula(key.clone()))
            })
            .collect::<Result<_, _>>()?;

        let mut herb_column: HashMap<&str, usize> = HashMap::new();
        let mut targets = Vec::new();
        let mut weights = Vec::new();
        for (herb, amount) in fitter.target.iter() {
            herb_column.insert(herb, targets.len());
            targets.push(amount);
            weights.push(1.0);
        }
        for composition in &compositions {
            for herb in composition.herbs() {
                herb_column.entry(herb).or_insert_with(|| {
                    targets.push(0.0);
                    weights.push(fitter.penalty_factor);
                    targets.len() - 1
                });
            }
        }

        let columns = targets.len();
        let mut amounts = vec![vec![0.0; columns]; combination.len()];
        for (row, composition) in amounts.iter_mut().zip(&compositions) {
            for (herb, amount) in composition.iter() {
                row[herb_column[herb]] += amount;
            }
        }

        let upper: Vec<f64> = combination.iter().map(|key| fitter.max_dose(key)).collect();

        let lipschitz = 2.0
            * amounts
                .iter()
                .map(|row| {
                    row.iter()
                        .zip(&weights)
                        .map(|(a, w)| (a * w) * (a * w))
                        .sum::<f64>()
                })
                .sum::<f64>();

        Ok(Self {
            amounts,
            targets,
            weights,
            upper,
            lipschitz,
        })
    }

    /// Combined amount per herb column at dosages `x`.
    fn combined(&self, x: &[f64]) -> Vec<f64> {
        let mut combined = vec![0.0; self.targets.len()];
        for (row, dosage) in self.amounts.iter().zip(x) {
            for (value, amount) in combined.iter_mut().zip(row) {
                *value += amount * dosage;
            }
        }
        combined
    }

    /// `delta^2` at dosages `x`.
    fn objective(&self, x: &[f64]) -> f64 {
        self.combined(x)
            .iter()
            .zip(&self.targets)
            .zip(&self.weights)
            .map(|((s, t), w)| {
                let d = w * (s - t);
                d * d
            })
            .sum()
    }

    fn gradient(&self, x: &[f64], out: &mut [f64]) {
        let combined = self.combined(x);
        for (g, row) in out.iter_mut().zip(&self.amounts) {
            *g = 2.0
                * combined
                    .iter()
                    .zip(&self.targets)
                    .zip(&self.weights)
                    .zip(row)
                    .map(|(((s, t), w), a)| w * w * a * (s - t))
                    .sum::<f64>();
        }
    }
}
