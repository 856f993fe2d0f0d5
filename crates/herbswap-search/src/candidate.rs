//! Candidate result type

use std::collections::BTreeSet;

use herbswap_core::{combine, Composition, FormulaDatabase};
use serde::{Deserialize, Serialize};

/// One scored combination: the unit of work searchers produce and the
/// ranker orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Match percentage relative to the target magnitude; may be negative.
    pub match_percentage: f64,

    /// Formula keys, in discovery order. Identity is the unordered set.
    pub combination: Vec<String>,

    /// Fitted dosage per formula, rounded to the context's precision.
    pub dosages: Vec<f64>,
}

impl Candidate {
    /// The unordered-set identity used for duplicate suppression.
    pub fn frozen_set(&self) -> BTreeSet<String> {
        self.combination.iter().cloned().collect()
    }

    /// Combined composition of the formulas at their fitted dosages.
    pub fn combined(&self, database: &FormulaDatabase) -> Composition {
        combine(
            self.combination
                .iter()
                .zip(&self.dosages)
                .filter_map(|(key, dosage)| {
                    database.get(key).map(|composition| (composition, *dosage))
                }),
        )
    }

    /// Target herbs this combination cannot supply at all.
    ///
    /// An herb is missing when the target still wants more of it and no
    /// formula in the combination contains it at any dosage; an underdosed
    /// but present herb is not missing.
    pub fn missing_herbs(&self, database: &FormulaDatabase, target: &Composition) -> Vec<String> {
        let supplied: BTreeSet<&str> = self
            .combination
            .iter()
            .filter_map(|key| database.get(key))
            .flat_map(|composition| composition.herbs())
            .collect();
        let combined = self.combined(database);
        target
            .iter()
            .filter(|&(herb, amount)| {
                amount - combined.amount(herb) > 0.0 && !supplied.contains(herb)
            })
            .map(|(herb, _)| herb.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> FormulaDatabase {
        FormulaDatabase::from_compositions([
            (
                "桂枝去芍藥湯".to_string(),
                [("桂枝", 0.6), ("生薑", 0.6)].into_iter().collect(),
            ),
            ("生薑".to_string(), [("生薑", 1.0)].into_iter().collect()),
        ])
    }

    #[test]
    fn test_combined_weights_by_dosage() {
        let candidate = Candidate {
            match_percentage: 0.0,
            combination: vec!["桂枝去芍藥湯".to_string(), "生薑".to_string()],
            dosages: vec![2.0, 1.0],
        };
        let combined = candidate.combined(&database());
        assert!((combined.amount("桂枝") - 1.2).abs() < 1e-12);
        assert!((combined.amount("生薑") - 2.2).abs() < 1e-12);
    }

    #[test]
    fn test_missing_herbs_only_unsupplied() {
        let candidate = Candidate {
            match_percentage: 0.0,
            combination: vec!["桂枝去芍藥湯".to_string()],
            dosages: vec![1.0],
        };
        // 白芍 is absent entirely; 桂枝 is present but underdosed.
        let target: Composition = [("桂枝", 3.0), ("白芍", 3.0)].into_iter().collect();
        assert_eq!(
            candidate.missing_herbs(&database(), &target),
            vec!["白芍".to_string()]
        );
    }
}
