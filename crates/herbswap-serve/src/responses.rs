//! API response types

use serde::Serialize;

use herbswap_core::{Composition, FormulaDatabase};
use herbswap_search::Candidate;

/// Response body for `POST /api/search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// Ranked matches, best first.
    pub matches: Vec<MatchEntry>,

    /// Wall-clock search time in milliseconds.
    pub elapsed_ms: u64,
}

/// One ranked match.
#[derive(Debug, Serialize)]
pub struct MatchEntry {
    /// Match percentage; may be negative.
    pub match_percentage: f64,

    /// Formulas with their fitted dosages.
    pub combination: Vec<DosageEntry>,

    /// Combined herb amounts, target herbs first.
    pub combined: Vec<HerbEntry>,

    /// Target herbs the combination cannot supply at all.
    pub missing: Vec<String>,
}

/// One formula and its dosage within a match.
#[derive(Debug, Serialize)]
pub struct DosageEntry {
    /// Formula key.
    pub key: String,

    /// Fitted dosage.
    pub dosage: f64,
}

/// One herb line of a combined composition.
#[derive(Debug, Serialize)]
pub struct HerbEntry {
    /// Herb name.
    pub herb: String,

    /// Combined amount.
    pub amount: f64,

    /// Whether the target asks for this herb.
    pub in_target: bool,
}

impl MatchEntry {
    /// Build the entry for one candidate against the target it was
    /// searched for.
    pub fn build(
        candidate: &Candidate,
        database: &FormulaDatabase,
        target: &Composition,
    ) -> Self {
        let combination = candidate
            .combination
            .iter()
            .zip(&candidate.dosages)
            .map(|(key, dosage)| DosageEntry {
                key: key.clone(),
                dosage: *dosage,
            })
            .collect();

        let mut combined: Vec<HerbEntry> = candidate
            .combined(database)
            .iter()
            .map(|(herb, amount)| HerbEntry {
                herb: herb.to_string(),
                amount,
                in_target: target.contains(herb),
            })
            .collect();
        // Target herbs first, then off-target, each group by name.
        combined.sort_by(|a, b| {
            (!a.in_target, &a.herb).cmp(&(!b.in_target, &b.herb))
        });

        Self {
            match_percentage: candidate.match_percentage,
            combination,
            combined,
            missing: candidate.missing_herbs(database, target),
        }
    }
}

/// Response body for `GET /api/formulas`.
#[derive(Debug, Serialize)]
pub struct FormulaListResponse {
    /// Sorted formula keys.
    pub formulas: Vec<String>,
}

/// Response body for `GET /api/herbs`.
#[derive(Debug, Serialize)]
pub struct HerbListResponse {
    /// Sorted herb names.
    pub herbs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_entry_orders_target_herbs_first() {
        let database = FormulaDatabase::from_compositions([(
            "桂枝去芍藥湯".to_string(),
            [("桂枝", 0.6), ("生薑", 0.6)].into_iter().collect(),
        )]);
        let target: Composition = [("桂枝", 3.0), ("白芍", 3.0)].into_iter().collect();
        let candidate = Candidate {
            match_percentage: 50.0,
            combination: vec!["桂枝去芍藥湯".to_string()],
            dosages: vec![5.0],
        };

        let entry = MatchEntry::build(&candidate, &database, &target);
        assert_eq!(entry.combination.len(), 1);
        assert_eq!(entry.combination[0].key, "桂枝去芍藥湯");
        assert!(entry.combined[0].in_target);
        assert_eq!(entry.combined[0].herb, "桂枝");
        assert!(!entry.combined.last().unwrap().in_target);
        assert_eq!(entry.missing, vec!["白芍".to_string()]);
    }
}
