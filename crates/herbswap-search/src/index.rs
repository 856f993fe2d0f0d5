// Relevance index
//
// Partitions the database into compound and simple formulas that overlap the
// target, and maps each target herb to the simple formulas providing it.
// Formulas with no strictly-positive overlap are pruned here, before any
// subset of them can be enumerated.

use std::collections::BTreeSet;

use herbswap_core::{Composition, FormulaDatabase};
use indexmap::IndexMap;

/// Database partition relevant to one target composition.
#[derive(Debug, Clone, Default)]
pub struct RelevanceIndex {
    /// Compound formulas (more than one herb) sharing a positive target herb.
    pub cformulas: Vec<String>,

    /// Simple formulas (exactly one herb) sharing a positive target herb.
    pub sformulas: Vec<String>,

    /// Target herb to the simple formulas providing it, both in database
    /// iteration order.
    pub herb_sformulas: IndexMap<String, Vec<String>>,
}

impl RelevanceIndex {
    /// Partition `database` against `target`, leaving out `excludes`.
    pub fn build(
        database: &FormulaDatabase,
        target: &Composition,
        excludes: &BTreeSet<String>,
    ) -> Self {
        let mut index = Self::default();

        for (key, composition) in database.iter() {
            if excludes.contains(key) {
                continue;
            }
            if !composition.herbs().any(|herb| target.amount(herb) > 0.0) {
                continue;
            }
            if composition.is_compound() {
                index.cformulas.push(key.to_string());
            } else {
                index.sformulas.push(key.to_string());
                if let Some(herb) = composition.herbs().next() {
                    index
                        .herb_sformulas
                        .entry(herb.to_string())
                        .or_default()
                        .push(key.to_string());
                }
            }
        }

        index
    }

    /// Simple formulas providing the given herb, in database order.
    pub fn providers(&self, herb: &str) -> &[String] {
        self.herb_sformulas
            .get(herb)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> FormulaDatabase {
        FormulaDatabase::from_compositions([
            (
                "桂枝湯".to_string(),
                [
                    ("桂枝", 0.6),
                    ("白芍", 0.6),
                    ("生薑", 0.6),
                    ("大棗", 0.5),
                    ("炙甘草", 0.4),
                ]
                .into_iter()
                .collect(),
            ),
            (
                "桂枝去芍藥湯".to_string(),
                [("桂枝", 0.6), ("生薑", 0.6), ("大棗", 0.5), ("炙甘草", 0.4)]
                    .into_iter()
                    .collect(),
            ),
            (
                "麻黃湯".to_string(),
                [("麻黃", 0.9), ("桂枝", 0.6), ("炙甘草", 0.3), ("杏仁", 0.5)]
                    .into_iter()
                    .collect(),
            ),
            ("桂枝".to_string(), [("桂枝", 1.0)].into_iter().collect()),
            ("白芍".to_string(), [("白芍", 1.0)].into_iter().collect()),
            ("生薑".to_string(), [("生薑", 0.8)].into_iter().collect()),
        ])
    }

    #[test]
    fn test_filter_by_target() {
        let target: Composition = [("白芍", 1.0), ("杏仁", 1.0)].into_iter().collect();
        let index = RelevanceIndex::build(&database(), &target, &BTreeSet::new());
        assert_eq!(index.cformulas, vec!["桂枝湯", "麻黃湯"]);
        assert_eq!(index.sformulas, vec!["白芍"]);
    }

    #[test]
    fn test_filter_by_excludes() {
        let target: Composition = [("桂枝", 1.0), ("白芍", 1.0), ("生薑", 0.8)]
            .into_iter()
            .collect();
        let excludes: BTreeSet<String> = ["白芍".to_string()].into_iter().collect();
        let index = RelevanceIndex::build(&database(), &target, &excludes);
        assert_eq!(index.cformulas, vec!["桂枝湯", "桂枝去芍藥湯", "麻黃湯"]);
        assert_eq!(index.sformulas, vec!["桂枝", "生薑"]);
    }

    #[test]
    fn test_zero_valued_overlap_excluded() {
        // 桂枝 present in the target but with amount 0: no real overlap.
        let target: Composition = [("桂枝", 0.0), ("杏仁", 1.0)].into_iter().collect();
        let index = RelevanceIndex::build(&database(), &target, &BTreeSet::new());
        assert_eq!(index.cformulas, vec!["麻黃湯"]);
        assert!(index.sformulas.is_empty());
    }

    #[test]
    fn test_herb_sformulas_order_and_providers() {
        let target: Composition = [("桂枝", 1.0), ("白芍", 1.0), ("生薑", 0.8)]
            .into_iter()
            .collect();
        let index = RelevanceIndex::build(&database(), &target, &BTreeSet::new());
        assert_eq!(index.providers("桂枝"), &["桂枝".to_string()]);
        assert_eq!(index.providers("白芍"), &["白芍".to_string()]);
        assert_eq!(index.providers("杏仁"), &[] as &[String]);
    }
}
