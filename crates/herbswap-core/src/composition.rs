// Composition model
//
// A composition maps herb names to non-negative amounts, normalized to a
// common dosage unit. Insertion order is preserved because downstream
// indexing treats database order as canonical.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A mixture of named herbs with per-herb amounts.
///
/// Compositions are value types: search code never mutates a composition it
/// did not build itself. Arithmetic helpers return new values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Composition {
    amounts: IndexMap<String, f64>,
}

impl Composition {
    /// Create an empty composition.
    pub fn new() -> Self {
        Self {
            amounts: IndexMap::new(),
        }
    }

    /// Amount of the given herb, `0.0` when absent.
    pub fn amount(&self, herb: &str) -> f64 {
        self.amounts.get(herb).copied().unwrap_or(0.0)
    }

    /// Whether the composition contains the given herb.
    pub fn contains(&self, herb: &str) -> bool {
        self.amounts.contains_key(herb)
    }

    /// Add `amount` to the given herb, inserting it if absent.
    pub fn add(&mut self, herb: impl Into<String>, amount: f64) {
        *self.amounts.entry(herb.into()).or_insert(0.0) += amount;
    }

    /// Number of distinct herbs.
    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    /// Whether the composition has no herbs.
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// A formula is compound when it mixes more than one herb.
    pub fn is_compound(&self) -> bool {
        self.amounts.len() > 1
    }

    /// Iterate over `(herb, amount)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(h, a)| (h.as_str(), *a))
    }

    /// Iterate over herb names in insertion order.
    pub fn herbs(&self) -> impl Iterator<Item = &str> {
        self.amounts.keys().map(String::as_str)
    }

    /// Scale every amount by `factor`, returning a new composition.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            amounts: self
                .amounts
                .iter()
                .map(|(h, a)| (h.clone(), a * factor))
                .collect(),
        }
    }

    /// Euclidean magnitude: `sqrt(Σ amount²)`.
    ///
    /// Historically called "variance" throughout this project; the match
    /// scorer divides a fitted distance by this value.
    pub fn variance(&self) -> f64 {
        self.amounts
            .values()
            .map(|a| a * a)
            .sum::<f64>()
            .sqrt()
    }
}

impl FromIterator<(String, f64)> for Composition {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut composition = Self::new();
        for (herb, amount) in iter {
            composition.add(herb, amount);
        }
        composition
    }
}

impl<'a> FromIterator<(&'a str, f64)> for Composition {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(h, a)| (h.to_string(), a))
            .collect()
    }
}

/// Weighted sum of `(composition, dosage)` pairs into one combined
/// composition. Herbs appear in first-seen order.
pub fn combine<'a>(parts: impl IntoIterator<Item = (&'a Composition, f64)>) -> Composition {
    let mut combined = Composition::new();
    for (composition, dosage) in parts {
        for (herb, amount) in composition.iter() {
            combined.add(herb, amount * dosage);
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composition(pairs: &[(&str, f64)]) -> Composition {
        pairs.iter().map(|&(h, a)| (h, a)).collect()
    }

    #[test]
    fn test_amount_missing_herb_is_zero() {
        let c = composition(&[("桂枝", 0.6)]);
        assert_eq!(c.amount("桂枝"), 0.6);
        assert_eq!(c.amount("白芍"), 0.0);
    }

    #[test]
    fn test_add_accumulates() {
        let mut c = Composition::new();
        c.add("桂枝", 0.6);
        c.add("桂枝", 0.4);
        assert_eq!(c.amount("桂枝"), 1.0);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_scaled() {
        let c = composition(&[("桂枝", 0.6), ("白芍", 0.4)]);
        let scaled = c.scaled(2.0);
        assert_eq!(scaled.amount("桂枝"), 1.2);
        assert_eq!(scaled.amount("白芍"), 0.8);
        // original untouched
        assert_eq!(c.amount("桂枝"), 0.6);
    }

    #[test]
    fn test_variance() {
        let c = composition(&[("甲藥", 3.0), ("乙藥", 4.0)]);
        assert!((c.variance() - 5.0).abs() < 1e-12);
        assert_eq!(Composition::new().variance(), 0.0);
    }

    #[test]
    fn test_combine_weighted_sum() {
        let a = composition(&[("桂枝", 0.6), ("白芍", 0.6)]);
        let b = composition(&[("桂枝", 0.6), ("生薑", 0.6)]);
        let combined = combine([(&a, 2.0), (&b, 1.0)]);
        assert!((combined.amount("桂枝") - 1.8).abs() < 1e-12);
        assert!((combined.amount("白芍") - 1.2).abs() < 1e-12);
        assert!((combined.amount("生薑") - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_is_compound() {
        assert!(composition(&[("桂枝", 1.0), ("白芍", 1.0)]).is_compound());
        assert!(!composition(&[("桂枝", 1.0)]).is_compound());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let c = composition(&[("丙", 1.0), ("甲", 2.0), ("乙", 3.0)]);
        let herbs: Vec<&str> = c.herbs().collect();
        assert_eq!(herbs, vec!["丙", "甲", "乙"]);
    }
}
