// Formula database
//
// The database file is a YAML sequence of formula records as produced by the
// license-registry converter. Amounts are normalized to a one-unit dosage on
// load so that compositions are directly comparable.

use std::collections::BTreeSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::composition::Composition;
use crate::error::CoreError;

/// One record of the database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaRecord {
    /// Full product name as listed in the license registry.
    pub name: String,

    /// Short formula key; unique within one database.
    pub key: String,

    /// Vendor name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// License-registry detail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Grams of product that the composition amounts refer to.
    ///
    /// Absent means the composition is already normalized per unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_dosage: Option<f64>,

    /// Herb amounts per `unit_dosage` grams of product.
    pub composition: IndexMap<String, f64>,
}

/// Read-only mapping from formula key to its normalized composition.
///
/// Iteration order is the file order; the searchers use it as the canonical
/// ordering when enumerating subsets.
#[derive(Debug, Clone, Default)]
pub struct FormulaDatabase {
    formulas: IndexMap<String, Composition>,
}

impl FormulaDatabase {
    /// Build a database from converter records.
    ///
    /// Each composition is divided by the record's `unit_dosage` (default 1).
    /// A record whose key was already seen is logged and skipped.
    pub fn from_records(records: impl IntoIterator<Item = FormulaRecord>) -> Self {
        let mut formulas = IndexMap::new();
        for record in records {
            if formulas.contains_key(&record.key) {
                warn!(
                    "duplicate formula key {:?} ({:?}), record skipped",
                    record.key, record.name
                );
                continue;
            }
            let unit_dosage = record.unit_dosage.unwrap_or(1.0);
            let composition = record
                .composition
                .iter()
                .map(|(herb, amount)| (herb.clone(), amount / unit_dosage))
                .collect();
            formulas.insert(record.key, composition);
        }
        Self { formulas }
    }

    /// Parse a database from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, CoreError> {
        let records: Vec<FormulaRecord> = serde_yaml::from_str(text)?;
        Ok(Self::from_records(records))
    }

    /// Load a database from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Build a database directly from compositions (mainly for tests and
    /// ad-hoc targets).
    pub fn from_compositions(
        formulas: impl IntoIterator<Item = (String, Composition)>,
    ) -> Self {
        Self {
            formulas: formulas.into_iter().collect(),
        }
    }

    /// Composition of the given formula, if present.
    pub fn get(&self, key: &str) -> Option<&Composition> {
        self.formulas.get(key)
    }

    /// Whether the database contains the given formula key.
    pub fn contains(&self, key: &str) -> bool {
        self.formulas.contains_key(key)
    }

    /// Number of formulas.
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    /// Whether the database has no formulas.
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Iterate over `(key, composition)` in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Composition)> {
        self.formulas.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Formula keys in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.formulas.keys().map(String::as_str)
    }

    /// Every herb that appears in any formula, sorted.
    pub fn herbs(&self) -> BTreeSet<&str> {
        self.formulas
            .values()
            .flat_map(|composition| composition.herbs())
            .collect()
    }
}
