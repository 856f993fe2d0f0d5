// Target construction
//
// A query is a list of `name:amount` items. A name that matches a database
// formula key expands into that formula's composition scaled by the amount;
// any other name is taken as a raw herb. Repeated names accumulate. Items
// naming neither a formula nor a known herb are collected and reported
// together so the user sees every typo at once.

use thiserror::Error;

use crate::composition::Composition;
use crate::database::FormulaDatabase;

/// Errors from query parsing and target construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// An item is not of the form `name:amount` with a positive amount.
    #[error("cannot parse query item {0:?}, expected name:amount")]
    BadItem(String),

    /// Items naming neither a database formula nor a known herb.
    #[error("not in the database: {}", .0.join(", "))]
    UnknownItems(Vec<String>),

    /// The query produced an empty target.
    #[error("the target composition is empty")]
    EmptyTarget,
}

/// Parse one `name:amount` item.
pub fn parse_item(text: &str) -> Result<(String, f64), QueryError> {
    let bad = || QueryError::BadItem(text.to_string());
    let (name, amount) = text.rsplit_once(':').ok_or_else(bad)?;
    let name = name.trim();
    let amount: f64 = amount.trim().parse().map_err(|_| bad())?;
    if name.is_empty() || !amount.is_finite() || amount <= 0.0 {
        return Err(bad());
    }
    Ok((name.to_string(), amount))
}

/// Parse a whitespace-separated list of `name:amount` items.
pub fn parse_items(text: &str) -> Result<Vec<(String, f64)>, QueryError> {
    let items: Vec<(String, f64)> = text
        .split_whitespace()
        .map(parse_item)
        .collect::<Result<_, _>>()?;
    if items.is_empty() {
        return Err(QueryError::EmptyTarget);
    }
    Ok(items)
}

/// Build a target composition from parsed items.
///
/// With `raw` set, formula keys are not expanded: every name is treated as
/// an herb, so the target is the crude-herb composition as entered.
pub fn build_target(
    database: &FormulaDatabase,
    items: &[(String, f64)],
    raw: bool,
) -> Result<Composition, QueryError> {
    let known_herbs = database.herbs();
    let mut target = Composition::new();
    let mut unknown = Vec::new();

    for (name, amount) in items {
        if !raw {
            if let Some(composition) = database.get(name) {
                for (herb, herb_amount) in composition.scaled(*amount).iter() {
                    target.add(herb, herb_amount);
                }
                continue;
            }
        }
        if known_herbs.contains(name.as_str()) {
            target.add(name.clone(), *amount);
        } else {
            unknown.push(name.clone());
        }
    }

    if !unknown.is_empty() {
        return Err(QueryError::UnknownItems(unknown));
    }
    if target.is_empty() {
        return Err(QueryError::EmptyTarget);
    }
    Ok(target)
}

/// Parse query text and build the target in one step.
pub fn parse_target(
    database: &FormulaDatabase,
    text: &str,
    raw: bool,
) -> Result<Composition, QueryError> {
    let items = parse_items(text)?;
    build_target(database, &items, raw)
}
