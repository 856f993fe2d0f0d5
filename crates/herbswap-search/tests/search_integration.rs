//! End-to-end tests running both strategies against a small classical
//! formula database and checking the ranked output.

use std::collections::BTreeSet;

use herbswap_core::{Composition, FormulaDatabase};
use herbswap_search::{
    find_best_matches, fit_dosages, search, SearchContext, Strategy,
};
use rstest::rstest;

/// Three classical compound formulas sharing 桂枝.
fn compound_database() -> FormulaDatabase {
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
    ])
}

/// The compound database plus single-herb granule entries.
fn full_database() -> FormulaDatabase {
    let mut compositions: Vec<(String, Composition)> = compound_database()
        .iter()
        .map(|(key, composition)| (key.to_string(), composition.clone()))
        .collect();
    for herb in ["桂枝", "白芍", "生薑"] {
        compositions.push((herb.to_string(), [(herb, 1.0)].into_iter().collect()));
    }
    FormulaDatabase::from_compositions(compositions)
}

/// Five units of 桂枝湯.
fn target() -> Composition {
    [
        ("桂枝", 3.0),
        ("白芍", 3.0),
        ("生薑", 3.0),
        ("大棗", 2.5),
        ("炙甘草", 2.0),
    ]
    .into_iter()
    .collect()
}

#[rstest]
#[case::exhaustive(Strategy::Exhaustive)]
#[case::beam(Strategy::Beam)]
fn test_exact_formula_ranks_first(#[case] strategy: Strategy) {
    let db = compound_database();
    let context = SearchContext::new(target()).with_limits(1, 0);
    let matches = find_best_matches(&db, &context, strategy).unwrap();

    let best = &matches[0];
    assert_eq!(best.combination, vec!["桂枝湯".to_string()]);
    assert!((best.match_percentage - 100.0).abs() < 1e-3);
    assert_eq!(best.dosages, vec![5.0]);
}

#[test]
fn test_partial_formula_scores_by_missing_mass() {
    // 桂枝去芍藥湯 is 桂枝湯 minus 白芍; at dosage 5 it covers everything
    // except the 3.0 units of 白芍, so delta = 3 against variance
    // sqrt(37.25), about 50.85%.
    let db = compound_database();
    let context = SearchContext::new(target()).with_limits(1, 0);
    let matches = find_best_matches(&db, &context, Strategy::Exhaustive).unwrap();

    let partial = matches
        .iter()
        .find(|c| c.combination == vec!["桂枝去芍藥湯".to_string()])
        .unwrap();
    assert!((partial.match_percentage - 50.85).abs() < 0.01);
    assert_eq!(partial.dosages, vec![5.0]);
}

#[test]
fn test_simple_formula_completes_excluded_compound() {
    // With 桂枝湯 excluded, the best substitute is 桂枝去芍藥湯 plus the
    // missing 白芍 as a single-herb granule.
    let db = full_database();
    let context = SearchContext::new(target())
        .with_limits(1, 2)
        .with_excludes(["桂枝湯".to_string()]);
    let matches = find_best_matches(&db, &context, Strategy::Exhaustive).unwrap();

    let best = &matches[0];
    let expected: BTreeSet<String> = ["桂枝去芍藥湯".to_string(), "白芍".to_string()]
        .into_iter()
        .collect();
    assert_eq!(best.frozen_set(), expected);
    assert!((best.match_percentage - 100.0).abs() < 1e-3);
}

#[test]
fn test_no_duplicate_formula_sets_in_results() {
    // {桂枝湯, 桂枝去芍藥湯} prunes the second formula to zero dosage and
    // collapses into {桂枝湯}; the ranked output must not show both.
    let db = compound_database();
    let context = SearchContext::new(target()).with_limits(2, 0);
    let matches = find_best_matches(&db, &context, Strategy::Exhaustive).unwrap();

    let mut seen = BTreeSet::new();
    for candidate in &matches {
        assert!(
            seen.insert(candidate.frozen_set()),
            "duplicate set {:?}",
            candidate.combination
        );
    }
    assert_eq!(
        matches
            .iter()
            .filter(|c| c.combination == vec!["桂枝湯".to_string()])
            .count(),
        1
    );
}

#[rstest]
#[case::exhaustive(Strategy::Exhaustive)]
#[case::beam(Strategy::Beam)]
fn test_invalid_context_rejected(#[case] strategy: Strategy) {
    let db = compound_database();
    let context = SearchContext::new(target()).with_penalty_factor(-1.0);
    assert!(search(&db, &context, strategy).is_err());
}

#[test]
fn test_fit_dosages_for_explicit_combination() {
    let db = compound_database();
    let context = SearchContext::new(target());
    let fit = fit_dosages(&db, &["桂枝湯".to_string()], &context).unwrap();
    assert_eq!(fit.combination, vec!["桂枝湯".to_string()]);
    assert!((fit.dosages[0] - 5.0).abs() < 1e-6);
    assert!(fit.delta < 1e-6);
}

#[test]
fn test_beam_ranks_empty_combination_last() {
    let db = compound_database();
    let context = SearchContext::new(target()).with_limits(1, 0).with_beam(10, 3.0, 4.0);
    let matches = find_best_matches(&db, &context, Strategy::Beam).unwrap();

    let empty_rank = matches
        .iter()
        .position(|c| c.combination.is_empty())
        .unwrap();
    for (i, candidate) in matches.iter().enumerate() {
        if i < empty_rank {
            assert!(candidate.match_percentage > 0.0);
        }
    }
    assert!((matches[empty_rank].match_percentage - 0.0).abs() < 1e-9);
}

#[test]
fn test_lazy_iteration_stops_early() {
    let db = full_database();
    let context = SearchContext::new(target());
    let mut searcher = search(&db, &context, Strategy::Exhaustive).unwrap();
    // Taking a single candidate must not require exhausting the space.
    assert!(searcher.next().is_some());
}
