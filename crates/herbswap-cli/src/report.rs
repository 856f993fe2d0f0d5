// Result reports
//
// Renders ranked matches the way the terminal user reads them: the match
// line with per-formula dosages, the combined composition with target herbs
// marked, and the target herbs the combination cannot supply.

use std::fmt::Write;

use herbswap_core::{Composition, FormulaDatabase};
use herbswap_search::Candidate;

/// Render one match as a multi-line report block.
pub fn format_match(
    candidate: &Candidate,
    database: &FormulaDatabase,
    target: &Composition,
) -> String {
    let combination = candidate
        .combination
        .iter()
        .zip(&candidate.dosages)
        .map(|(key, dosage)| format!("{key}{dosage:.1}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    let _ = writeln!(
        out,
        "匹配度: {:.2}%，組合: {combination}",
        candidate.match_percentage
    );

    // Target herbs first, then off-target, each group by name.
    let combined = candidate.combined(database);
    let mut herbs: Vec<(&str, f64)> = combined.iter().collect();
    herbs.sort_by(|a, b| (!target.contains(a.0), a.0).cmp(&(!target.contains(b.0), b.0)));
    for (herb, amount) in herbs {
        if target.contains(herb) {
            let _ = writeln!(out, "    **{herb}**: {amount:.2}");
        } else {
            let _ = writeln!(out, "    {herb}: {amount:.2}");
        }
    }

    let missing = candidate.missing_herbs(database, target);
    if missing.is_empty() {
        let _ = writeln!(out, "所有目標藥材已被完全匹配。");
    } else {
        let _ = writeln!(out, "尚缺藥物：");
        for herb in missing {
            let _ = writeln!(out, "    {herb}");
        }
    }
    out
}

/// Render a full result set, matches separated by blank lines.
pub fn format_matches(
    candidates: &[Candidate],
    database: &FormulaDatabase,
    target: &Composition,
) -> String {
    candidates
        .iter()
        .map(|candidate| format_match(candidate, database, target))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> FormulaDatabase {
        FormulaDatabase::from_compositions([(
            "桂枝去芍藥湯".to_string(),
            [("桂枝", 0.6), ("生薑", 0.6)].into_iter().collect(),
        )])
    }

    fn candidate() -> Candidate {
        Candidate {
            match_percentage: 50.8521,
            combination: vec!["桂枝去芍藥湯".to_string()],
            dosages: vec![5.0],
        }
    }

    #[test]
    fn test_format_match_layout() {
        let target: Composition = [("桂枝", 3.0), ("白芍", 3.0)].into_iter().collect();
        let report = format_match(&candidate(), &database(), &target);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "匹配度: 50.85%，組合: 桂枝去芍藥湯5.0");
        // target herb marked and listed before the off-target one
        assert_eq!(lines[1], "    **桂枝**: 3.00");
        assert_eq!(lines[2], "    生薑: 3.00");
        assert_eq!(lines[3], "尚缺藥物：");
        assert_eq!(lines[4], "    白芍");
    }

    #[test]
    fn test_format_match_complete_target() {
        let target: Composition = [("桂枝", 3.0), ("生薑", 3.0)].into_iter().collect();
        let report = format_match(&candidate(), &database(), &target);
        assert!(report.contains("所有目標藥材已被完全匹配。"));
        assert!(!report.contains("尚缺藥物"));
    }

    #[test]
    fn test_format_matches_separated_by_blank_line() {
        let target: Composition = [("桂枝", 3.0)].into_iter().collect();
        let text = format_matches(&[candidate(), candidate()], &database(), &target);
        assert_eq!(text.matches("匹配度").count(), 2);
        assert!(text.contains("\n\n"));
    }
}
