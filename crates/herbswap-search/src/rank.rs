// Result ranker
//
// Consumes a candidate stream, suppresses duplicate formula sets, and keeps
// the top-N by match percentage via a bounded min-heap.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::candidate::Candidate;

/// Min-heap entry ordered by match percentage.
struct Ranked(Candidate);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.0.match_percentage == other.0.match_percentage
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want to pop the worst.
        other
            .0
            .match_percentage
            .total_cmp(&self.0.match_percentage)
    }
}

/// Top `top_n` candidates by match percentage, in descending order.
///
/// Candidates whose formula set already appeared earlier in the stream are
/// dropped; ties are broken arbitrarily.
pub fn top_matches(
    candidates: impl IntoIterator<Item = Candidate>,
    top_n: usize,
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(top_n + 1);

    for candidate in candidates {
        if !seen.insert(candidate.frozen_set()) {
            continue;
        }
        heap.push(Ranked(candidate));
        if heap.len() > top_n {
            heap.pop();
        }
    }

    let mut matches: Vec<Candidate> = heap.into_iter().map(|ranked| ranked.0).collect();
    matches.sort_by(|a, b| b.match_percentage.total_cmp(&a.match_percentage));
    matches
}
