//! Ordering of scored candidates

use crate::processing::scorer::MatchResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Match results ordered best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedReport {
    rows: Vec<MatchResult>,
}

impl RankedReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchResult> {
        self.rows.iter()
    }

    /// The first `n` rows, or all of them when `n` is `None`.
    pub fn top(&self, n: Option<usize>) -> &[MatchResult] {
        match n {
            Some(n) => &self.rows[..n.min(self.rows.len())],
            None => &self.rows,
        }
    }
}

impl<'a> IntoIterator for &'a RankedReport {
    type Item = &'a MatchResult;
    type IntoIter = std::slice::Iter<'a, MatchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Sort by score descending, then candidate id ascending.
///
/// The order depends only on the results themselves, never on the order
/// they arrive in.
pub fn rank(mut results: Vec<MatchResult>) -> RankedReport {
    results.sort_by(compare);
    RankedReport { rows: results }
}

fn compare(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::document::SkillSet;

    fn result(id: &str, score: f32) -> MatchResult {
        MatchResult {
            candidate_id: id.to_string(),
            score,
            matched_skills: SkillSet::new(),
            missing_skills: SkillSet::new(),
            skill_matches: Vec::new(),
            jd_skill_count: 0,
            cv_skill_count: 0,
        }
    }

    fn ids(report: &RankedReport) -> Vec<&str> {
        report.iter().map(|r| r.candidate_id.as_str()).collect()
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let report = rank(vec![
            result("carol", 0.5),
            result("alice", 1.0),
            result("bob", 0.5),
            result("dave", 0.0),
        ]);
        assert_eq!(ids(&report), vec!["alice", "bob", "carol", "dave"]);
    }

    #[test]
    fn test_rank_ignores_input_order() {
        let results = vec![
            result("a", 0.25),
            result("b", 0.75),
            result("c", 0.75),
            result("d", 0.5),
        ];
        let expected = ids(&rank(results.clone()))
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();

        let mut rotated = results.clone();
        for _ in 0..rotated.len() {
            rotated.rotate_left(1);
            let report = rank(rotated.clone());
            assert_eq!(ids(&report), expected);
        }

        let mut reversed = results;
        reversed.reverse();
        assert_eq!(ids(&rank(reversed)), expected);
    }

    #[test]
    fn test_top_truncates_without_reordering() {
        let report = rank(vec![result("x", 0.1), result("y", 0.9), result("z", 0.5)]);
        let top: Vec<&str> = report.top(Some(2)).iter().map(|r| r.candidate_id.as_str()).collect();
        assert_eq!(top, vec!["y", "z"]);
        assert_eq!(report.top(Some(10)).len(), 3);
        assert_eq!(report.top(None).len(), 3);
    }

    #[test]
    fn test_empty_report() {
        let report = rank(Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.len(), 0);
        assert!(report.top(Some(3)).is_empty());
    }
}
