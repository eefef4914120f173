//! Risk scoring: pure aggregation of one scan's findings.

use crate::models::Finding;

/// Score a scan's findings: start at 100, subtract per finding by
/// severity, floor at 0. Commutative and associative over the input, so
/// the result is invariant under permutation.
pub fn risk_score(findings: &[Finding]) -> u32 {
    let penalty: u32 = findings.iter().map(|f| f.severity.weight()).sum();
    100u32.saturating_sub(penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Severity};
    use uuid::Uuid;

    fn finding(severity: Severity) -> Finding {
        Finding::new(
            Category::ObjectLevelAuthorization,
            "test",
            Uuid::new_v4(),
            severity,
        )
    }

    #[test]
    fn test_empty_scores_full_marks() {
        assert_eq!(risk_score(&[]), 100);
    }

    #[test]
    fn test_single_low() {
        assert_eq!(risk_score(&[finding(Severity::Low)]), 98);
    }

    #[test]
    fn test_floor_at_zero() {
        let findings: Vec<_> = (0..10).map(|_| finding(Severity::Critical)).collect();
        assert_eq!(risk_score(&findings), 0);

        let findings: Vec<_> = (0..50).map(|_| finding(Severity::Critical)).collect();
        assert_eq!(risk_score(&findings), 0);
    }

    #[test]
    fn test_severity_weights() {
        assert_eq!(risk_score(&[finding(Severity::Critical)]), 80);
        assert_eq!(risk_score(&[finding(Severity::High)]), 90);
        assert_eq!(risk_score(&[finding(Severity::Medium)]), 95);
    }

    #[test]
    fn test_invariant_under_permutation() {
        let mut findings = vec![
            finding(Severity::Critical),
            finding(Severity::Low),
            finding(Severity::High),
            finding(Severity::Medium),
        ];
        let forward = risk_score(&findings);
        findings.reverse();
        assert_eq!(risk_score(&findings), forward);
        findings.swap(0, 2);
        assert_eq!(risk_score(&findings), forward);
    }
}
