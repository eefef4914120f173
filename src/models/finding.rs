use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Category, Severity};

/// One confirmed vulnerability, produced by a test probe.
///
/// Immutable once built; persisted in bulk when the owning scan completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub category: Category,
    pub vulnerability_name: String,
    pub endpoint_id: Uuid,
    pub severity: Severity,
    pub cvss: Option<f64>,
    pub description: String,
    pub recommendation: String,
    pub evidence: Value,
    pub test_name: String,
    pub affected_params: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        category: Category,
        vulnerability_name: impl Into<String>,
        endpoint_id: Uuid,
        severity: Severity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            vulnerability_name: vulnerability_name.into(),
            endpoint_id,
            severity,
            cvss: None,
            description: String::new(),
            recommendation: String::new(),
            evidence: Value::Null,
            test_name: String::new(),
            affected_params: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn critical(
        category: Category,
        name: impl Into<String>,
        endpoint_id: Uuid,
    ) -> Self {
        Self::new(category, name, endpoint_id, Severity::Critical)
    }

    pub fn high(category: Category, name: impl Into<String>, endpoint_id: Uuid) -> Self {
        Self::new(category, name, endpoint_id, Severity::High)
    }

    pub fn medium(category: Category, name: impl Into<String>, endpoint_id: Uuid) -> Self {
        Self::new(category, name, endpoint_id, Severity::Medium)
    }

    pub fn low(category: Category, name: impl Into<String>, endpoint_id: Uuid) -> Self {
        Self::new(category, name, endpoint_id, Severity::Low)
    }

    /// CVSS scores live on a 0-10 scale; out-of-range input is clamped.
    pub fn with_cvss(mut self, score: f64) -> Self {
        self.cvss = Some(score.clamp(0.0, 10.0));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn with_evidence(mut self, evidence: Value) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_test_name(mut self, test_name: impl Into<String>) -> Self {
        self.test_name = test_name.into();
        self
    }

    pub fn with_affected_params(mut self, params: Vec<String>) -> Self {
        self.affected_params = params;
        self
    }

    /// Row shape for the scan_results table.
    pub fn to_row(&self, scan_id: Uuid) -> Result<Value> {
        let mut row = serde_json::to_value(self)?;
        row["scan_id"] = serde_json::json!(scan_id);
        Ok(row)
    }

    pub fn from_row(row: &Value) -> Result<Self> {
        Ok(serde_json::from_value(row.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cvss_clamped() {
        let ep = Uuid::new_v4();
        let f = Finding::high(Category::ServerSideRequestForgery, "ssrf", ep).with_cvss(11.5);
        assert_eq!(f.cvss, Some(10.0));

        let g = Finding::low(Category::InventoryManagement, "old version", ep).with_cvss(-1.0);
        assert_eq!(g.cvss, Some(0.0));
    }

    #[test]
    fn test_row_round_trip_keeps_fields() {
        let ep = Uuid::new_v4();
        let scan_id = Uuid::new_v4();
        let f = Finding::critical(Category::ObjectLevelAuthorization, "cross-identity read", ep)
            .with_evidence(serde_json::json!({ "status_a": 200, "status_b": 200 }))
            .with_affected_params(vec!["user_id".to_string()]);

        let row = f.to_row(scan_id).unwrap();
        assert_eq!(row["scan_id"], serde_json::json!(scan_id));

        let back = Finding::from_row(&row).unwrap();
        assert_eq!(back.id, f.id);
        assert_eq!(back.severity, Severity::Critical);
        assert_eq!(back.affected_params, vec!["user_id"]);
    }
}
