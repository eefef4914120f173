use serde::{Deserialize, Serialize};
use std::fmt;

/// The ten OWASP API Top-10 vulnerability categories.
///
/// Ordering follows the published list; endpoint flag sets and the
/// classifier registry iterate in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    ObjectLevelAuthorization,
    BrokenAuthentication,
    PropertyLevelAuthorization,
    ResourceConsumption,
    FunctionLevelAuthorization,
    BusinessFlows,
    ServerSideRequestForgery,
    Misconfiguration,
    InventoryManagement,
    UnsafeConsumption,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::ObjectLevelAuthorization,
        Category::BrokenAuthentication,
        Category::PropertyLevelAuthorization,
        Category::ResourceConsumption,
        Category::FunctionLevelAuthorization,
        Category::BusinessFlows,
        Category::ServerSideRequestForgery,
        Category::Misconfiguration,
        Category::InventoryManagement,
        Category::UnsafeConsumption,
    ];

    /// Human-readable label matching the OWASP list numbering.
    pub fn label(&self) -> &'static str {
        match self {
            Category::ObjectLevelAuthorization => "1. Broken Object Level Authorization",
            Category::BrokenAuthentication => "2. Broken Authentication",
            Category::PropertyLevelAuthorization => {
                "3. Broken Object Property Level Authorization"
            }
            Category::ResourceConsumption => "4. Unrestricted Resource Consumption",
            Category::FunctionLevelAuthorization => "5. Broken Function Level Authorization",
            Category::BusinessFlows => "6. Unrestricted Access to Sensitive Business Flows",
            Category::ServerSideRequestForgery => "7. Server Side Request Forgery",
            Category::Misconfiguration => "8. Security Misconfiguration",
            Category::InventoryManagement => "9. Improper Inventory Management",
            Category::UnsafeConsumption => "10. Unsafe Consumption of APIs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Finding severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Penalty applied by the risk scorer per finding of this severity.
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Low => 2,
            Severity::Medium => 5,
            Severity::High => 10,
            Severity::Critical => 20,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_category_labels_numbered() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert!(category.label().starts_with(&format!("{}.", i + 1)));
        }
    }
}
