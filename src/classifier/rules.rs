use regex::Regex;
use serde_json::Value;

use crate::classifier::FlagRule;
use crate::models::{Category, Endpoint, ParamLocation, ParamType};

/// The ten category rules, in OWASP list order.
pub fn default_rules() -> Vec<Box<dyn FlagRule>> {
    vec![
        Box::new(ObjectLevelRule),
        Box::new(AuthenticationRule),
        Box::new(PropertyLevelRule),
        Box::new(ResourceConsumptionRule),
        Box::new(FunctionLevelRule),
        Box::new(BusinessFlowRule),
        Box::new(SsrfRule),
        Box::new(MisconfigurationRule),
        Box::new(InventoryRule::new()),
        Box::new(UnsafeConsumptionRule),
    ]
}

/// Number of properties a schema fragment declares, if it declares any.
/// Accepts either a bare schema or a responses map keyed by status code.
fn declared_properties(fragment: &Value) -> Option<usize> {
    if let Some(props) = fragment.get("properties").and_then(|p| p.as_object()) {
        return Some(props.len());
    }
    if let Some(map) = fragment.as_object() {
        for value in map.values() {
            if let Some(count) = declared_properties(value) {
                return Some(count);
            }
        }
    }
    None
}

/// A path parameter naming a specific object is a candidate for
/// cross-identity object access.
struct ObjectLevelRule;

impl FlagRule for ObjectLevelRule {
    fn category(&self) -> Category {
        Category::ObjectLevelAuthorization
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        Some(endpoint.path_params().any(|p| p.is_object_id()))
    }
}

/// State-changing verbs with no declared authentication.
struct AuthenticationRule;

impl FlagRule for AuthenticationRule {
    fn category(&self) -> Category {
        Category::BrokenAuthentication
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        Some(endpoint.method.is_mutating() && !endpoint.requires_auth)
    }
}

/// Response schema exposing materially more fields than the request declares.
struct PropertyLevelRule;

impl FlagRule for PropertyLevelRule {
    fn category(&self) -> Category {
        Category::PropertyLevelAuthorization
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        let request = endpoint.request_schema.as_ref()?;
        let response = endpoint.response_schema.as_ref()?;
        let request_fields = declared_properties(request)?;
        let response_fields = declared_properties(response)?;
        Some(response_fields > request_fields + 2)
    }
}

/// Query or body parameters carrying no declared bounds.
struct ResourceConsumptionRule;

impl FlagRule for ResourceConsumptionRule {
    fn category(&self) -> Category {
        Category::ResourceConsumption
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        Some(endpoint.parameters.iter().any(|p| {
            matches!(p.location, ParamLocation::Query | ParamLocation::Body)
                && !p.has_bounds
                && matches!(p.param_type, ParamType::Integer | ParamType::String)
        }))
    }
}

const PRIVILEGED_HINTS: &[&str] = &["admin", "internal", "manage", "superuser", "root"];

/// Admin or internal naming in tags or path segments.
struct FunctionLevelRule;

impl FlagRule for FunctionLevelRule {
    fn category(&self) -> Category {
        Category::FunctionLevelAuthorization
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        let path = endpoint.path.to_lowercase();
        let in_path = path
            .split('/')
            .any(|segment| PRIVILEGED_HINTS.contains(&segment));
        let in_tags = endpoint
            .tags
            .iter()
            .any(|t| PRIVILEGED_HINTS.contains(&t.to_lowercase().as_str()));
        Some(in_path || in_tags)
    }
}

const FLOW_HINTS: &[&str] = &[
    "purchase", "order", "checkout", "payment", "transfer", "booking", "redeem", "vote",
    "invite", "subscribe",
];

/// Money/inventory/workflow verbs with no rate-limit metadata declared.
struct BusinessFlowRule;

impl BusinessFlowRule {
    fn declares_rate_limit(endpoint: &Endpoint) -> bool {
        let in_responses = endpoint
            .response_schema
            .as_ref()
            .and_then(|r| r.as_object())
            .is_some_and(|map| map.contains_key("429"));
        in_responses || endpoint.tags.iter().any(|t| t.to_lowercase().contains("rate"))
    }
}

impl FlagRule for BusinessFlowRule {
    fn category(&self) -> Category {
        Category::BusinessFlows
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        let haystack = format!(
            "{} {}",
            endpoint.path.to_lowercase(),
            endpoint.summary.to_lowercase()
        );
        let is_flow = FLOW_HINTS.iter().any(|hint| haystack.contains(hint));
        Some(is_flow && !Self::declares_rate_limit(endpoint))
    }
}

/// Any parameter whose semantic is "a URL the server will call".
struct SsrfRule;

impl FlagRule for SsrfRule {
    fn category(&self) -> Category {
        Category::ServerSideRequestForgery
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        Some(endpoint.parameters.iter().any(|p| p.is_url_like()))
    }
}

/// No 4xx error responses declared at all: error handling was probably
/// never thought through for this operation.
struct MisconfigurationRule;

impl FlagRule for MisconfigurationRule {
    fn category(&self) -> Category {
        Category::Misconfiguration
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        let responses = endpoint.response_schema.as_ref()?.as_object()?;
        Some(!responses.keys().any(|k| k.starts_with('4')))
    }
}

/// Version markers in the path, or deprecated/beta markers in tags and
/// descriptions.
struct InventoryRule {
    version_marker: Regex,
}

impl InventoryRule {
    fn new() -> Self {
        Self {
            version_marker: Regex::new(r"/v\d+(/|$)").unwrap(),
        }
    }
}

impl FlagRule for InventoryRule {
    fn category(&self) -> Category {
        Category::InventoryManagement
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        if self.version_marker.is_match(&endpoint.path.to_lowercase()) {
            return Some(true);
        }
        let markers = ["deprecated", "beta", "legacy"];
        let in_tags = endpoint
            .tags
            .iter()
            .any(|t| markers.contains(&t.to_lowercase().as_str()));
        let description = endpoint.description.to_lowercase();
        Some(in_tags || markers.iter().any(|m| description.contains(m)))
    }
}

/// Payload-ingesting operations with no request schema to validate against.
struct UnsafeConsumptionRule;

impl FlagRule for UnsafeConsumptionRule {
    fn category(&self) -> Category {
        Category::UnsafeConsumption
    }

    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool> {
        Some(endpoint.method.requires_body() && endpoint.request_schema.is_none())
    }
}
