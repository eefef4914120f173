//! Heuristic classification pass.
//!
//! Each rule inspects the static API model and decides whether an endpoint
//! is a plausible candidate for its category. No rule touches the network.

mod rules;

pub use rules::default_rules;

use tracing::debug;

use crate::models::{ApiClient, Category, Endpoint};

/// One per-category heuristic.
///
/// `evaluate` returns `None` when the endpoint lacks the attributes the
/// rule needs; the pass silently skips it rather than failing.
pub trait FlagRule: Send + Sync {
    fn category(&self) -> Category;
    fn evaluate(&self, endpoint: &Endpoint) -> Option<bool>;
}

/// Run every rule over every endpoint, annotating candidate flags.
///
/// Endpoints marked skip by operator policy are excluded from all rules.
/// Flags form a set, so running the pass twice yields identical flag sets.
pub fn classify_api(api: &mut ApiClient, rules: &[Box<dyn FlagRule>]) {
    for endpoint in &mut api.endpoints {
        if endpoint.skip {
            debug!(endpoint = %endpoint.display_path(), "skipped by operator policy");
            continue;
        }
        for rule in rules {
            match rule.evaluate(endpoint) {
                Some(true) => {
                    if endpoint.add_flag(rule.category()) {
                        debug!(
                            endpoint = %endpoint.display_path(),
                            category = %rule.category(),
                            "flagged"
                        );
                    }
                }
                Some(false) => {}
                // Missing attribute: classification skip, not an error.
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Endpoint, HttpMethod};

    fn sample_api() -> ApiClient {
        let mut api = ApiClient::new("Sample", "http://localhost");
        api.add_endpoint(Endpoint::new(HttpMethod::Get, "/profile/{user_id}"));
        let mut admin = Endpoint::new(HttpMethod::Get, "/admin/users");
        admin.add_tag("admin");
        api.add_endpoint(admin);
        api
    }

    #[test]
    fn test_pass_is_idempotent() {
        let mut api = sample_api();
        let rules = default_rules();

        classify_api(&mut api, &rules);
        let first: Vec<_> = api.endpoints.iter().map(|e| e.flags.clone()).collect();

        classify_api(&mut api, &rules);
        let second: Vec<_> = api.endpoints.iter().map(|e| e.flags.clone()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_skip_policy_excludes_endpoint() {
        let mut api = sample_api();
        for ep in &mut api.endpoints {
            ep.skip = true;
        }
        classify_api(&mut api, &default_rules());
        assert!(api.endpoints.iter().all(|e| e.flags.is_empty()));
    }

    #[test]
    fn test_object_access_path_gets_bola_flag() {
        let mut api = sample_api();
        classify_api(&mut api, &default_rules());
        let profile = api
            .endpoints
            .iter()
            .find(|e| e.path == "/profile/{user_id}")
            .unwrap();
        assert!(profile.has_flag(Category::ObjectLevelAuthorization));
    }

    #[test]
    fn test_admin_path_gets_bfla_flag() {
        let mut api = sample_api();
        classify_api(&mut api, &default_rules());
        let admin = api
            .endpoints
            .iter()
            .find(|e| e.path == "/admin/users")
            .unwrap();
        assert!(admin.has_flag(Category::FunctionLevelAuthorization));
    }
}
