//! Authentication probe: attempt the protected verb with no credentials.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::http::{Identity, ProbeClient};
use crate::models::{ApiClient, Category, Endpoint, Finding};
use crate::testrunner::VulnTest;

pub struct AuthenticationTest;

#[async_trait]
impl VulnTest for AuthenticationTest {
    fn category(&self) -> Category {
        Category::BrokenAuthentication
    }

    fn name(&self) -> &'static str {
        "anonymous_access_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        let response = client.request(endpoint, Identity::Anonymous).await;
        if let Some(err) = &response.error {
            return Err(Error::Probe(err.clone()));
        }

        if !response.is_success() {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::high(
            self.category(),
            "State-changing operation succeeded without credentials",
            endpoint.id,
        )
        .with_cvss(8.6)
        .with_description(
            "The endpoint accepted an unauthenticated request for a verb that mutates state.",
        )
        .with_recommendation("Require authentication on all state-changing operations.")
        .with_evidence(json!({ "status": response.status, "size": response.size }))
        .with_test_name(self.name())])
    }
}
