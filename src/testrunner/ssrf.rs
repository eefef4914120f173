//! SSRF probe: submit a controlled internal-looking target URL.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::http::{Identity, Overrides, ProbeClient};
use crate::models::{ApiClient, Category, Endpoint, Finding, ParamLocation};
use crate::testrunner::VulnTest;

/// Link-local metadata address; a server fetching it has followed an
/// attacker-controlled URL inward.
const INTERNAL_TARGET: &str = "http://169.254.169.254/latest/meta-data/";

pub struct SsrfTest;

#[async_trait]
impl VulnTest for SsrfTest {
    fn category(&self) -> Category {
        Category::ServerSideRequestForgery
    }

    fn name(&self) -> &'static str {
        "internal_target_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        let Some(param) = endpoint.parameters.iter().find(|p| p.is_url_like()) else {
            return Ok(Vec::new());
        };

        let mut overrides = Overrides::default();
        match param.location {
            ParamLocation::Body => {
                let mut body = serde_json::Map::new();
                body.insert(param.name.clone(), json!(INTERNAL_TARGET));
                overrides.body = Some(body.into());
            }
            _ => {
                overrides
                    .query
                    .insert(param.name.clone(), INTERNAL_TARGET.to_string());
            }
        }

        let response = client
            .request_with(endpoint, Identity::Primary, &overrides)
            .await;
        if let Some(err) = &response.error {
            return Err(Error::Probe(err.clone()));
        }

        if !response.is_success() {
            return Ok(Vec::new());
        }

        // A response echoing metadata content means the outbound fetch
        // actually happened, not just that the URL was accepted.
        let fetched = response.text.contains("meta-data")
            || response.text.contains("169.254.169.254");

        let finding = if fetched {
            Finding::critical(
                self.category(),
                "Server fetched an internal metadata URL",
                endpoint.id,
            )
            .with_cvss(9.3)
        } else {
            Finding::high(
                self.category(),
                "Internal target URL accepted for server-side retrieval",
                endpoint.id,
            )
            .with_cvss(7.7)
        };

        Ok(vec![finding
            .with_description(
                "A link-local target submitted through a URL parameter was not rejected.",
            )
            .with_recommendation(
                "Validate outbound URLs against an allow-list and block link-local ranges.",
            )
            .with_evidence(json!({
                "status": response.status,
                "payload": INTERNAL_TARGET,
                "outbound_confirmed": fetched,
            }))
            .with_test_name(self.name())
            .with_affected_params(vec![param.name.clone()])])
    }
}
