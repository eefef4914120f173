//! Consumption probes: oversized parameters and unthrottled business flows.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::http::{Identity, Overrides, ProbeClient};
use crate::models::{ApiClient, Category, Endpoint, Finding, ParamLocation, ParamType};
use crate::testrunner::VulnTest;

/// Pushes an oversized value through an unbounded parameter.
pub struct ResourceConsumptionTest;

#[async_trait]
impl VulnTest for ResourceConsumptionTest {
    fn category(&self) -> Category {
        Category::ResourceConsumption
    }

    fn name(&self) -> &'static str {
        "oversized_parameter_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        let Some(param) = endpoint.parameters.iter().find(|p| {
            matches!(p.location, ParamLocation::Query | ParamLocation::Body) && !p.has_bounds
        }) else {
            return Ok(Vec::new());
        };

        let oversized = match param.param_type {
            ParamType::Integer => "1000000".to_string(),
            _ => "A".repeat(8192),
        };

        let mut overrides = Overrides::default();
        match param.location {
            ParamLocation::Body => {
                let mut body = serde_json::Map::new();
                body.insert(param.name.clone(), json!(oversized));
                overrides.body = Some(body.into());
            }
            _ => {
                overrides.query.insert(param.name.clone(), oversized);
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

        Ok(vec![Finding::medium(
            self.category(),
            "Oversized parameter accepted without enforcement",
            endpoint.id,
        )
        .with_cvss(5.3)
        .with_description(
            "A parameter with no declared bounds accepted a value far beyond plausible use.",
        )
        .with_recommendation("Declare and enforce bounds on every client-supplied parameter.")
        .with_evidence(json!({ "status": response.status, "parameter": param.name }))
        .with_test_name(self.name())
        .with_affected_params(vec![param.name.clone()])])
    }
}

/// Bursts a sensitive business flow looking for a 429 that never comes.
pub struct BusinessFlowTest;

const BURST_SIZE: usize = 5;

#[async_trait]
impl VulnTest for BusinessFlowTest {
    fn category(&self) -> Category {
        Category::BusinessFlows
    }

    fn name(&self) -> &'static str {
        "flow_burst_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        let mut statuses = Vec::with_capacity(BURST_SIZE);
        for _ in 0..BURST_SIZE {
            let response = client.request(endpoint, Identity::Primary).await;
            if let Some(err) = &response.error {
                return Err(Error::Probe(err.clone()));
            }
            if response.status == 429 {
                return Ok(Vec::new());
            }
            statuses.push(response.status);
        }

        if !statuses.iter().all(|s| (200..300).contains(s)) {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::medium(
            self.category(),
            "Sensitive business flow accepts rapid repeated execution",
            endpoint.id,
        )
        .with_cvss(6.1)
        .with_description(format!(
            "{BURST_SIZE} back-to-back requests all succeeded with no throttling response."
        ))
        .with_recommendation("Rate-limit business flows that move money, stock or invitations.")
        .with_evidence(json!({ "burst": BURST_SIZE, "statuses": statuses }))
        .with_test_name(self.name())])
    }
}
