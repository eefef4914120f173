//! Hygiene probes: verbose errors, retired versions, unvalidated ingestion.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use crate::error::{Error, Result};
use crate::http::{Identity, Overrides, ProbeClient};
use crate::models::{ApiClient, Category, Endpoint, Finding};
use crate::testrunner::VulnTest;

/// Sends deliberately malformed input and watches for stack traces or
/// framework internals in the error output.
pub struct MisconfigurationTest;

const ERROR_LEAK_MARKERS: &[&str] = &[
    "Traceback",
    "Exception",
    "stack trace",
    "panicked at",
    "at java.",
    "ORA-",
    "SQLSTATE",
];

#[async_trait]
impl VulnTest for MisconfigurationTest {
    fn category(&self) -> Category {
        Category::Misconfiguration
    }

    fn name(&self) -> &'static str {
        "verbose_error_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        let mut overrides = Overrides::default();
        overrides
            .query
            .insert("q".to_string(), "'\"<injected>%00".to_string());

        let response = client
            .request_with(endpoint, Identity::Primary, &overrides)
            .await;
        if let Some(err) = &response.error {
            return Err(Error::Probe(err.clone()));
        }

        let leaked: Vec<&str> = ERROR_LEAK_MARKERS
            .iter()
            .filter(|m| response.text.contains(*m))
            .copied()
            .collect();

        if response.status < 500 || leaked.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::medium(
            self.category(),
            "Verbose error output on malformed input",
            endpoint.id,
        )
        .with_cvss(5.3)
        .with_description(
            "Malformed input produced a server error carrying implementation internals.",
        )
        .with_recommendation("Return generic error bodies; log the detail server-side only.")
        .with_evidence(json!({ "status": response.status, "markers": leaked }))
        .with_test_name(self.name())])
    }
}

/// Probes whether the version before the advertised one still answers.
pub struct InventoryTest {
    version_marker: Regex,
}

impl InventoryTest {
    pub fn new() -> Self {
        Self {
            version_marker: Regex::new(r"/v(\d+)(/|$)").unwrap(),
        }
    }
}

impl Default for InventoryTest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VulnTest for InventoryTest {
    fn category(&self) -> Category {
        Category::InventoryManagement
    }

    fn name(&self) -> &'static str {
        "prior_version_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        let Some(caps) = self.version_marker.captures(&endpoint.path) else {
            return Ok(Vec::new());
        };
        let version: u32 = caps[1].parse().unwrap_or(0);
        if version < 2 {
            return Ok(Vec::new());
        }

        let prior_path = endpoint.path.replacen(
            &format!("/v{version}"),
            &format!("/v{}", version - 1),
            1,
        );
        let mut prior = endpoint.clone();
        prior.path = prior_path.clone();

        let response = client.request(&prior, Identity::Primary).await;
        if let Some(err) = &response.error {
            return Err(Error::Probe(err.clone()));
        }

        if !response.is_success() {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::medium(
            self.category(),
            "Retired API version still serving traffic",
            endpoint.id,
        )
        .with_cvss(5.0)
        .with_description(format!(
            "The prior version path {prior_path} answered successfully alongside v{version}."
        ))
        .with_recommendation("Decommission superseded API versions or gate them explicitly.")
        .with_evidence(json!({ "probed_path": prior_path, "status": response.status }))
        .with_test_name(self.name())])
    }
}

/// Feeds a shape-confused third-party payload to an ingestion endpoint.
pub struct UnsafeConsumptionTest;

#[async_trait]
impl VulnTest for UnsafeConsumptionTest {
    fn category(&self) -> Category {
        Category::UnsafeConsumption
    }

    fn name(&self) -> &'static str {
        "payload_confusion_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        if !endpoint.method.requires_body() {
            return Ok(Vec::new());
        }

        let mut overrides = Overrides::default();
        overrides.body = Some(json!({
            "unexpected_field": "x",
            "amount": "not-a-number",
            "items": { "0": "object where an array belongs" },
        }));

        let response = client
            .request_with(endpoint, Identity::Primary, &overrides)
            .await;
        if let Some(err) = &response.error {
            return Err(Error::Probe(err.clone()));
        }

        if !response.is_success() {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::low(
            self.category(),
            "Unvalidated third-party payload accepted",
            endpoint.id,
        )
        .with_cvss(3.7)
        .with_description(
            "A payload with undeclared fields and wrong types was accepted as-is.",
        )
        .with_recommendation("Validate inbound payloads against a schema before processing.")
        .with_evidence(json!({ "status": response.status }))
        .with_test_name(self.name())])
    }
}
