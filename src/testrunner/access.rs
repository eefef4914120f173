//! Authorization probes: object-level, function-level and property-level.

use async_trait::async_trait;
use serde_json::json;

use crate::analyzer::PayloadDiffer;
use crate::error::{Error, Result};
use crate::http::{Identity, ProbeClient};
use crate::models::{ApiClient, Category, Endpoint, Finding};
use crate::testrunner::VulnTest;

/// Requests the same object under two distinct identities. If the second
/// principal can read the first principal's object, object-level
/// authorization is broken.
pub struct ObjectLevelTest;

#[async_trait]
impl VulnTest for ObjectLevelTest {
    fn category(&self) -> Category {
        Category::ObjectLevelAuthorization
    }

    fn name(&self) -> &'static str {
        "cross_identity_object_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        if !client.has_credential(Identity::Secondary) {
            return Err(Error::Probe(
                "secondary credential not configured".to_string(),
            ));
        }

        // Same resolved object id for both identities.
        let first = client.request(endpoint, Identity::Primary).await;
        let second = client.request(endpoint, Identity::Secondary).await;

        if let Some(err) = first.error.as_ref().or(second.error.as_ref()) {
            return Err(Error::Probe(err.clone()));
        }
        if !(first.is_success() && second.is_success()) {
            return Ok(Vec::new());
        }

        let differ = PayloadDiffer::default();
        let identical_payload = match (&first.body, &second.body) {
            (Some(a), Some(b)) => a == b,
            _ => first.text == second.text,
        };

        let evidence = json!({
            "primary_status": first.status,
            "secondary_status": second.status,
            "primary_size": first.size,
            "secondary_size": second.size,
            "identical_payload": identical_payload,
            "size_diff_ratio": differ.length_diff_ratio(first.size, second.size),
        });

        let object_params: Vec<String> = endpoint
            .path_params()
            .filter(|p| p.is_object_id())
            .map(|p| p.name.clone())
            .collect();

        let finding = if identical_payload {
            Finding::critical(
                self.category(),
                "Identical object payload served to both identities",
                endpoint.id,
            )
            .with_cvss(9.1)
        } else {
            Finding::high(
                self.category(),
                "Object readable across identities",
                endpoint.id,
            )
            .with_cvss(8.2)
        };

        Ok(vec![finding
            .with_description(
                "Two distinct identities retrieved the same object through this endpoint.",
            )
            .with_recommendation(
                "Verify object ownership against the authenticated principal on every request.",
            )
            .with_evidence(evidence)
            .with_test_name(self.name())
            .with_affected_params(object_params)])
    }
}

/// Calls a privileged function with the low-privilege identity.
pub struct FunctionLevelTest;

#[async_trait]
impl VulnTest for FunctionLevelTest {
    fn category(&self) -> Category {
        Category::FunctionLevelAuthorization
    }

    fn name(&self) -> &'static str {
        "low_privilege_function_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        if !client.has_credential(Identity::Secondary) {
            return Err(Error::Probe(
                "secondary credential not configured".to_string(),
            ));
        }

        let response = client.request(endpoint, Identity::Secondary).await;
        if let Some(err) = &response.error {
            return Err(Error::Probe(err.clone()));
        }

        if !response.is_success() {
            return Ok(Vec::new());
        }

        Ok(vec![Finding::high(
            self.category(),
            "Privileged function accessible to low-privilege identity",
            endpoint.id,
        )
        .with_cvss(8.0)
        .with_description(
            "An administrative operation returned success for a non-privileged credential.",
        )
        .with_recommendation("Enforce role checks on every privileged function, not at the UI.")
        .with_evidence(json!({ "status": response.status, "size": response.size }))
        .with_test_name(self.name())])
    }
}

/// Compares the properties a response actually carries against what the
/// request schema declared, looking for over-exposure.
pub struct PropertyLevelTest;

#[async_trait]
impl VulnTest for PropertyLevelTest {
    fn category(&self) -> Category {
        Category::PropertyLevelAuthorization
    }

    fn name(&self) -> &'static str {
        "property_exposure_probe"
    }

    async fn run(
        &self,
        _api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>> {
        let Some(request_schema) = endpoint.request_schema.as_ref() else {
            return Ok(Vec::new());
        };

        let response = client.request(endpoint, Identity::Primary).await;
        if let Some(err) = &response.error {
            return Err(Error::Probe(err.clone()));
        }
        if !response.is_success() {
            return Ok(Vec::new());
        }
        let Some(body) = &response.body else {
            return Ok(Vec::new());
        };

        let differ = PayloadDiffer::default();
        let declared = differ.schema_keys(request_schema);
        let observed = differ.extract_keys(body);
        if differ.keys_match(&declared, &observed) {
            return Ok(Vec::new());
        }

        let mut extra: Vec<String> = differ
            .extra_keys(&declared, &observed)
            .into_iter()
            .cloned()
            .collect();
        extra.sort();
        if extra.is_empty() {
            return Ok(Vec::new());
        }

        let sensitive: Vec<String> = differ
            .sensitive_keys(&observed)
            .into_iter()
            .filter(|k| extra.contains(k))
            .collect();
        let cvss = if sensitive.is_empty() { 5.3 } else { 6.5 };

        Ok(vec![Finding::medium(
            self.category(),
            "Response exposes properties the request never declared",
            endpoint.id,
        )
        .with_cvss(cvss)
        .with_description(
            "The live response carries properties beyond the request schema's declarations.",
        )
        .with_recommendation("Return an explicit allow-list of properties per consumer role.")
        .with_evidence(json!({
            "status": response.status,
            "declared_keys": declared.len(),
            "observed_keys": observed.len(),
            "undeclared_keys": extra.clone(),
            "sensitive_keys": sensitive,
        }))
        .with_test_name(self.name())
        .with_affected_params(extra)])
    }
}
