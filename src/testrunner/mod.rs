//! Active testing pass.
//!
//! One probe per category. A probe only sees endpoints carrying its flag,
//! never mutates the API model, and reports findings only on positive or
//! likely-positive evidence. Probe failures are absorbed per endpoint so a
//! dead endpoint cannot take its siblings down with it.

mod access;
mod auth;
mod hygiene;
mod limits;
mod ssrf;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http::ProbeClient;
use crate::models::{ApiClient, Category, Endpoint, Finding};

#[async_trait]
pub trait VulnTest: Send + Sync {
    fn category(&self) -> Category;
    fn name(&self) -> &'static str;

    /// Probe one flagged endpoint. An `Err` marks the probe skipped; it is
    /// never surfaced past the runner.
    async fn run(
        &self,
        api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Result<Vec<Finding>>;
}

/// One active probe per category, in OWASP list order.
pub fn default_tests() -> Vec<Box<dyn VulnTest>> {
    vec![
        Box::new(access::ObjectLevelTest),
        Box::new(auth::AuthenticationTest),
        Box::new(access::PropertyLevelTest),
        Box::new(limits::ResourceConsumptionTest),
        Box::new(access::FunctionLevelTest),
        Box::new(limits::BusinessFlowTest),
        Box::new(ssrf::SsrfTest),
        Box::new(hygiene::MisconfigurationTest),
        Box::new(hygiene::InventoryTest::new()),
        Box::new(hygiene::UnsafeConsumptionTest),
    ]
}

/// Drives all probes for one scan behind a bounded worker pool.
///
/// Probes for distinct endpoints share no mutable state; ordering of the
/// returned findings is not significant.
pub struct TestRunner {
    tests: Vec<Box<dyn VulnTest>>,
    semaphore: Arc<Semaphore>,
}

impl TestRunner {
    pub fn new(tests: Vec<Box<dyn VulnTest>>, concurrency: usize) -> Self {
        Self {
            tests,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub async fn run_all(&self, api: &ApiClient, client: &ProbeClient) -> Vec<Finding> {
        let mut jobs = Vec::new();
        for test in &self.tests {
            for endpoint in &api.endpoints {
                if endpoint.skip || !endpoint.has_flag(test.category()) {
                    continue;
                }
                jobs.push(self.probe_one(test.as_ref(), api, endpoint, client));
            }
        }

        join_all(jobs).await.into_iter().flatten().collect()
    }

    async fn probe_one(
        &self,
        test: &dyn VulnTest,
        api: &ApiClient,
        endpoint: &Endpoint,
        client: &ProbeClient,
    ) -> Vec<Finding> {
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");

        match test.run(api, endpoint, client).await {
            Ok(findings) => {
                debug!(
                    test = test.name(),
                    endpoint = %endpoint.display_path(),
                    findings = findings.len(),
                    "probe finished"
                );
                findings
            }
            Err(e) => {
                // Partial-failure isolation: record as skipped, keep going.
                warn!(
                    test = test.name(),
                    endpoint = %endpoint.display_path(),
                    error = %e,
                    "probe skipped"
                );
                Vec::new()
            }
        }
    }
}
