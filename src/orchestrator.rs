//! Scan lifecycle: one classify, test, persist cycle per scan.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classifier::{classify_api, default_rules, FlagRule};
use crate::error::{Error, Result};
use crate::http::ProbeClient;
use crate::models::{ApiClient, Finding, Scan, ScanStatus};
use crate::store::{Store, Table};
use crate::testrunner::{default_tests, TestRunner};

/// A scan record together with its decoded findings.
#[derive(Debug, Clone)]
pub struct ScanDetails {
    pub scan: Scan,
    pub findings: Vec<Finding>,
}

/// Drives the full scan cycle and owns the scan's lifecycle state.
///
/// State machine: `running` (initial) moves to `completed` or `failed`,
/// both terminal. A scan is never resumed or retried in place.
pub struct ScanOrchestrator {
    store: Arc<dyn Store>,
    rules: Vec<Box<dyn FlagRule>>,
    runner: TestRunner,
    probe_timeout_secs: u64,
}

impl ScanOrchestrator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_settings(store, 8, 10)
    }

    pub fn with_settings(
        store: Arc<dyn Store>,
        probe_concurrency: usize,
        probe_timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            rules: default_rules(),
            runner: TestRunner::new(default_tests(), probe_concurrency),
            probe_timeout_secs,
        }
    }

    /// Persist a new scan in `running`. NotFound when the API is unknown;
    /// in that case no scan row is written.
    pub async fn create_scan(&self, api_id: Uuid, user_id: &str) -> Result<Scan> {
        let apis = self
            .store
            .select(Table::Apis, json!({ "id": api_id }))
            .await?;
        if apis.is_empty() {
            return Err(Error::not_found("api", api_id));
        }

        let scan = Scan::new(api_id, user_id);
        self.store.insert(Table::Scans, scan.to_row()?).await?;
        info!(scan = %scan.id, api = %api_id, "scan created");
        Ok(scan)
    }

    /// Run the classifier pass, then every probe against its flagged
    /// endpoints, bulk-persist the findings and mark the scan completed.
    ///
    /// Pipeline failures never propagate as errors: they land in the
    /// `failed` state. Only an unknown or already-terminal scan id is
    /// reported back to the caller directly.
    pub async fn execute(&self, scan_id: Uuid) -> Result<Scan> {
        let rows = self
            .store
            .select(Table::Scans, json!({ "id": scan_id }))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::not_found("scan", scan_id))?;
        let scan = Scan::from_row(row)?;

        if scan.status.is_terminal() {
            return Err(Error::Validation(format!(
                "scan {scan_id} is already {}",
                scan.status
            )));
        }

        match self.run_pipeline(&scan).await {
            Ok(count) => {
                info!(scan = %scan_id, findings = count, "scan pipeline finished");
                match self.mark(scan_id, ScanStatus::Completed).await {
                    Ok(done) => Ok(done),
                    Err(e) => {
                        warn!(scan = %scan_id, error = %e, "completion write failed");
                        Ok(self.mark_failed_best_effort(scan).await)
                    }
                }
            }
            Err(e) => {
                warn!(scan = %scan_id, error = %e, "scan pipeline failed");
                Ok(self.mark_failed_best_effort(scan).await)
            }
        }
    }

    /// The scan record plus all of its findings, decoded.
    pub async fn get_details(&self, scan_id: Uuid) -> Result<ScanDetails> {
        let rows = self
            .store
            .select(Table::Scans, json!({ "id": scan_id }))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::not_found("scan", scan_id))?;
        let scan = Scan::from_row(row)?;

        let result_rows = self
            .store
            .select(Table::ScanResults, json!({ "scan_id": scan_id }))
            .await?;
        let findings = result_rows
            .iter()
            .map(Finding::from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(ScanDetails { scan, findings })
    }

    /// All scans for one API. Callers are responsible for ordering.
    pub async fn list_for_api(&self, api_id: Uuid) -> Result<Vec<Scan>> {
        let rows = self
            .store
            .select(Table::Scans, json!({ "api_id": api_id }))
            .await?;
        rows.iter().map(Scan::from_row).collect()
    }

    async fn run_pipeline(&self, scan: &Scan) -> Result<usize> {
        let mut api = ApiClient::load(self.store.as_ref(), scan.api_id).await?;

        classify_api(&mut api, &self.rules);
        for endpoint in &api.endpoints {
            self.store
                .update(
                    Table::Endpoints,
                    json!({ "flags": &endpoint.flags }),
                    json!({ "id": endpoint.id }),
                )
                .await?;
        }

        let client = ProbeClient::new(&api, self.probe_timeout_secs)?;
        let findings = self.runner.run_all(&api, &client).await;

        if !findings.is_empty() {
            let rows = findings
                .iter()
                .map(|f| f.to_row(scan.id))
                .collect::<Result<Vec<Value>>>()?;
            // One bulk write for the whole scan.
            self.store
                .insert(Table::ScanResults, Value::Array(rows))
                .await?;
        }

        Ok(findings.len())
    }

    async fn mark(&self, scan_id: Uuid, status: ScanStatus) -> Result<Scan> {
        let patch = json!({
            "status": status.as_str(),
            "completed_at": Utc::now(),
        });
        let rows = self
            .store
            .update(Table::Scans, patch, json!({ "id": scan_id }))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::not_found("scan", scan_id))?;
        Scan::from_row(row)
    }

    /// Best-effort transition to `failed`. If even that write fails the
    /// scan is left `running`; an external reconciliation sweep has to
    /// pick it up (documented limitation).
    async fn mark_failed_best_effort(&self, scan: Scan) -> Scan {
        match self.mark(scan.id, ScanStatus::Failed).await {
            Ok(failed) => failed,
            Err(e) => {
                error!(
                    scan = %scan.id,
                    error = %e,
                    "failed-status write also failed; scan left running"
                );
                scan
            }
        }
    }
}
