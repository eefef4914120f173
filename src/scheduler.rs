//! Recurring-scan polling.
//!
//! Purely tick-driven: the caller decides the cadence and guarantees that
//! no two ticks run concurrently. Each tick triggers every due schedule
//! and advances its next run measured from the tick time, so missed runs
//! drift forward instead of being replayed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::ScheduledScan;
use crate::orchestrator::ScanOrchestrator;
use crate::store::{Store, Table};

pub struct Scheduler {
    store: Arc<dyn Store>,
    orchestrator: Arc<ScanOrchestrator>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, orchestrator: Arc<ScanOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    /// Process every due schedule once. Returns the number of scans
    /// triggered. One bad schedule never blocks the rest of the tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let rows = match self
            .store
            .select(Table::ScheduledScans, json!({ "enabled": true }))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "schedule poll failed");
                return 0;
            }
        };

        let mut triggered = 0;
        for row in &rows {
            let schedule = match ScheduledScan::from_row(row) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "undecodable schedule row");
                    continue;
                }
            };
            if !schedule.is_due(now) {
                continue;
            }

            match self.trigger(&schedule, now).await {
                Ok(true) => triggered += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(api = %schedule.api_id, error = %e, "schedule processing failed");
                }
            }
        }
        triggered
    }

    async fn trigger(&self, schedule: &ScheduledScan, now: DateTime<Utc>) -> Result<bool> {
        // Conditional advance keyed on the previous due time: if another
        // tick already moved it, this one touches nothing and backs off.
        let touched = self
            .store
            .update(
                Table::ScheduledScans,
                json!({
                    "next_run_at": schedule.frequency.advance(now),
                    "updated_at": now,
                }),
                json!({
                    "api_id": schedule.api_id,
                    "next_run_at": schedule.next_run_at,
                }),
            )
            .await?;
        if touched.is_empty() {
            debug!(api = %schedule.api_id, "schedule already advanced elsewhere");
            return Ok(false);
        }

        let scan = self
            .orchestrator
            .create_scan(schedule.api_id, &schedule.user_id)
            .await?;
        // Pipeline failures surface as the scan's failed state, not here.
        let scan = self.orchestrator.execute(scan.id).await?;
        info!(
            api = %schedule.api_id,
            scan = %scan.id,
            status = %scan.status,
            "scheduled scan triggered"
        );
        Ok(true)
    }
}
