use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lifecycle state of one scan.
///
/// `Running` is the only initial state; `Completed` and `Failed` are
/// terminal. There is no backward transition and no third terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ScanStatus::Running),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One classify-then-test execution against one API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub api_id: Uuid,
    pub user_id: String,
    pub status: ScanStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Scan {
    pub fn new(api_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            api_id,
            user_id: user_id.into(),
            status: ScanStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn to_row(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_row(row: &Value) -> Result<Self> {
        Ok(serde_json::from_value(row.clone())?)
    }
}

/// Recurrence interval for a scheduled scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(Error::Validation(format!("unknown frequency: {other}"))),
        }
    }

    /// Next due time measured from `from`. Callers pass the tick time, not
    /// the original due time, so missed runs drift instead of replaying.
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Frequency::Daily => from + Duration::days(1),
            Frequency::Weekly => from + Duration::weeks(1),
            Frequency::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or(from + Duration::days(30)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        };
        write!(f, "{}", s)
    }
}

/// Recurring-scan configuration, unique per API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledScan {
    pub api_id: Uuid,
    pub user_id: String,
    pub frequency: Frequency,
    pub enabled: bool,
    pub next_run_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledScan {
    pub fn new(api_id: Uuid, user_id: impl Into<String>, frequency: Frequency) -> Self {
        let now = Utc::now();
        Self {
            api_id,
            user_id: user_id.into(),
            frequency,
            enabled: true,
            next_run_at: now,
            updated_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at <= now
    }

    pub fn to_row(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_row(row: &Value) -> Result<Self> {
        Ok(serde_json::from_value(row.clone())?)
    }
}
