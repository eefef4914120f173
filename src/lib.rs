//! Automated detection of OWASP API Top-10 vulnerabilities in a target
//! API described by an imported specification.
//!
//! The engine works in two phases per scan: a heuristic classification
//! pass flags plausible vulnerability categories per endpoint from the
//! static model alone, then an active testing pass probes each flagged
//! endpoint over the network and materializes findings on positive
//! evidence. The [`orchestrator::ScanOrchestrator`] drives the cycle and
//! owns the scan lifecycle; the [`scheduler::Scheduler`] triggers
//! recurring scans; [`risk::risk_score`] condenses findings to a number.

pub mod analyzer;
pub mod classifier;
pub mod error;
pub mod http;
pub mod models;
pub mod orchestrator;
pub mod risk;
pub mod scheduler;
pub mod store;
pub mod testrunner;

pub use error::{Error, Result};
pub use models::{
    ApiClient, AuthScheme, Category, Endpoint, Finding, Frequency, HttpMethod, Parameter, Scan,
    ScanStatus, ScheduledScan, Severity,
};
pub use orchestrator::{ScanDetails, ScanOrchestrator};
pub use risk::risk_score;
pub use scheduler::Scheduler;
pub use store::{MemoryStore, Store, Table};
