mod api;
mod category;
mod endpoint;
mod finding;
mod scan;

pub use api::{ApiClient, AuthScheme};
pub use category::{Category, Severity};
pub use endpoint::{Endpoint, HttpMethod, ParamLocation, ParamType, Parameter};
pub use finding::Finding;
pub use scan::{Frequency, Scan, ScanStatus, ScheduledScan};
