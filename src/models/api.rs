use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Endpoint;
use crate::store::{Store, Table};

/// How the target API expects credentials to be presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthScheme {
    /// Header carrying the credential, e.g. `Authorization`.
    pub header: String,
    /// Optional value prefix, e.g. `Bearer`.
    pub prefix: Option<String>,
}

impl AuthScheme {
    pub fn bearer() -> Self {
        Self {
            header: "Authorization".to_string(),
            prefix: Some("Bearer".to_string()),
        }
    }

    pub fn header_value(&self, token: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{} {}", prefix, token),
            None => token.to_string(),
        }
    }
}

/// One imported target API: metadata plus its ordered endpoint collection.
///
/// Endpoints are unique by identity; re-adding an endpoint from a repeated
/// import replaces the earlier copy instead of duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClient {
    pub id: Uuid,
    pub title: String,
    pub base_url: String,
    pub version: String,
    #[serde(skip)]
    pub endpoints: Vec<Endpoint>,
    pub auth: AuthScheme,
    pub primary_token: Option<String>,
    pub secondary_token: Option<String>,
}

impl ApiClient {
    pub fn new(title: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            version: String::new(),
            endpoints: Vec::new(),
            auth: AuthScheme::bearer(),
            primary_token: None,
            secondary_token: None,
        }
    }

    pub fn add_endpoint(&mut self, endpoint: Endpoint) {
        if let Some(existing) = self.endpoints.iter_mut().find(|e| e.id == endpoint.id) {
            *existing = endpoint;
        } else {
            self.endpoints.push(endpoint);
        }
    }

    pub fn endpoint(&self, id: Uuid) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn set_tokens(&mut self, primary: Option<String>, secondary: Option<String>) {
        self.primary_token = primary;
        self.secondary_token = secondary;
    }

    fn to_row(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_row(row: &Value) -> Result<Self> {
        Ok(serde_json::from_value(row.clone())?)
    }

    /// Persist the api row and all endpoint rows.
    pub async fn save(&self, store: &dyn Store) -> Result<()> {
        store
            .upsert(Table::Apis, self.to_row()?, "id")
            .await?;
        for endpoint in &self.endpoints {
            store
                .upsert(Table::Endpoints, endpoint.to_row(self.id)?, "id")
                .await?;
        }
        debug!(api = %self.id, endpoints = self.endpoints.len(), "api saved");
        Ok(())
    }

    /// Materialize an api and its endpoints from the store.
    pub async fn load(store: &dyn Store, api_id: Uuid) -> Result<Self> {
        let rows = store
            .select(Table::Apis, json!({ "id": api_id }))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::not_found("api", api_id))?;
        let mut api = Self::from_row(row)?;

        let endpoint_rows = store
            .select(Table::Endpoints, json!({ "api_id": api_id }))
            .await?;
        for row in &endpoint_rows {
            api.endpoints.push(Endpoint::from_row(row)?);
        }
        Ok(api)
    }

    /// Delete the api and cascade to its endpoints, scans and scan results.
    pub async fn delete(store: &dyn Store, api_id: Uuid) -> Result<()> {
        let scans = store
            .select(Table::Scans, json!({ "api_id": api_id }))
            .await?;
        for scan in &scans {
            if let Some(scan_id) = scan.get("id") {
                store
                    .delete(Table::ScanResults, json!({ "scan_id": scan_id }))
                    .await?;
            }
        }
        store
            .delete(Table::Scans, json!({ "api_id": api_id }))
            .await?;
        store
            .delete(Table::Endpoints, json!({ "api_id": api_id }))
            .await?;
        store
            .delete(Table::ScheduledScans, json!({ "api_id": api_id }))
            .await?;
        store.delete(Table::Apis, json!({ "id": api_id })).await?;
        debug!(api = %api_id, "api deleted with cascade");
        Ok(())
    }
}
