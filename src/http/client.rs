use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::models::{ApiClient, AuthScheme, Endpoint, HttpMethod};

/// Which credential a probe presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Primary,
    Secondary,
    Anonymous,
}

/// Per-request knobs for probes that deviate from the plain request shape.
#[derive(Debug, Default)]
pub struct Overrides {
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

/// Outcome of one probe round trip. Transport errors are captured in-value
/// rather than raised, so a dead endpoint never aborts sibling probes.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub size: usize,
    pub body: Option<Value>,
    pub text: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl ProbeResponse {
    fn error(err: String, duration_ms: u64) -> Self {
        Self {
            status: 0,
            size: 0,
            body: None,
            text: String::new(),
            duration_ms,
            error: Some(err),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Thin reqwest wrapper that dispatches probe requests under a chosen
/// identity against one target API.
pub struct ProbeClient {
    client: Client,
    base_url: String,
    auth: AuthScheme,
    primary_token: Option<String>,
    secondary_token: Option<String>,
}

impl ProbeClient {
    pub fn new(api: &ApiClient, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(false)
            .build()
            .map_err(|e| Error::Probe(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            auth: api.auth.clone(),
            primary_token: api.primary_token.clone(),
            secondary_token: api.secondary_token.clone(),
        })
    }

    fn token_for(&self, identity: Identity) -> Option<&str> {
        match identity {
            Identity::Primary => self.primary_token.as_deref(),
            Identity::Secondary => self.secondary_token.as_deref(),
            Identity::Anonymous => None,
        }
    }

    /// True when the given identity has a credential configured.
    pub fn has_credential(&self, identity: Identity) -> bool {
        self.token_for(identity).is_some()
    }

    pub async fn request(&self, endpoint: &Endpoint, identity: Identity) -> ProbeResponse {
        self.request_with(endpoint, identity, &Overrides::default())
            .await
    }

    pub async fn request_with(
        &self,
        endpoint: &Endpoint,
        identity: Identity,
        overrides: &Overrides,
    ) -> ProbeResponse {
        let start = Instant::now();
        let resolved_path = endpoint.resolve_path(&overrides.path_params);
        let query_string = Self::encode_query(&overrides.query);
        let url = format!("{}{}{}", self.base_url, resolved_path, query_string);

        let method = Self::to_reqwest_method(endpoint.method);
        let mut request = self.client.request(method, &url);

        if let Some(token) = self.token_for(identity) {
            request = request.header(self.auth.header.as_str(), self.auth.header_value(token));
        }

        request = request.header("Accept", "application/json");

        for (key, value) in &overrides.headers {
            request = request.header(key, value);
        }

        if endpoint.method.requires_body() {
            if let Some(body) = &overrides.body {
                request = request.json(body);
            } else {
                request = request.json(&Value::Object(Default::default()));
            }
        }

        self.execute(request, start).await
    }

    fn encode_query(query: &HashMap<String, String>) -> String {
        if query.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    urlencoding::encode(k).to_string()
                } else {
                    format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                }
            })
            .collect();
        format!("?{}", pairs.join("&"))
    }

    async fn execute(&self, request: RequestBuilder, start: Instant) -> ProbeResponse {
        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let bytes = response.bytes().await.unwrap_or_default();
                let size = bytes.len();
                let body: Option<Value> = serde_json::from_slice(&bytes).ok();
                let text = String::from_utf8_lossy(&bytes).into_owned();
                let duration_ms = start.elapsed().as_millis() as u64;

                ProbeResponse {
                    status,
                    size,
                    body,
                    text,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                ProbeResponse::error(e.to_string(), duration_ms)
            }
        }
    }

    fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
        }
    }
}
