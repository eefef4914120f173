use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        write!(f, "{}", s)
    }
}

impl HttpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn requires_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    /// Verbs that change state; missing auth on these is a stronger signal.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    String,
    Integer,
    Uuid,
    Boolean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    pub param_type: ParamType,
    pub format: Option<String>,
    pub required: bool,
    /// Whether the spec declared any bound (maximum, maxLength, maxItems).
    pub has_bounds: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParamLocation, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            location,
            param_type,
            format: None,
            required: true,
            has_bounds: false,
        }
    }

    pub fn default_value(&self) -> String {
        match self.param_type {
            ParamType::String => "test".to_string(),
            ParamType::Integer => "1".to_string(),
            ParamType::Uuid => "00000000-0000-0000-0000-000000000001".to_string(),
            ParamType::Boolean => "true".to_string(),
        }
    }

    /// Parameter that names a specific object instance (object-authorization candidate).
    pub fn is_object_id(&self) -> bool {
        let lower = self.name.to_lowercase();
        if lower.contains("uuid") {
            return true;
        }
        matches!(self.param_type, ParamType::Uuid | ParamType::Integer)
            && (lower == "id" || lower.ends_with("_id") || lower.ends_with("id"))
    }

    /// Parameter whose semantic is "a URL the server will contact".
    pub fn is_url_like(&self) -> bool {
        if self.format.as_deref() == Some("uri") {
            return true;
        }
        let lower = self.name.to_lowercase();
        ["url", "uri", "callback", "webhook", "redirect", "target", "dest"]
            .iter()
            .any(|hint| lower.contains(hint))
    }
}

/// One operation of the target API.
///
/// Identity is derived from (method, path) so repeated imports of the same
/// specification resolve to the same endpoint row. Flags are a true set:
/// re-running the classifier pass cannot duplicate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub request_schema: Option<Value>,
    #[serde(default)]
    pub response_schema: Option<Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub requires_auth: bool,
    /// Operator policy: excluded from every classifier and probe.
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub flags: BTreeSet<Category>,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        let parameters = Self::extract_path_params(&path);
        Self {
            id: Self::identity(method, &path),
            path,
            method,
            summary: String::new(),
            description: String::new(),
            parameters,
            request_schema: None,
            response_schema: None,
            tags: BTreeSet::new(),
            requires_auth: false,
            skip: false,
            flags: BTreeSet::new(),
        }
    }

    /// Deterministic identity for (method, path). Stable across imports.
    pub fn identity(method: HttpMethod, path: &str) -> Uuid {
        Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            format!("{} {}", method, path).as_bytes(),
        )
    }

    fn extract_path_params(path: &str) -> Vec<Parameter> {
        let mut params = Vec::new();
        for segment in path.split('/') {
            if segment.starts_with('{') && segment.ends_with('}') {
                let name = segment[1..segment.len() - 1].to_string();
                let param_type = Self::infer_param_type(&name);
                params.push(Parameter::new(name, ParamLocation::Path, param_type));
            }
        }
        params
    }

    fn infer_param_type(name: &str) -> ParamType {
        let lower = name.to_lowercase();
        if lower.contains("uuid") || (lower.ends_with("_id") && lower.len() > 10) {
            ParamType::Uuid
        } else if lower.contains("id") || lower.contains("count") || lower.contains("num") {
            ParamType::Integer
        } else if lower.contains("enabled") || lower.contains("active") || lower.contains("flag") {
            ParamType::Boolean
        } else {
            ParamType::String
        }
    }

    pub fn path_params(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParamLocation::Path)
    }

    pub fn resolve_path(&self, custom_params: &HashMap<String, String>) -> String {
        let mut resolved = self.path.clone();
        for param in self.path_params() {
            let value = custom_params
                .get(&param.name)
                .cloned()
                .unwrap_or_else(|| param.default_value());
            resolved = resolved.replace(&format!("{{{}}}", param.name), &value);
        }
        resolved
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn add_flag(&mut self, flag: Category) -> bool {
        self.flags.insert(flag)
    }

    pub fn remove_flag(&mut self, flag: Category) -> bool {
        self.flags.remove(&flag)
    }

    pub fn has_flag(&self, flag: Category) -> bool {
        self.flags.contains(&flag)
    }

    pub fn enable_auth(&mut self) {
        self.requires_auth = true;
    }

    pub fn disable_auth(&mut self) {
        self.requires_auth = false;
    }

    pub fn display_path(&self) -> String {
        format!("{:6} {}", self.method, self.path)
    }

    /// Row shape for the endpoints table.
    pub fn to_row(&self, api_id: Uuid) -> Result<Value> {
        let mut row = serde_json::to_value(self)?;
        row["api_id"] = serde_json::json!(api_id);
        Ok(row)
    }

    pub fn from_row(row: &Value) -> Result<Self> {
        Ok(serde_json::from_value(row.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_deterministic() {
        let a = Endpoint::new(HttpMethod::Get, "/profile/{user_id}");
        let b = Endpoint::new(HttpMethod::Get, "/profile/{user_id}");
        assert_eq!(a.id, b.id);

        let c = Endpoint::new(HttpMethod::Post, "/profile/{user_id}");
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_path_param_extraction() {
        let ep = Endpoint::new(HttpMethod::Get, "/users/{user_id}/orders/{order_id}");
        let names: Vec<_> = ep.path_params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["user_id", "order_id"]);
    }

    #[test]
    fn test_flag_set_idempotent() {
        let mut ep = Endpoint::new(HttpMethod::Get, "/items/{id}");
        assert!(ep.add_flag(Category::ObjectLevelAuthorization));
        assert!(!ep.add_flag(Category::ObjectLevelAuthorization));
        assert_eq!(ep.flags.len(), 1);
    }

    #[test]
    fn test_resolve_path_defaults() {
        let ep = Endpoint::new(HttpMethod::Get, "/users/{id}");
        let resolved = ep.resolve_path(&HashMap::new());
        assert_eq!(resolved, "/users/1");
    }

    #[test]
    fn test_row_round_trip() {
        let mut ep = Endpoint::new(HttpMethod::Get, "/items/{id}");
        ep.add_flag(Category::ObjectLevelAuthorization);
        let row = ep.to_row(Uuid::new_v4()).unwrap();
        let back = Endpoint::from_row(&row).unwrap();
        assert_eq!(back.id, ep.id);
        assert!(back.has_flag(Category::ObjectLevelAuthorization));
    }

    #[test]
    fn test_url_like_param() {
        let p = Parameter::new("webhook_url", ParamLocation::Query, ParamType::String);
        assert!(p.is_url_like());
        let q = Parameter::new("page", ParamLocation::Query, ParamType::Integer);
        assert!(!q.is_url_like());
    }
}
