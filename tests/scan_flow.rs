//! End-to-end scan flows against a mocked target API.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use apisentry::models::{ParamLocation, ParamType};
use apisentry::{
    risk_score, ApiClient, Category, Endpoint, HttpMethod, MemoryStore, Parameter,
    ScanOrchestrator, ScanStatus, Severity, Store, Table,
};

async fn save_api(store: &MemoryStore, api: &ApiClient) {
    api.save(store).await.expect("save api");
}

#[tokio::test]
async fn test_bola_flow_produces_one_high_finding() {
    let server = MockServer::start().await;

    // Same object, two identities, different payloads.
    Mock::given(method("GET"))
        .and(path("/profile/1"))
        .and(header("Authorization", "Bearer token-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "alice", "email": "alice@example.com"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile/1"))
        .and(header("Authorization", "Bearer token-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "alice", "email": "alice@example.com", "viewer": "bob"
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut api = ApiClient::new("Profiles", server.uri());
    api.set_tokens(Some("token-a".to_string()), Some("token-b".to_string()));
    api.add_endpoint(Endpoint::new(HttpMethod::Get, "/profile/{user_id}"));
    let api_id = api.id;
    save_api(&store, &api).await;

    let orchestrator = ScanOrchestrator::new(store.clone());
    let scan = orchestrator.create_scan(api_id, "u1").await.unwrap();
    let done = orchestrator.execute(scan.id).await.unwrap();
    assert_eq!(done.status, ScanStatus::Completed);

    // Classification annotated the endpoint row.
    let rows = store
        .select(Table::Endpoints, json!({ "api_id": api_id }))
        .await
        .unwrap();
    let flagged = Endpoint::from_row(&rows[0]).unwrap();
    assert!(flagged.has_flag(Category::ObjectLevelAuthorization));

    let details = orchestrator.get_details(scan.id).await.unwrap();
    assert_eq!(details.findings.len(), 1);
    let finding = &details.findings[0];
    assert_eq!(finding.category, Category::ObjectLevelAuthorization);
    assert!(finding.severity >= Severity::High);
    assert_eq!(finding.affected_params, vec!["user_id"]);

    assert!(risk_score(&details.findings) < 100);
}

#[tokio::test]
async fn test_repeated_scans_yield_the_same_categories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut api = ApiClient::new("Profiles", server.uri());
    api.set_tokens(Some("token-a".to_string()), Some("token-b".to_string()));
    api.add_endpoint(Endpoint::new(HttpMethod::Get, "/profile/{user_id}"));
    let api_id = api.id;
    save_api(&store, &api).await;

    let orchestrator = ScanOrchestrator::new(store.clone());

    let mut category_sets = Vec::new();
    for _ in 0..2 {
        let scan = orchestrator.create_scan(api_id, "u1").await.unwrap();
        orchestrator.execute(scan.id).await.unwrap();
        let details = orchestrator.get_details(scan.id).await.unwrap();
        let mut categories: Vec<Category> =
            details.findings.iter().map(|f| f.category).collect();
        categories.sort();
        category_sets.push(categories);
    }
    assert_eq!(category_sets[0], category_sets[1]);
}

#[tokio::test]
async fn test_unauthenticated_mutation_detected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut api = ApiClient::new("Catalog", server.uri());
    api.set_tokens(Some("token-a".to_string()), Some("token-b".to_string()));
    // No declared security on a state-changing verb.
    api.add_endpoint(Endpoint::new(HttpMethod::Post, "/items"));
    let api_id = api.id;
    save_api(&store, &api).await;

    let orchestrator = ScanOrchestrator::new(store.clone());
    let scan = orchestrator.create_scan(api_id, "u1").await.unwrap();
    orchestrator.execute(scan.id).await.unwrap();

    let details = orchestrator.get_details(scan.id).await.unwrap();
    let auth_finding = details
        .findings
        .iter()
        .find(|f| f.category == Category::BrokenAuthentication)
        .expect("broken-authentication finding");
    assert_eq!(auth_finding.severity, Severity::High);
}

#[tokio::test]
async fn test_ssrf_internal_target_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "queued" })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut api = ApiClient::new("Hooks", server.uri());
    api.set_tokens(Some("token-a".to_string()), None);

    let mut endpoint = Endpoint::new(HttpMethod::Post, "/webhook");
    endpoint.enable_auth();
    endpoint.request_schema = Some(json!({ "properties": { "callback_url": {} } }));
    let mut param = Parameter::new("callback_url", ParamLocation::Body, ParamType::String);
    param.has_bounds = true;
    endpoint.parameters.push(param);
    api.add_endpoint(endpoint);
    let api_id = api.id;
    save_api(&store, &api).await;

    let orchestrator = ScanOrchestrator::new(store.clone());
    let scan = orchestrator.create_scan(api_id, "u1").await.unwrap();
    orchestrator.execute(scan.id).await.unwrap();

    let details = orchestrator.get_details(scan.id).await.unwrap();
    let ssrf = details
        .findings
        .iter()
        .find(|f| f.category == Category::ServerSideRequestForgery)
        .expect("ssrf finding");
    assert!(ssrf.severity >= Severity::High);
    assert_eq!(ssrf.affected_params, vec!["callback_url"]);
}

#[tokio::test]
async fn test_undeclared_response_properties_detected() {
    let server = MockServer::start().await;
    // The request schema declares a single property; the live response
    // carries two more, one of them PII-shaped.
    Mock::given(method("POST"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "amount": 100, "note": "x", "owner_ssn": "123-45-6789"
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut api = ApiClient::new("Billing", server.uri());
    api.set_tokens(Some("token-a".to_string()), None);

    let mut endpoint = Endpoint::new(HttpMethod::Post, "/invoices");
    endpoint.enable_auth();
    endpoint.request_schema = Some(json!({ "properties": { "amount": {} } }));
    endpoint.response_schema = Some(json!({
        "200": {
            "properties": {
                "amount": {}, "owner_ssn": {}, "internal_margin": {}, "approver": {}
            }
        },
        "400": {}
    }));
    api.add_endpoint(endpoint);
    let api_id = api.id;
    save_api(&store, &api).await;

    let orchestrator = ScanOrchestrator::new(store.clone());
    let scan = orchestrator.create_scan(api_id, "u1").await.unwrap();
    orchestrator.execute(scan.id).await.unwrap();

    let details = orchestrator.get_details(scan.id).await.unwrap();
    assert_eq!(details.findings.len(), 1);
    let finding = &details.findings[0];
    assert_eq!(finding.category, Category::PropertyLevelAuthorization);
    assert_eq!(finding.severity, Severity::Medium);
    assert_eq!(finding.affected_params, vec!["note", "owner_ssn"]);
}

#[tokio::test]
async fn test_failing_probe_does_not_block_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut api = ApiClient::new("Catalog", server.uri());
    // No secondary credential: the cross-identity probe errors out.
    api.set_tokens(Some("token-a".to_string()), None);
    api.add_endpoint(Endpoint::new(HttpMethod::Get, "/profile/{user_id}"));
    api.add_endpoint(Endpoint::new(HttpMethod::Post, "/items"));
    let api_id = api.id;
    save_api(&store, &api).await;

    let orchestrator = ScanOrchestrator::new(store.clone());
    let scan = orchestrator.create_scan(api_id, "u1").await.unwrap();
    let done = orchestrator.execute(scan.id).await.unwrap();
    assert_eq!(done.status, ScanStatus::Completed);

    // The sibling probe still reported; the failed one yielded nothing.
    let details = orchestrator.get_details(scan.id).await.unwrap();
    assert!(details
        .findings
        .iter()
        .any(|f| f.category == Category::BrokenAuthentication));
    assert!(details
        .findings
        .iter()
        .all(|f| f.category != Category::ObjectLevelAuthorization));

    // The failed probe bailed before sending any traffic.
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    assert!(requests.iter().all(|r| r.url.path() == "/items"));
}

#[tokio::test]
async fn test_skip_marked_endpoint_is_never_probed() {
    let server = MockServer::start().await;
    // No mocks mounted: any request would come back 404, but none should go out.

    let store = Arc::new(MemoryStore::new());
    let mut api = ApiClient::new("Profiles", server.uri());
    api.set_tokens(Some("token-a".to_string()), Some("token-b".to_string()));
    let mut endpoint = Endpoint::new(HttpMethod::Get, "/profile/{user_id}");
    endpoint.skip = true;
    api.add_endpoint(endpoint);
    let api_id = api.id;
    save_api(&store, &api).await;

    let orchestrator = ScanOrchestrator::new(store.clone());
    let scan = orchestrator.create_scan(api_id, "u1").await.unwrap();
    let done = orchestrator.execute(scan.id).await.unwrap();
    assert_eq!(done.status, ScanStatus::Completed);

    let details = orchestrator.get_details(scan.id).await.unwrap();
    assert!(details.findings.is_empty());

    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}
