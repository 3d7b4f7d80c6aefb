//! End-to-end pipeline scenarios: the proxy engine driven against wiremock
//! upstreams standing in for modules.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use okapi::domain::{DeploymentDescriptor, ModuleDescriptor, Tenant};
use okapi::proxy::ProxyService;
use okapi::services::{DiscoveryManager, ModuleCatalog, TenantRegistry};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "t1";

struct Gateway {
    catalog: Arc<ModuleCatalog>,
    tenants: Arc<TenantRegistry>,
    discovery: Arc<DiscoveryManager>,
    proxy: ProxyService,
}

impl Gateway {
    fn new() -> Self {
        let catalog = Arc::new(ModuleCatalog::new());
        let tenants = Arc::new(TenantRegistry::new());
        let discovery = Arc::new(DiscoveryManager::new());
        tenants.insert(Tenant::new(TENANT)).unwrap();
        let proxy = ProxyService::new(
            catalog.clone(),
            tenants.clone(),
            discovery.clone(),
            "http://okapi.test".to_string(),
        );
        Self { catalog, tenants, discovery, proxy }
    }

    fn add_module(&self, descriptor: serde_json::Value) {
        let md: ModuleDescriptor = serde_json::from_value(descriptor).unwrap();
        md.validate().unwrap();
        let id = md.id.clone();
        self.catalog.insert(md).unwrap();
        self.tenants.enable_module(TENANT, &id).unwrap();
    }

    fn deploy(&self, module_id: &str, url: &str) {
        self.discovery
            .add(DeploymentDescriptor {
                srvc_id: module_id.to_string(),
                url: Some(url.to_string()),
                ..Default::default()
            })
            .unwrap();
    }

    async fn send(&self, request: Request) -> Response {
        self.proxy.handle(request).await
    }
}

fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: &str) -> Request {
    let mut builder = http::Request::builder().method(method).uri(uri);
    builder = builder.header("x-okapi-tenant", TENANT);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn trace_entries(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all("x-okapi-trace")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Matches only requests that do NOT carry the given header
struct HeaderAbsent(&'static str);

impl wiremock::Match for HeaderAbsent {
    fn matches(&self, request: &wiremock::Request) -> bool {
        !request.headers.contains_key(self.0)
    }
}

#[tokio::test]
async fn minimal_proxy_pipeline() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(body_string("hi"))
        .and(header("x-okapi-tenant", TENANT))
        .and(header("x-okapi-url", "http://okapi.test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("echo reply"))
        .expect(1)
        .mount(&upstream)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-echo",
        "provides": [{"id": "echo", "handlers": [{"path": "/echo", "methods": ["POST"]}]}]
    }));
    gw.deploy("m-echo", &upstream.uri());

    let response = gw.send(request("POST", "/echo", &[], "hi")).await;
    assert_eq!(response.status(), 200);

    let trace = trace_entries(&response);
    assert_eq!(trace.len(), 1);
    assert!(
        trace[0].starts_with(&format!("POST m-echo {}/echo : 200 ", upstream.uri())),
        "unexpected trace: {}",
        trace[0]
    );
    assert!(trace[0].ends_with("us"));

    assert_eq!(body_text(response).await, "echo reply");
}

#[tokio::test]
async fn filter_chain_rewrites_per_hop_tokens() {
    let auth = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header("x-okapi-token", "CLIENT"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("X-Okapi-Module-Tokens", r#"{"m-echo": "TOK"}"#),
        )
        .expect(1)
        .mount(&auth)
        .await;

    let echo = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header("x-okapi-token", "TOK"))
        .and(HeaderAbsent("x-okapi-module-tokens"))
        .and(body_string("hi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&echo)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "auth",
        "filters": [{"path": "/", "type": "HEADERS", "level": "10"}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-echo",
        "provides": [{"id": "echo", "handlers": [{"path": "/echo", "level": "50"}]}]
    }));
    gw.deploy("auth", &auth.uri());
    gw.deploy("m-echo", &echo.uri());

    let response =
        gw.send(request("POST", "/echo", &[("x-okapi-token", "CLIENT")], "hi")).await;
    assert_eq!(response.status(), 200);

    let trace = trace_entries(&response);
    assert_eq!(trace.len(), 2);
    assert!(trace[0].contains("auth"), "first trace should be auth: {}", trace[0]);
    assert!(trace[1].contains("m-echo"), "second trace should be m-echo: {}", trace[1]);

    assert_eq!(body_text(response).await, "done");
}

#[tokio::test]
async fn redirect_invokes_target_with_rewritten_uri() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("redirected"))
        .expect(1)
        .mount(&target)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-a",
        "provides": [{"id": "old", "handlers": [
            {"path": "/old", "type": "REDIRECT", "redirectPath": "/new"}
        ]}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-b",
        "provides": [{"id": "new", "handlers": [{"path": "/new"}]}]
    }));
    gw.deploy("m-a", "http://never-called.invalid");
    gw.deploy("m-b", &target.uri());

    let response = gw.send(request("GET", "/old", &[], "")).await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_text(response).await, "redirected");
}

#[tokio::test]
async fn redirect_trace_lists_only_the_target() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-a",
        "provides": [{"id": "old", "handlers": [
            {"path": "/old", "type": "REDIRECT", "redirectPath": "/new", "level": "20"}
        ]}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-b",
        "provides": [{"id": "new", "handlers": [{"path": "/new"}]}]
    }));
    gw.deploy("m-a", "http://never-called.invalid");
    gw.deploy("m-b", &target.uri());

    let response = gw.send(request("GET", "/old", &[], "")).await;
    let trace = trace_entries(&response);
    assert_eq!(trace.len(), 1);
    assert!(trace[0].contains("m-b"), "redirect must not add its own trace: {:?}", trace);
}

#[tokio::test]
async fn redirect_loop_is_rejected_before_any_upstream_call() {
    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-a",
        "provides": [{"id": "x", "handlers": [
            {"path": "/x", "type": "REDIRECT", "redirectPath": "/y"}
        ]}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-b",
        "provides": [{"id": "y", "handlers": [
            {"path": "/y", "type": "REDIRECT", "redirectPath": "/x"}
        ]}]
    }));

    let response = gw.send(request("GET", "/x", &[], "")).await;
    assert_eq!(response.status(), 500);
    assert!(body_text(response).await.contains("Redirect loop"));
}

#[tokio::test]
async fn missing_deployment_is_404_without_upstream_calls() {
    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-ghost",
        "provides": [{"id": "ghost", "handlers": [{"path": "/ghost"}]}]
    }));

    let response = gw.send(request("GET", "/ghost", &[], "")).await;
    assert_eq!(response.status(), 404);
    assert_eq!(
        body_text(response).await,
        "No running module instance found for m-ghost"
    );
}

#[tokio::test]
async fn request_only_hop_forwards_original_body() {
    let log = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/x"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("log says ignore me"))
        .expect(1)
        .mount(&log)
        .await;

    let handler = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/x"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("handled"))
        .expect(1)
        .mount(&handler)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-log",
        "filters": [{"path": "/x", "type": "REQUEST_ONLY", "level": "40"}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-handler",
        "provides": [{"id": "x", "handlers": [{"path": "/x", "level": "50"}]}]
    }));
    gw.deploy("m-log", &log.uri());
    gw.deploy("m-handler", &handler.uri());

    let response = gw.send(request("POST", "/x", &[], "payload")).await;
    assert_eq!(response.status(), 200);
    // The second hop saw the original body, not the first hop's response
    assert_eq!(body_text(response).await, "handled");
}

#[tokio::test]
async fn headers_hop_sends_no_body() {
    /// Accepts only an empty body that does not carry the client's length
    struct EmptyBody;
    impl wiremock::Match for EmptyBody {
        fn matches(&self, request: &wiremock::Request) -> bool {
            let content_length = request
                .headers
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("0");
            request.body.is_empty() && content_length == "0"
        }
    }

    let auth = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .and(EmptyBody)
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&auth)
        .await;

    let handler = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .and(body_string("12345"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .expect(1)
        .mount(&handler)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "auth",
        "filters": [{"path": "/", "type": "HEADERS", "level": "10"}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-handler",
        "provides": [{"id": "data", "handlers": [{"path": "/data", "level": "50"}]}]
    }));
    gw.deploy("auth", &auth.uri());
    gw.deploy("m-handler", &handler.uri());

    let response =
        gw.send(request("POST", "/data", &[("content-length", "5")], "12345")).await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_text(response).await, "stored");
}

#[tokio::test]
async fn stop_header_terminates_the_pipeline() {
    let first = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Okapi-Stop", "1")
                .set_body_string("stopped here"),
        )
        .expect(1)
        .mount(&first)
        .await;

    let second = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&second)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-first",
        "provides": [{"id": "x", "handlers": [{"path": "/x", "level": "30"}]}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-second",
        "provides": [{"id": "x", "handlers": [{"path": "/x", "level": "50"}]}]
    }));
    gw.deploy("m-first", &first.uri());
    gw.deploy("m-second", &second.uri());

    let response = gw.send(request("GET", "/x", &[], "")).await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_text(response).await, "stopped here");
}

#[tokio::test]
async fn request_response_chaining_pipes_response_into_next_hop() {
    let transformer = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/work"))
        .and(body_string("input"))
        .respond_with(ResponseTemplate::new(200).set_body_string("transformed"))
        .expect(1)
        .mount(&transformer)
        .await;

    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/work"))
        .and(body_string("transformed"))
        .respond_with(ResponseTemplate::new(201).set_body_string("stored"))
        .expect(1)
        .mount(&sink)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-transform",
        "provides": [{"id": "work", "handlers": [{"path": "/work", "level": "40"}]}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-sink",
        "provides": [{"id": "work", "handlers": [{"path": "/work", "level": "50"}]}]
    }));
    gw.deploy("m-transform", &transformer.uri());
    gw.deploy("m-sink", &sink.uri());

    let response = gw.send(request("POST", "/work", &[], "input")).await;
    assert_eq!(response.status(), 201);
    assert_eq!(body_text(response).await, "stored");
}

#[tokio::test]
async fn upstream_error_status_is_relayed_with_trace() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/echo"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad unit"))
        .mount(&upstream)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-echo",
        "provides": [{"id": "echo", "handlers": [{"path": "/echo"}]}]
    }));
    gw.deploy("m-echo", &upstream.uri());

    let response = gw.send(request("GET", "/echo", &[], "")).await;
    assert_eq!(response.status(), 422);
    let trace = trace_entries(&response);
    assert_eq!(trace.len(), 1);
    assert!(trace[0].contains(" : 422 "));
    assert_eq!(body_text(response).await, "bad unit");
}

#[tokio::test]
async fn connect_failure_is_500_with_message() {
    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-down",
        "provides": [{"id": "down", "handlers": [{"path": "/down"}]}]
    }));
    // Nothing listens on this port
    gw.deploy("m-down", "http://127.0.0.1:9");

    let response = gw.send(request("GET", "/down", &[], "")).await;
    assert_eq!(response.status(), 500);
    assert!(body_text(response).await.starts_with("connect url http://127.0.0.1:9"));
}

#[tokio::test]
async fn missing_tenant_is_403() {
    let gw = Gateway::new();
    let req = http::Request::builder()
        .method("GET")
        .uri("/echo")
        .body(Body::empty())
        .unwrap();

    let response = gw.send(req).await;
    assert_eq!(response.status(), 403);
    assert_eq!(body_text(response).await, "Missing Tenant");
}

#[tokio::test]
async fn unknown_tenant_is_400() {
    let gw = Gateway::new();
    let req = http::Request::builder()
        .method("GET")
        .uri("/echo")
        .header("x-okapi-tenant", "t-unknown")
        .body(Body::empty())
        .unwrap();

    let response = gw.send(req).await;
    assert_eq!(response.status(), 400);
    assert_eq!(body_text(response).await, "No such Tenant t-unknown");
}

#[tokio::test]
async fn conflicting_tokens_are_400() {
    let gw = Gateway::new();
    let req = http::Request::builder()
        .method("GET")
        .uri("/echo")
        .header("authorization", "Bearer one")
        .header("x-okapi-token", "two")
        .body(Body::empty())
        .unwrap();

    let response = gw.send(req).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn permission_plan_headers_reach_the_first_hop() {
    let auth = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books"))
        .and(header("x-okapi-permissions-required", "books.read"))
        .and(header("x-okapi-module-permissions", r#"{"m-books":["books.all"]}"#))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&auth)
        .await;

    let books = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/books"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&books)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "auth",
        "filters": [{"path": "/", "type": "HEADERS", "level": "10"}]
    }));
    gw.add_module(serde_json::json!({
        "id": "m-books",
        "provides": [{"id": "books", "handlers": [
            {
                "path": "/books",
                "level": "50",
                "permissionsRequired": ["books.read"],
                "modulePermissions": ["books.all"]
            }
        ]}]
    }));
    gw.deploy("auth", &auth.uri());
    gw.deploy("m-books", &books.uri());

    let response = gw.send(request("GET", "/books", &[], "")).await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn terminal_request_only_echoes_buffered_body() {
    let sink = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .and(body_string("data"))
        .respond_with(ResponseTemplate::new(201).insert_header("X-Ingest-Id", "7"))
        .expect(1)
        .mount(&sink)
        .await;

    let gw = Gateway::new();
    gw.add_module(serde_json::json!({
        "id": "m-sink",
        "provides": [{"id": "ingest", "handlers": [
            {"path": "/ingest", "type": "REQUEST_ONLY"}
        ]}]
    }));
    gw.deploy("m-sink", &sink.uri());

    let response = gw.send(request("POST", "/ingest", &[], "data")).await;
    assert_eq!(response.status(), 201);
    assert_eq!(response.headers().get("x-ingest-id").unwrap(), "7");
    assert_eq!(body_text(response).await, "data");
}
