//! # Proxy Engine
//!
//! Walks the pipeline built for a request, opening one upstream request per
//! hop and relaying bodies and headers according to each hop's proxy type.
//! Between hops the engine carries either a live body stream (an upstream
//! still writing, or the client itself) or a fully buffered body; a
//! REQUEST_ONLY hop forces the switch from stream to buffer. Every upstream
//! exchange appends an `X-Okapi-Trace` entry to the client response.
//!
//! The engine is a sequential async walk: hop `i+1` starts only once hop
//! `i`'s response headers arrived. Client bodies are lazy streams, so
//! nothing is read before the first hop accepts writes, and dropping the
//! request future (client abort) cancels the in-flight upstream exchange.

use crate::domain::ProxyType;
use crate::errors::{OkapiError, Result};
use crate::proxy::headers::{
    header_str, tenant_header, X_OKAPI_MODULE_PERMISSIONS, X_OKAPI_MODULE_TOKENS, X_OKAPI_STOP,
    X_OKAPI_TOKEN, X_OKAPI_TRACE, X_OKAPI_URL,
};
use crate::proxy::pipeline::{build_pipeline, ModuleInstance};
use crate::proxy::plan::{apply_auth_headers, apply_auth_response};
use crate::services::{DiscoveryManager, ModuleCatalog, TenantRegistry};
use axum::body::Body;
use axum::extract::Request;
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use http::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use http::{Method, StatusCode};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type BodyStream = futures::stream::BoxStream<'static, std::result::Result<Bytes, BoxError>>;

/// Trace status reported for a pipeline that ends on a redirect hop; a
/// sentinel with no HTTP meaning, preserved for clients that parse traces.
const REDIRECT_TRACE_STATUS: u16 = 999;

/// The request body as it travels between hops. At most one variant holds
/// data: a live stream while some producer is still writing, or a buffer
/// once a REQUEST_ONLY hop forced materialization.
enum PipeBody {
    Stream(BodyStream),
    Buffer(Bytes),
}

impl PipeBody {
    fn from_client(body: Body) -> Self {
        PipeBody::Stream(body.into_data_stream().map_err(|e| Box::new(e) as BoxError).boxed())
    }

    fn from_upstream(response: reqwest::Response) -> Self {
        PipeBody::Stream(response.bytes_stream().map_err(|e| Box::new(e) as BoxError).boxed())
    }

    async fn into_buffer(self) -> Result<Bytes> {
        match self {
            PipeBody::Buffer(bytes) => Ok(bytes),
            PipeBody::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.try_next().await.map_err(|e| {
                    OkapiError::internal(format!("Failed to read request body: {}", e))
                })? {
                    buf.extend_from_slice(&chunk);
                }
                Ok(buf.freeze())
            }
        }
    }

    fn into_upstream_body(self) -> reqwest::Body {
        match self {
            PipeBody::Stream(stream) => reqwest::Body::wrap_stream(stream),
            PipeBody::Buffer(bytes) => reqwest::Body::from(bytes),
        }
    }

    fn into_response_body(self) -> Body {
        match self {
            PipeBody::Stream(stream) => Body::from_stream(stream),
            PipeBody::Buffer(bytes) => Body::from(bytes),
        }
    }
}

/// What one hop decided: hand a body to the next hop, or terminate the
/// pipeline with this client response.
enum HopOutcome {
    Continue(PipeBody),
    Done(Response),
}

/// Okapi's proxy service. Routes incoming requests through the modules
/// enabled for the request's tenant.
pub struct ProxyService {
    catalog: Arc<ModuleCatalog>,
    tenants: Arc<TenantRegistry>,
    discovery: Arc<DiscoveryManager>,
    client: reqwest::Client,
    okapi_url: String,
}

impl ProxyService {
    pub fn new(
        catalog: Arc<ModuleCatalog>,
        tenants: Arc<TenantRegistry>,
        discovery: Arc<DiscoveryManager>,
        okapi_url: String,
    ) -> Self {
        // Upstream 3xx responses are relayed to the client, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { catalog, tenants, discovery, client, okapi_url }
    }

    /// Proxy one client request through its pipeline
    pub async fn handle(&self, req: Request) -> Response {
        let mut trace: Vec<String> = Vec::new();
        match self.run(req, &mut trace).await {
            Ok(response) => response,
            Err(err) => error_response(&err, &trace),
        }
    }

    async fn run(&self, req: Request, trace: &mut Vec<String>) -> Result<Response> {
        let (mut parts, client_body) = req.into_parts();

        let tenant_id = tenant_header(&mut parts.headers)?;
        let tenant = self
            .tenants
            .get(&tenant_id)
            .ok_or_else(|| OkapiError::user(format!("No such Tenant {}", tenant_id)))?;

        let method = parts.method.clone();
        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        counter!(
            "okapi_proxy_requests_total",
            "tenant" => tenant_id.clone(),
            "method" => method.to_string()
        )
        .increment(1);

        let client_token = header_str(&parts.headers, &X_OKAPI_TOKEN).map(str::to_string);

        let snapshot = self.catalog.snapshot();
        let mut pipeline = build_pipeline(&snapshot, &tenant, method.as_str(), &uri)?;

        if let Ok(value) = HeaderValue::from_str(&self.okapi_url) {
            parts.headers.insert(&X_OKAPI_URL, value);
        }
        apply_auth_headers(&mut pipeline, &mut parts.headers, client_token.as_deref());
        self.resolve_urls(&mut pipeline)?;

        let mut headers = parts.headers;
        let mut body = PipeBody::from_client(client_body);
        let hop_count = pipeline.len();

        for i in 0..hop_count {
            let last = i + 1 == hop_count;

            // Each hop sees its own token, or none
            headers.remove(&X_OKAPI_TOKEN);
            if let Some(token) = pipeline[i].auth_token.clone().filter(|t| !t.is_empty()) {
                if let Ok(value) = HeaderValue::from_str(&token) {
                    headers.insert(&X_OKAPI_TOKEN, value);
                }
            }

            let proxy_type = pipeline[i].entry.proxy_type;
            if proxy_type != ProxyType::Redirect {
                debug!(
                    module = %pipeline[i].module.name_or_id(),
                    proxy_type = ?proxy_type,
                    level = %pipeline[i].entry.phase_level(),
                    uri = %pipeline[i].uri,
                    url = pipeline[i].url.as_deref().unwrap_or(""),
                    "Invoking module"
                );
            }

            let outcome = match proxy_type {
                ProxyType::RequestResponse => {
                    self.hop_request_response(
                        &mut pipeline, i, last, &method, &mut headers, body, trace, &tenant_id,
                    )
                    .await?
                }
                ProxyType::RequestOnly => {
                    self.hop_request_only(
                        &mut pipeline, i, last, &method, &mut headers, body, trace, &tenant_id,
                    )
                    .await?
                }
                ProxyType::Headers => {
                    self.hop_headers(
                        &mut pipeline, i, last, &method, &mut headers, body, trace, &tenant_id,
                    )
                    .await?
                }
                ProxyType::Redirect => hop_redirect(&pipeline[i], last, &method, body, trace),
            };

            match outcome {
                HopOutcome::Continue(next_body) => body = next_body,
                HopOutcome::Done(response) => return Ok(response),
            }
        }
        // Unreachable: the builder guarantees a non-empty pipeline and every
        // last-hop branch terminates
        Err(OkapiError::internal("Pipeline ended without a terminal hop"))
    }

    /// Resolve each hop's upstream URL from discovery; first record wins
    fn resolve_urls(&self, pipeline: &mut [ModuleInstance]) -> Result<()> {
        for hop in pipeline.iter_mut() {
            let url = self.discovery.resolve(&hop.module.id).ok_or_else(|| {
                OkapiError::not_found(format!(
                    "No running module instance found for {}",
                    hop.module.name_or_id()
                ))
            })?;
            hop.url = Some(url);
        }
        Ok(())
    }

    async fn send_upstream(
        &self,
        method: &Method,
        url: &str,
        base_url: &str,
        headers: &HeaderMap,
        body: Option<reqwest::Body>,
    ) -> Result<reqwest::Response> {
        let mut upstream_headers = headers.clone();
        sanitize_hop_headers(&mut upstream_headers);

        let mut request = self.client.request(method.clone(), url).headers(upstream_headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        request.send().await.map_err(|e| {
            debug!(url = %base_url, error = %e, "Upstream connect failure");
            OkapiError::internal(format!("connect url {}: {}", base_url, e))
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn hop_request_response(
        &self,
        pipeline: &mut [ModuleInstance],
        i: usize,
        last: bool,
        method: &Method,
        headers: &mut HeaderMap,
        body: PipeBody,
        trace: &mut Vec<String>,
        tenant_id: &str,
    ) -> Result<HopOutcome> {
        let (url, base_url, name, module_id) = hop_target(&pipeline[i]);
        let timer = Instant::now();
        let response = self
            .send_upstream(method, &url, &base_url, headers, Some(body.into_upstream_body()))
            .await?;
        record_module_timer(tenant_id, &module_id, &timer);

        let status = response.status();
        push_trace(trace, method, &name, &url, status.as_u16(), &timer);
        if status.is_success() && response.headers().get(&X_OKAPI_STOP).is_none() && !last {
            relay_to_request(response.headers(), pipeline, headers);
            Ok(HopOutcome::Continue(PipeBody::from_upstream(response)))
        } else {
            Ok(HopOutcome::Done(relay_to_response(response, trace)))
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn hop_request_only(
        &self,
        pipeline: &mut [ModuleInstance],
        i: usize,
        last: bool,
        method: &Method,
        headers: &mut HeaderMap,
        body: PipeBody,
        trace: &mut Vec<String>,
        tenant_id: &str,
    ) -> Result<HopOutcome> {
        let (url, base_url, name, module_id) = hop_target(&pipeline[i]);

        // The original body must survive this hop, so materialize it now;
        // the pipeline stays in buffer mode from here on
        let buffer = body.into_buffer().await?;

        let timer = Instant::now();
        let response = self
            .send_upstream(method, &url, &base_url, headers, Some(buffer.clone().into()))
            .await?;
        record_module_timer(tenant_id, &module_id, &timer);

        let status = response.status();
        push_trace(trace, method, &name, &url, status.as_u16(), &timer);
        if !status.is_success() {
            return Ok(HopOutcome::Done(relay_to_response(response, trace)));
        }
        if last {
            // Terminal: the upstream's status and headers, the buffered
            // request body echoed back
            let mut client_response = relay_headers(status, response.headers(), trace);
            *client_response.body_mut() = Body::from(buffer);
            return Ok(HopOutcome::Done(client_response));
        }
        relay_to_request(response.headers(), pipeline, headers);
        Ok(HopOutcome::Continue(PipeBody::Buffer(buffer)))
    }

    #[allow(clippy::too_many_arguments)]
    async fn hop_headers(
        &self,
        pipeline: &mut [ModuleInstance],
        i: usize,
        last: bool,
        method: &Method,
        headers: &mut HeaderMap,
        body: PipeBody,
        trace: &mut Vec<String>,
        tenant_id: &str,
    ) -> Result<HopOutcome> {
        let (url, base_url, name, module_id) = hop_target(&pipeline[i]);
        let timer = Instant::now();
        // Headers only: no body, no Content-Length
        let response = self.send_upstream(method, &url, &base_url, headers, None).await?;
        record_module_timer(tenant_id, &module_id, &timer);

        let status = response.status();
        push_trace(trace, method, &name, &url, status.as_u16(), &timer);
        if !status.is_success() {
            return Ok(HopOutcome::Done(relay_to_response(response, trace)));
        }
        if last {
            // Stream the untouched client body through the response
            let mut client_response = relay_headers(status, response.headers(), trace);
            *client_response.body_mut() = body.into_response_body();
            return Ok(HopOutcome::Done(client_response));
        }
        relay_to_request(response.headers(), pipeline, headers);
        Ok(HopOutcome::Continue(body))
    }
}

/// A redirect hop contributed its permissions at planning time and makes no
/// upstream call; it just advances, or terminates the pipeline when last.
fn hop_redirect(
    hop: &ModuleInstance,
    last: bool,
    method: &Method,
    body: PipeBody,
    trace: &mut Vec<String>,
) -> HopOutcome {
    if !last {
        return HopOutcome::Continue(body);
    }
    let (url, _, name, _) = hop_target(hop);
    push_trace(trace, method, &name, &url, REDIRECT_TRACE_STATUS, &Instant::now());
    let mut response = Response::new(body.into_response_body());
    add_trace_headers(response.headers_mut(), trace);
    HopOutcome::Done(response)
}

fn hop_target(hop: &ModuleInstance) -> (String, String, String, String) {
    let base_url = hop.url.clone().unwrap_or_default();
    let url = format!("{}{}", base_url, hop.uri);
    (url, base_url, hop.module.name_or_id().to_string(), hop.module.id.clone())
}

/// Merge an upstream response into the ongoing request: module tokens go to
/// the planner (and are stripped so no later module sees them), and every
/// `X-`/`x-` header is folded into the forwarded request headers.
fn relay_to_request(
    response_headers: &HeaderMap,
    pipeline: &mut [ModuleInstance],
    request_headers: &mut HeaderMap,
) {
    let module_tokens = response_headers
        .get(&X_OKAPI_MODULE_TOKENS)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Some(tokens) = &module_tokens {
        apply_auth_response(pipeline, tokens);
    }
    for (header_name, value) in response_headers.iter() {
        if !header_name.as_str().starts_with("x-") {
            continue;
        }
        if module_tokens.is_some()
            && (header_name == &X_OKAPI_MODULE_TOKENS || header_name == &X_OKAPI_MODULE_PERMISSIONS)
        {
            continue;
        }
        request_headers.insert(header_name.clone(), value.clone());
    }
}

/// Build a client response with the given status and upstream headers, plus
/// all trace entries; the caller supplies the body.
fn relay_headers(status: StatusCode, upstream_headers: &HeaderMap, trace: &[String]) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (header_name, value) in upstream_headers.iter() {
        if *header_name == CONTENT_LENGTH
            || *header_name == TRANSFER_ENCODING
            || *header_name == CONNECTION
        {
            continue;
        }
        headers.append(header_name.clone(), value.clone());
    }
    add_trace_headers(headers, trace);
    response
}

/// Terminal relay: upstream status, headers and streamed body
fn relay_to_response(upstream: reqwest::Response, trace: &[String]) -> Response {
    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let mut response = relay_headers(status, &upstream_headers, trace);
    *response.body_mut() = Body::from_stream(
        upstream.bytes_stream().map_err(|e| Box::new(e) as BoxError),
    );
    response
}

fn error_response(err: &OkapiError, trace: &[String]) -> Response {
    let status = StatusCode::from_u16(err.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(err.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    add_trace_headers(response.headers_mut(), trace);
    response
}

fn add_trace_headers(headers: &mut HeaderMap, trace: &[String]) {
    for entry in trace {
        if let Ok(value) = HeaderValue::from_str(entry) {
            headers.append(&X_OKAPI_TRACE, value);
        }
    }
}

fn push_trace(trace: &mut Vec<String>, method: &Method, name: &str, url: &str, status: u16, timer: &Instant) {
    let url = url.split(['?', '#']).next().unwrap_or(url);
    trace.push(format!(
        "{} {} {} : {} {}us",
        method,
        name,
        url,
        status,
        timer.elapsed().as_micros()
    ));
}

fn record_module_timer(tenant_id: &str, module_id: &str, timer: &Instant) {
    histogram!(
        "okapi_module_request_duration_seconds",
        "tenant" => tenant_id.to_string(),
        "module" => module_id.to_string()
    )
    .record(timer.elapsed().as_secs_f64());
}

/// Headers the engine owns per hop: the upstream connection is the
/// client's business, and the body length is determined by the pipe mode.
fn sanitize_hop_headers(headers: &mut HeaderMap) {
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONNECTION);
}
