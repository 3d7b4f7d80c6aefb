//! # Okapi Headers
//!
//! The `X-Okapi-*` header names the gateway consumes and produces, and the
//! normalization applied to every incoming request: `Authorization: Bearer`
//! is folded into `X-Okapi-Token`, and the tenant is taken from
//! `X-Okapi-Tenant` or recovered from the token payload.

use crate::errors::{OkapiError, Result};
use base64::Engine as _;
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use once_cell::sync::Lazy;
use regex::Regex;

pub static X_OKAPI_TOKEN: HeaderName = HeaderName::from_static("x-okapi-token");
pub static X_OKAPI_TENANT: HeaderName = HeaderName::from_static("x-okapi-tenant");
pub static X_OKAPI_URL: HeaderName = HeaderName::from_static("x-okapi-url");
pub static X_OKAPI_TRACE: HeaderName = HeaderName::from_static("x-okapi-trace");
pub static X_OKAPI_STOP: HeaderName = HeaderName::from_static("x-okapi-stop");
pub static X_OKAPI_PERMISSIONS_REQUIRED: HeaderName =
    HeaderName::from_static("x-okapi-permissions-required");
pub static X_OKAPI_PERMISSIONS_DESIRED: HeaderName =
    HeaderName::from_static("x-okapi-permissions-desired");
pub static X_OKAPI_MODULE_PERMISSIONS: HeaderName =
    HeaderName::from_static("x-okapi-module-permissions");
pub static X_OKAPI_EXTRA_PERMISSIONS: HeaderName =
    HeaderName::from_static("x-okapi-extra-permissions");
pub static X_OKAPI_MODULE_TOKENS: HeaderName = HeaderName::from_static("x-okapi-module-tokens");

static BEARER: Lazy<Regex> = Lazy::new(|| Regex::new(r"Bearer\s+(.+)").expect("static pattern"));

/// Get a header as a string slice, if present and valid UTF-8
pub fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Normalize auth headers and determine the tenant for a request.
///
/// Folds `Authorization: Bearer <t>` into `X-Okapi-Token` (rejecting the
/// request if both are present and differ), then resolves the tenant from
/// `X-Okapi-Tenant` or, failing that, from the token's `tenant` claim. The
/// auth module will verify the tenant against the token later, so a client
/// supplying a bad tenant gains nothing here.
pub fn tenant_header(headers: &mut HeaderMap) -> Result<String> {
    let auth = header_str(headers, &AUTHORIZATION).map(|raw| {
        match BEARER.captures(raw).and_then(|c| c.get(1)) {
            Some(m) => m.as_str().to_string(),
            None => raw.to_string(),
        }
    });
    let token = header_str(headers, &X_OKAPI_TOKEN).map(str::to_string);

    if let (Some(auth), Some(token)) = (&auth, &token) {
        if auth != token {
            return Err(OkapiError::user(
                "Different tokens in Authorization and X-Okapi-Token. Use only one of them",
            ));
        }
    }
    if token.is_none() {
        if let Some(auth) = &auth {
            if let Ok(value) = HeaderValue::from_str(auth) {
                headers.insert(&X_OKAPI_TOKEN, value);
                headers.remove(AUTHORIZATION);
                tracing::debug!("Moved Authorization header to X-Okapi-Token");
            }
        }
    }

    if let Some(tenant_id) = header_str(headers, &X_OKAPI_TENANT) {
        return Ok(tenant_id.to_string());
    }
    let recovered = header_str(headers, &X_OKAPI_TOKEN).and_then(tenant_from_token);
    if let Some(tenant_id) = recovered {
        if let Ok(value) = HeaderValue::from_str(&tenant_id) {
            headers.insert(&X_OKAPI_TENANT, value);
            tracing::debug!(tenant = %tenant_id, "Recovered tenant from token");
            return Ok(tenant_id);
        }
    }
    Err(OkapiError::forbidden("Missing Tenant"))
}

/// Best-effort extraction of the `tenant` claim from a token's middle
/// segment (base64url JSON). A token that does not decode is simply not a
/// source of a tenant; it never fails the request by itself.
pub fn tenant_from_token(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let tenant = claims.get("tenant")?.as_str()?;
    if tenant.is_empty() {
        None
    } else {
        Some(tenant.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(tenant: &str) -> String {
        let claims = serde_json::json!({ "sub": "user", "tenant": tenant });
        let payload =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("header.{}.signature", payload)
    }

    #[test]
    fn test_explicit_tenant_header() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_OKAPI_TENANT, HeaderValue::from_static("t1"));
        assert_eq!(tenant_header(&mut headers).unwrap(), "t1");
    }

    #[test]
    fn test_missing_tenant_is_forbidden() {
        let mut headers = HeaderMap::new();
        let err = tenant_header(&mut headers).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_authorization_is_folded_into_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(&X_OKAPI_TENANT, HeaderValue::from_static("t1"));

        tenant_header(&mut headers).unwrap();
        assert_eq!(header_str(&headers, &X_OKAPI_TOKEN), Some("abc"));
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_conflicting_tokens_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(&X_OKAPI_TOKEN, HeaderValue::from_static("def"));
        headers.insert(&X_OKAPI_TENANT, HeaderValue::from_static("t1"));

        let err = tenant_header(&mut headers).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_matching_tokens_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(&X_OKAPI_TOKEN, HeaderValue::from_static("abc"));
        headers.insert(&X_OKAPI_TENANT, HeaderValue::from_static("t1"));
        assert!(tenant_header(&mut headers).is_ok());
    }

    #[test]
    fn test_tenant_recovered_from_token() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_OKAPI_TOKEN, HeaderValue::from_str(&make_token("t9")).unwrap());

        assert_eq!(tenant_header(&mut headers).unwrap(), "t9");
        assert_eq!(header_str(&headers, &X_OKAPI_TENANT), Some("t9"));
    }

    #[test]
    fn test_undecodable_token_falls_back_to_missing_tenant() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_OKAPI_TOKEN, HeaderValue::from_static("not-a-jwt"));

        let err = tenant_header(&mut headers).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_tenant_from_token_parsing() {
        assert_eq!(tenant_from_token(&make_token("t1")), Some("t1".to_string()));
        assert_eq!(tenant_from_token("only-one-segment"), None);
        assert_eq!(tenant_from_token("a.!!!.c"), None);
        assert_eq!(tenant_from_token(&make_token("")), None);
    }
}
