//! # Auth Header Planning
//!
//! Before the first hop, the permission demands of the whole pipeline are
//! folded into headers for the auth module: required and desired permission
//! unions, the per-module permission map, and the extra permissions
//! accumulated from redirect hops. After the auth hop, the module-token map
//! from its response rewrites each hop's token.

use crate::domain::ProxyType;
use crate::proxy::headers::{
    X_OKAPI_EXTRA_PERMISSIONS, X_OKAPI_MODULE_PERMISSIONS, X_OKAPI_MODULE_TOKENS,
    X_OKAPI_PERMISSIONS_DESIRED, X_OKAPI_PERMISSIONS_REQUIRED,
};
use crate::proxy::pipeline::ModuleInstance;
use http::header::{HeaderMap, HeaderValue};
use std::collections::{BTreeMap, BTreeSet};

/// Synthesize the permission headers for a pipeline and give every hop the
/// client's token as its default.
///
/// The module-permissions header is set even when empty: its presence tells
/// the auth module that the permission plan has been sanctioned here, so no
/// module can smuggle one in.
pub fn apply_auth_headers(
    pipeline: &mut [ModuleInstance],
    headers: &mut HeaderMap,
    default_token: Option<&str>,
) {
    // Sanitize the planning headers from the incoming request
    headers.remove(&X_OKAPI_PERMISSIONS_REQUIRED);
    headers.remove(&X_OKAPI_PERMISSIONS_DESIRED);
    headers.remove(&X_OKAPI_MODULE_PERMISSIONS);
    headers.remove(&X_OKAPI_EXTRA_PERMISSIONS);
    headers.remove(&X_OKAPI_MODULE_TOKENS);

    let mut required: BTreeSet<String> = BTreeSet::new();
    let mut desired: BTreeSet<String> = BTreeSet::new();
    let mut extra: BTreeSet<String> = BTreeSet::new();
    let mut module_perms: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for hop in pipeline.iter_mut() {
        required.extend(hop.entry.permissions_required.iter().cloned());
        desired.extend(hop.entry.permissions_desired.iter().cloned());

        // A redirect hop makes no upstream call of its own, so its module
        // permissions go into the extra set instead of the per-module map
        if !hop.entry.module_permissions.is_empty() {
            if hop.entry.proxy_type == ProxyType::Redirect {
                extra.extend(hop.entry.module_permissions.iter().cloned());
            } else {
                module_perms
                    .insert(hop.module.id.clone(), hop.entry.module_permissions.clone());
            }
        }
        // Deprecated module-wide permissions, same routing
        if !hop.module.module_permissions.is_empty() {
            if hop.entry.proxy_type == ProxyType::Redirect {
                extra.extend(hop.module.module_permissions.iter().cloned());
            } else {
                module_perms.insert(hop.module.id.clone(), hop.module.module_permissions.clone());
            }
        }

        hop.auth_token = default_token.map(str::to_string);
    }

    if !required.is_empty() {
        set_header(headers, &X_OKAPI_PERMISSIONS_REQUIRED, &join(&required));
    }
    if !desired.is_empty() {
        set_header(headers, &X_OKAPI_PERMISSIONS_DESIRED, &join(&desired));
    }
    if let Ok(json) = serde_json::to_string(&module_perms) {
        set_header(headers, &X_OKAPI_MODULE_PERMISSIONS, &json);
    }
    if !extra.is_empty() {
        if let Ok(json) = serde_json::to_string(&extra) {
            set_header(headers, &X_OKAPI_EXTRA_PERMISSIONS, &json);
        }
    }
}

/// Interpret the auth module's `X-Okapi-Module-Tokens` response header: a
/// JSON object mapping module ids to tokens, `"_"` as the default. Hops
/// named in the map get their dedicated token; the rest fall back to the
/// default entry when present.
pub fn apply_auth_response(pipeline: &mut [ModuleInstance], module_tokens: &str) {
    let Ok(tokens) = serde_json::from_str::<BTreeMap<String, String>>(module_tokens) else {
        tracing::warn!("Ignoring unparseable X-Okapi-Module-Tokens header");
        return;
    };
    for hop in pipeline.iter_mut() {
        if let Some(token) = tokens.get(&hop.module.id).or_else(|| tokens.get("_")) {
            hop.auth_token = Some(token.clone());
            tracing::debug!(module = %hop.module.id, "Assigned module token");
        }
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(",")
}

fn set_header(headers: &mut HeaderMap, name: &http::header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => {
            tracing::warn!(header = %name, "Dropping header with invalid value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModuleDescriptor, RoutingEntry};
    use crate::proxy::headers::header_str;
    use std::sync::Arc;

    fn hop(module_id: &str, entry: serde_json::Value) -> ModuleInstance {
        let entry: RoutingEntry = serde_json::from_value(entry).unwrap();
        let module = Arc::new(ModuleDescriptor {
            id: module_id.to_string(),
            ..Default::default()
        });
        ModuleInstance {
            module,
            entry,
            uri: "/".to_string(),
            url: None,
            auth_token: None,
        }
    }

    #[test]
    fn test_permission_unions() {
        let mut pipeline = vec![
            hop(
                "m-a",
                serde_json::json!({
                    "path": "/a",
                    "permissionsRequired": ["a.read", "common"],
                    "permissionsDesired": ["a.write"]
                }),
            ),
            hop(
                "m-b",
                serde_json::json!({
                    "path": "/b",
                    "permissionsRequired": ["b.read", "common"]
                }),
            ),
        ];
        let mut headers = HeaderMap::new();
        apply_auth_headers(&mut pipeline, &mut headers, Some("tok"));

        assert_eq!(
            header_str(&headers, &X_OKAPI_PERMISSIONS_REQUIRED),
            Some("a.read,b.read,common")
        );
        assert_eq!(header_str(&headers, &X_OKAPI_PERMISSIONS_DESIRED), Some("a.write"));
    }

    #[test]
    fn test_module_permissions_header_always_present() {
        let mut pipeline = vec![hop("m-a", serde_json::json!({"path": "/a"}))];
        let mut headers = HeaderMap::new();
        apply_auth_headers(&mut pipeline, &mut headers, None);

        assert_eq!(header_str(&headers, &X_OKAPI_MODULE_PERMISSIONS), Some("{}"));
        assert!(headers.get(&X_OKAPI_PERMISSIONS_REQUIRED).is_none());
        assert!(headers.get(&X_OKAPI_EXTRA_PERMISSIONS).is_none());
    }

    #[test]
    fn test_redirect_hops_accumulate_extra_permissions() {
        let mut pipeline = vec![
            hop(
                "m-redir",
                serde_json::json!({
                    "path": "/old",
                    "type": "REDIRECT",
                    "redirectPath": "/new",
                    "modulePermissions": ["redir.perm"]
                }),
            ),
            hop(
                "m-b",
                serde_json::json!({"path": "/new", "modulePermissions": ["b.perm"]}),
            ),
        ];
        let mut headers = HeaderMap::new();
        apply_auth_headers(&mut pipeline, &mut headers, None);

        let module_perms: BTreeMap<String, Vec<String>> =
            serde_json::from_str(header_str(&headers, &X_OKAPI_MODULE_PERMISSIONS).unwrap())
                .unwrap();
        assert_eq!(module_perms.len(), 1);
        assert_eq!(module_perms["m-b"], vec!["b.perm"]);

        let extra: Vec<String> =
            serde_json::from_str(header_str(&headers, &X_OKAPI_EXTRA_PERMISSIONS).unwrap())
                .unwrap();
        assert_eq!(extra, vec!["redir.perm"]);
    }

    #[test]
    fn test_incoming_planning_headers_are_sanitized() {
        let mut pipeline = vec![hop("m-a", serde_json::json!({"path": "/a"}))];
        let mut headers = HeaderMap::new();
        headers.insert(&X_OKAPI_PERMISSIONS_REQUIRED, HeaderValue::from_static("forged"));
        headers.insert(&X_OKAPI_MODULE_TOKENS, HeaderValue::from_static("{\"m-a\":\"t\"}"));

        apply_auth_headers(&mut pipeline, &mut headers, None);
        assert!(headers.get(&X_OKAPI_PERMISSIONS_REQUIRED).is_none());
        assert!(headers.get(&X_OKAPI_MODULE_TOKENS).is_none());
    }

    #[test]
    fn test_default_token_assigned_to_every_hop() {
        let mut pipeline = vec![
            hop("m-a", serde_json::json!({"path": "/a"})),
            hop("m-b", serde_json::json!({"path": "/b"})),
        ];
        let mut headers = HeaderMap::new();
        apply_auth_headers(&mut pipeline, &mut headers, Some("client-token"));

        for hop in &pipeline {
            assert_eq!(hop.auth_token.as_deref(), Some("client-token"));
        }
    }

    #[test]
    fn test_auth_response_token_rewrite() {
        let mut pipeline = vec![
            hop("auth", serde_json::json!({"path": "/"})),
            hop("m-echo", serde_json::json!({"path": "/echo"})),
            hop("m-other", serde_json::json!({"path": "/other"})),
        ];
        for hop in pipeline.iter_mut() {
            hop.auth_token = Some("CLIENT".to_string());
        }

        apply_auth_response(&mut pipeline, r#"{"m-echo": "TOK", "_": "DEFAULT"}"#);
        assert_eq!(pipeline[0].auth_token.as_deref(), Some("DEFAULT"));
        assert_eq!(pipeline[1].auth_token.as_deref(), Some("TOK"));
        assert_eq!(pipeline[2].auth_token.as_deref(), Some("DEFAULT"));
    }

    #[test]
    fn test_auth_response_without_default_keeps_client_token() {
        let mut pipeline = vec![hop("m-echo", serde_json::json!({"path": "/echo"}))];
        pipeline[0].auth_token = Some("CLIENT".to_string());

        apply_auth_response(&mut pipeline, r#"{"m-other": "TOK"}"#);
        assert_eq!(pipeline[0].auth_token.as_deref(), Some("CLIENT"));

        apply_auth_response(&mut pipeline, "not json");
        assert_eq!(pipeline[0].auth_token.as_deref(), Some("CLIENT"));
    }
}
