//! # Routing Entries
//!
//! A routing entry is a rule selecting requests by path and method, and
//! describing how a module participates in the pipeline: at which phase
//! level, under which proxy discipline, and with which permissions.

use crate::errors::{OkapiError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Default phase level for entries that do not specify one. Auth-style
/// filters sort before this, post-filters after.
const DEFAULT_LEVEL: &str = "50";

/// How a module's response relates to the rest of the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyType {
    /// The upstream response becomes the next hop's request body
    #[default]
    RequestResponse,
    /// The upstream sees the request; the original body is carried forward
    RequestOnly,
    /// The upstream sees headers only; its response headers are merged back
    Headers,
    /// Bookkeeping hop that reroutes matching to another path
    Redirect,
}

/// A single routing rule within a module descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingEntry {
    /// HTTP methods this entry applies to; empty or `"*"` matches all
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,

    /// Prefix selector: the entry matches any URI starting with this path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Glob selector: `*` matches a non-`/` run, `{name}` one path segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_pattern: Option<String>,

    /// Sort key ordering hops, compared lexicographically
    #[serde(alias = "phaseLevel", skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(rename = "type", alias = "proxyType")]
    pub proxy_type: ProxyType,

    /// Target path for `Redirect` entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_path: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions_required: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions_desired: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub module_permissions: Vec<String>,

    #[serde(skip)]
    compiled_pattern: OnceLock<Option<Regex>>,
}

impl RoutingEntry {
    /// The phase level used to order hops in a pipeline
    pub fn phase_level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LEVEL)
    }

    /// Test this entry against a request URI and method. The URI's query
    /// and fragment are ignored. A `None` method matches regardless of the
    /// method filter.
    pub fn matches(&self, uri: &str, method: Option<&str>) -> bool {
        if !self.method_matches(method) {
            return false;
        }
        let path = strip_query(uri);
        if self.path_pattern.is_some() {
            match self.pattern() {
                Some(re) => re.is_match(path),
                None => false,
            }
        } else {
            // Prefix selector; an absent path matches everything
            path.starts_with(self.path.as_deref().unwrap_or(""))
        }
    }

    fn method_matches(&self, method: Option<&str>) -> bool {
        let Some(method) = method else { return true };
        self.methods.is_empty() || self.methods.iter().any(|m| m == "*" || m == method)
    }

    /// Rewrite a matching URI for this entry's redirect target: the matched
    /// prefix is replaced by `redirectPath`, the remainder and any query
    /// string are kept.
    pub fn redirect_uri(&self, uri: &str) -> String {
        let redirect_path = self.redirect_path.as_deref().unwrap_or("");
        let (path, query) = split_query(uri);
        let suffix = match self.path.as_deref() {
            Some(prefix) if path.starts_with(prefix) => &path[prefix.len()..],
            // Pattern selectors match the whole path
            _ => "",
        };
        format!("{}{}{}", redirect_path, suffix, query)
    }

    /// Validate selector and redirect consistency. `section` names where
    /// the entry came from, for error texts.
    pub fn validate(&self, section: &str) -> Result<()> {
        if self.path.is_none() && self.path_pattern.is_none() {
            return Err(OkapiError::user(format!(
                "Routing entry in {} without path or pathPattern",
                section
            )));
        }
        if let Some(pattern) = &self.path_pattern {
            if self.pattern().is_none() {
                return Err(OkapiError::user(format!(
                    "Invalid pathPattern '{}' in {}",
                    pattern, section
                )));
            }
        }
        if self.proxy_type == ProxyType::Redirect && self.redirect_path.is_none() {
            return Err(OkapiError::user(format!(
                "Redirect entry in {} without redirectPath",
                section
            )));
        }
        Ok(())
    }

    fn pattern(&self) -> Option<&Regex> {
        self.compiled_pattern
            .get_or_init(|| self.path_pattern.as_deref().and_then(pattern_to_regex))
            .as_ref()
    }
}

/// Compile a path pattern into an anchored regex: `*` becomes a non-`/`
/// run, `{name}` a single non-empty path segment, everything else literal.
fn pattern_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str("[^/]*"),
            '{' => {
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                }
                re.push_str("[^/]+");
            }
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

fn strip_query(uri: &str) -> &str {
    match uri.find(['?', '#']) {
        Some(idx) => &uri[..idx],
        None => uri,
    }
}

fn split_query(uri: &str) -> (&str, &str) {
    match uri.find(['?', '#']) {
        Some(idx) => uri.split_at(idx),
        None => (uri, ""),
    }
}
