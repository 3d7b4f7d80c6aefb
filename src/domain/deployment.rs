//! # Deployment Descriptors
//!
//! A deployment record maps a module id to a running instance: the base URL
//! the instance serves at, a gateway-assigned instance id, and optionally
//! the node that launched it.

use crate::domain::module::LaunchDescriptor;
use serde::{Deserialize, Serialize};

/// A running (or requested) instance of a module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentDescriptor {
    /// Instance id; assigned by the gateway on create when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<String>,

    /// The module this instance realizes
    pub srvc_id: String,

    /// Base URL at which the running instance serves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Node that owns the instance, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    /// Launch information, carried as data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<LaunchDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let dd: DeploymentDescriptor = serde_json::from_str(
            r#"{"srvcId": "m-echo", "url": "http://localhost:9231", "nodeId": "node-a"}"#,
        )
        .unwrap();
        assert_eq!(dd.srvc_id, "m-echo");
        assert_eq!(dd.url.as_deref(), Some("http://localhost:9231"));
        assert!(dd.inst_id.is_none());
    }
}
