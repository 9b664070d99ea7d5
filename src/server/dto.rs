//! # Wire Payloads
//!
//! Request bodies for the management API. All endpoints accept POST with
//! a JSON body; field names follow the wire convention (camelCase).

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRequest {
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceFilesRequest {
    pub namespace: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Shared payload for the `/config/*` endpoints. The `action` field must
/// match the endpoint verb.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRequest {
    #[serde(default)]
    pub action: Option<String>,
    pub app_name: String,
    pub namespace: String,
    #[serde(default)]
    pub path: Option<String>,
    pub email: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub commit_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesRequest {
    #[serde(default)]
    pub action: Option<String>,
    pub namespace: String,
    pub commit_id: String,
}

impl ConfigRequest {
    /// Full repository path of the targeted file:
    /// `<namespace>[/<path>]/<appName>.yml`.
    pub fn file_path(&self) -> String {
        let subpath = self
            .path
            .as_deref()
            .unwrap_or("")
            .trim_matches('/');
        if subpath.is_empty() {
            format!("{}/{}.yml", self.namespace, self.app_name)
        } else {
            format!("{}/{}/{}.yml", self.namespace, subpath, self.app_name)
        }
    }
}
