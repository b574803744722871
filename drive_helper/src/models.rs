//! Data models for Google Drive v2 API requests and responses.

use serde::{Deserialize, Serialize};

/// MIME type the service uses to mark a resource as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// MIME type used when the extension of a local file is not recognised.
pub const UNKNOWN_MIME_TYPE: &str = "application/unknown";

/// Reference to a parent folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReference {
    pub id: String,
}

impl ParentReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Metadata for a file or folder as returned by the service.
///
/// This is a snapshot; it is never refreshed or cached locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResource {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parents: Vec<ParentReference>,
    /// Absent for resources without retrievable content, e.g. native Docs.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub file_size: Option<u64>,
}

impl FileResource {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().map(|p| p.id.as_str())
    }
}

/// The service encodes int64 values as JSON strings.
fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl std::fmt::Display for FileResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = self
            .file_size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let mime = self.mime_type.as_deref().unwrap_or("-");
        write!(f, "{}\t{}\t{}\t{}", self.id, size_str, mime, self.title)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Metadata sent on insert and update.
///
/// Update replaces every field, so all of them are always present.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadataRequest {
    pub title: String,
    pub description: String,
    pub mime_type: String,
    pub parents: Vec<ParentReference>,
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub items: Vec<FileResource>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Kind of principal a permission is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    User,
    Group,
    Domain,
    Anyone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionRole {
    Owner,
    Writer,
    Reader,
}

/// A permission grant on a file or folder.
#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    /// Email address or domain; empty for `anyone`.
    pub value: String,
    #[serde(rename = "type")]
    pub kind: PermissionType,
    pub role: PermissionRole,
}

/// Storage quota snapshot for the authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

impl QuotaInfo {
    pub fn new(total_bytes: u64, used_bytes: u64) -> Self {
        Self {
            total_bytes,
            used_bytes,
        }
    }

    /// Remaining bytes, zero when usage exceeds the limit.
    pub fn free_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.used_bytes)
    }
}

/// Account information.
#[derive(Debug, Clone)]
pub struct About {
    pub name: String,
    pub root_folder_id: String,
    pub quota: QuotaInfo,
}

/// About response from the Drive v2 API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub root_folder_id: String,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub quota_bytes_total: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub quota_bytes_used: Option<u64>,
}

impl From<AboutResponse> for About {
    fn from(resp: AboutResponse) -> Self {
        Self {
            name: resp.name,
            root_folder_id: resp.root_folder_id,
            quota: QuotaInfo::new(
                resp.quota_bytes_total.unwrap_or(0),
                resp.quota_bytes_used.unwrap_or(0),
            ),
        }
    }
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_file_resource_deserialize() {
        let json = r#"{
            "id": "abc123",
            "title": "test.txt",
            "mimeType": "text/plain",
            "description": "notes",
            "parents": [{"id": "root"}, {"id": "p2", "isRoot": false}],
            "downloadUrl": "https://example.com/dl/abc123",
            "fileSize": "1024"
        }"#;

        let file: FileResource = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.title, "test.txt");
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(file.file_size, Some(1024));
        assert_eq!(file.parent_ids().collect::<Vec<_>>(), vec!["root", "p2"]);
        assert!(!file.is_folder());
    }

    #[test]
    fn test_folder_has_no_download_url() {
        let json = format!(
            r#"{{"id": "f1", "title": "My Folder", "mimeType": "{}"}}"#,
            FOLDER_MIME_TYPE
        );

        let folder: FileResource = serde_json::from_str(&json).unwrap();
        assert!(folder.is_folder());
        assert!(folder.download_url.is_none());
        assert!(folder.file_size.is_none());
        assert!(folder.parents.is_empty());
    }

    #[test]
    fn test_metadata_request_serialization() {
        let body = FileMetadataRequest {
            title: "a.txt".to_string(),
            description: "desc".to_string(),
            mime_type: "text/plain".to_string(),
            parents: vec![ParentReference::new("root")],
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["title"], "a.txt");
        assert_eq!(value["mimeType"], "text/plain");
        assert_eq!(value["parents"][0]["id"], "root");
    }

    #[test]
    fn test_permission_serialization() {
        let permission = Permission {
            value: String::new(),
            kind: PermissionType::Anyone,
            role: PermissionRole::Reader,
        };

        let value = serde_json::to_value(&permission).unwrap();
        assert_eq!(value["type"], "anyone");
        assert_eq!(value["role"], "reader");
        assert_eq!(value["value"], "");
    }

    #[test]
    fn test_quota_free_bytes() {
        assert_eq!(QuotaInfo::new(100, 40).free_bytes(), 60);
        assert_eq!(QuotaInfo::new(100, 100).free_bytes(), 0);
        assert_eq!(QuotaInfo::new(100, 150).free_bytes(), 0);
    }

    #[test]
    fn test_about_from_response() {
        let json = r#"{
            "name": "Jane",
            "rootFolderId": "0AAroot",
            "quotaBytesTotal": "16106127360",
            "quotaBytesUsed": "1024"
        }"#;

        let about: About = serde_json::from_str::<AboutResponse>(json).unwrap().into();
        assert_eq!(about.name, "Jane");
        assert_eq!(about.root_folder_id, "0AAroot");
        assert_eq!(about.quota.total_bytes, 16106127360);
        assert_eq!(about.quota.used_bytes, 1024);
    }
}
