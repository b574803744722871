//! Google Drive API client.
//!
//! Every method maps onto one logical remote operation. Failures are logged
//! where they are detected and returned as [`DriveError`]; nothing is retried.

use std::path::Path;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::error::{DriveError, Result};
use crate::models::{
    About, AboutResponse, FileListResponse, FileMetadataRequest, FileResource, ParentReference,
    Permission, PermissionRole, PermissionType, QuotaInfo, FOLDER_MIME_TYPE, UNKNOWN_MIME_TYPE,
};

const UPLOAD_DESCRIPTION: &str = "File uploaded by drive_helper";
const UPDATE_DESCRIPTION: &str = "File updated by drive_helper";
const APP_FOLDER_DESCRIPTION: &str = "folder description";

/// Result of a paginated listing.
///
/// Listing is best effort: when a page request fails, the items gathered from
/// earlier pages are kept and the failure is recorded in `interrupted`.
#[derive(Debug, Default)]
pub struct FileListing {
    pub files: Vec<FileResource>,
    pub interrupted: Option<DriveError>,
}

impl FileListing {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }

    /// Discard partial results: `Err` if any page failed.
    pub fn into_result(self) -> Result<Vec<FileResource>> {
        match self.interrupted {
            Some(err) => Err(err),
            None => Ok(self.files),
        }
    }
}

/// Client for the Google Drive v2 API.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    config: ClientConfig,
}

impl DriveClient {
    /// Create a client talking to the public Google endpoints.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_config(auth, ClientConfig::default())
    }

    pub fn with_config(auth: Authenticator, config: ClientConfig) -> Self {
        Self {
            auth,
            http: Client::new(),
            config,
        }
    }

    /// Download the content of `file` to `destination`, overwriting it.
    ///
    /// Fails without touching the network when the resource has no download
    /// URL (native Google documents, folders). A failure mid-transfer may leave
    /// a truncated file behind.
    pub async fn download_file<P: AsRef<Path>>(
        &self,
        file: &FileResource,
        destination: P,
    ) -> Result<()> {
        let destination = destination.as_ref();

        let url = match file.download_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => {
                warn!(file_id = %file.id, "file has no content stored on Drive");
                return Err(DriveError::PreconditionFailed(format!(
                    "'{}' has no download URL",
                    file.title
                )));
            }
        };

        match self.fetch_to_file(url, destination).await {
            Ok(written) => {
                debug!(
                    file_id = %file.id,
                    bytes = written,
                    path = %destination.display(),
                    "downloaded"
                );
                Ok(())
            }
            Err(e) => {
                warn!(file_id = %file.id, error = %e, "download failed");
                Err(e)
            }
        }
    }

    async fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<u64> {
        let token = self.auth.get_access_token().await?;

        let response = self.http.get(url).bearer_auth(&token).send().await?;
        let response = ensure_success(response).await?;

        let mut file = File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;

        Ok(written)
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<FileResource> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.config.api_base, file_id))
            .bearer_auth(&token)
            .send()
            .await?;

        let file: FileResource = ensure_success(response).await?.json().await?;
        Ok(file)
    }

    /// Upload a local file into `parent_id`.
    ///
    /// Returns the new resource with its server-assigned id.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        source: P,
        parent_id: &str,
    ) -> Result<FileResource> {
        let source = source.as_ref();
        let request = self
            .http
            .post(format!("{}/files", self.config.upload_base));

        let result = self
            .send_media(request, source, parent_id, UPLOAD_DESCRIPTION)
            .await;
        match &result {
            Ok(file) => info!(file_id = %file.id, path = %source.display(), "uploaded"),
            Err(e) => warn!(path = %source.display(), error = %e, "upload failed"),
        }
        result
    }

    /// Replace the content and metadata of `file_id` with a local file.
    ///
    /// Title, description, MIME type and parents are all overwritten.
    pub async fn update_file<P: AsRef<Path>>(
        &self,
        source: P,
        parent_id: &str,
        file_id: &str,
    ) -> Result<FileResource> {
        let source = source.as_ref();
        let request = self
            .http
            .put(format!("{}/files/{}", self.config.upload_base, file_id));

        let result = self
            .send_media(request, source, parent_id, UPDATE_DESCRIPTION)
            .await;
        match &result {
            Ok(file) => info!(file_id = %file.id, path = %source.display(), "updated"),
            Err(e) => warn!(file_id, path = %source.display(), error = %e, "update failed"),
        }
        result
    }

    /// Send metadata and file content as a single multipart request.
    async fn send_media(
        &self,
        request: RequestBuilder,
        source: &Path,
        parent_id: &str,
        description: &str,
    ) -> Result<FileResource> {
        let metadata = local_metadata(source, parent_id, description).await?;

        let token = self.auth.get_access_token().await?;
        let file = File::open(source).await?;
        let length = file.metadata().await?.len();

        let metadata_part =
            Part::text(serde_json::to_string(&metadata)?).mime_str("application/json")?;

        let file_part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
            .file_name(metadata.title)
            .mime_str(&metadata.mime_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = request
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart")])
            .multipart(form)
            .send()
            .await?;

        let file: FileResource = ensure_success(response).await?.json().await?;
        Ok(file)
    }

    /// Create a folder. Folders with the same title may already exist.
    pub async fn create_directory(
        &self,
        title: &str,
        description: &str,
        parent_id: &str,
    ) -> Result<FileResource> {
        let body = FileMetadataRequest {
            title: title.to_string(),
            description: description.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            parents: vec![ParentReference::new(parent_id)],
        };

        let result = self.insert_metadata(&body).await;
        match &result {
            Ok(folder) => info!(folder_id = %folder.id, title, "created folder"),
            Err(e) => warn!(title, error = %e, "failed to create folder"),
        }
        result
    }

    async fn insert_metadata(&self, body: &FileMetadataRequest) -> Result<FileResource> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .post(format!("{}/files", self.config.api_base))
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        let file: FileResource = ensure_success(response).await?.json().await?;
        Ok(file)
    }

    /// List every file visible to the session, optionally filtered by a
    /// Drive search query (passed through verbatim).
    ///
    /// Pages are followed until the service stops returning a continuation
    /// token. Items keep the order the service returned them in.
    pub async fn list_files(&self, query: Option<&str>) -> FileListing {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            match self.fetch_page(query, page_token.as_deref()).await {
                Ok(page) => {
                    files.extend(page.items);
                    match page.next_page_token.filter(|t| !t.is_empty()) {
                        Some(token) => page_token = Some(token),
                        None => break,
                    }
                }
                Err(e) => {
                    warn!(
                        query = query.unwrap_or(""),
                        collected = files.len(),
                        error = %e,
                        "listing interrupted"
                    );
                    return FileListing {
                        files,
                        interrupted: Some(e),
                    };
                }
            }
        }

        debug!(count = files.len(), "listing complete");
        FileListing {
            files,
            interrupted: None,
        }
    }

    async fn fetch_page(
        &self,
        query: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FileListResponse> {
        let token = self.auth.get_access_token().await?;

        let mut request = self
            .http
            .get(format!("{}/files", self.config.api_base))
            .bearer_auth(&token)
            .query(&[("maxResults", self.config.page_size.to_string())]);

        if let Some(q) = query {
            request = request.query(&[("q", q)]);
        }
        if let Some(t) = page_token {
            request = request.query(&[("pageToken", t)]);
        }

        let page: FileListResponse = ensure_success(request.send().await?).await?.json().await?;
        Ok(page)
    }

    /// Grant `role` on `file_id` to a principal.
    pub async fn share(
        &self,
        file_id: &str,
        value: &str,
        kind: PermissionType,
        role: PermissionRole,
    ) -> Result<()> {
        let permission = Permission {
            value: value.to_string(),
            kind,
            role,
        };

        let result = self.insert_permission(file_id, &permission).await;
        match &result {
            Ok(()) => debug!(file_id, ?kind, ?role, "permission granted"),
            Err(e) => warn!(file_id, error = %e, "failed to share"),
        }
        result
    }

    async fn insert_permission(&self, file_id: &str, permission: &Permission) -> Result<()> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/files/{}/permissions",
                self.config.api_base, file_id
            ))
            .bearer_auth(&token)
            .json(permission)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    /// Resolve the id of the application folder named `app_name`, creating it
    /// under the root folder when missing, and make it readable by anyone.
    ///
    /// A freshly created folder may take a moment to appear in listings, so
    /// the lookup is repeated on the configured backoff schedule.
    pub async fn app_folder_id(&self, app_name: &str) -> Result<String> {
        let query = app_folder_query(app_name);

        let mut folders = self.list_files(Some(&query)).await.into_result()?;
        if folders.is_empty() {
            info!(app_name, "application folder missing, creating it");
            self.create_directory(app_name, APP_FOLDER_DESCRIPTION, "root")
                .await?;
            folders = self.wait_for_folder(&query, app_name).await?;
        }

        let folder_id = single_folder(app_name, folders)?;

        self.share(&folder_id, "", PermissionType::Anyone, PermissionRole::Reader)
            .await?;

        Ok(folder_id)
    }

    async fn wait_for_folder(&self, query: &str, title: &str) -> Result<Vec<FileResource>> {
        let policy = self.config.folder_poll;

        for attempt in 0..policy.max_attempts {
            let delay = policy.delay_for(attempt);
            debug!(attempt, ?delay, title, "waiting for folder to become visible");
            tokio::time::sleep(delay).await;

            let folders = self.list_files(Some(query)).await.into_result()?;
            if !folders.is_empty() {
                return Ok(folders);
            }
        }

        warn!(title, attempts = policy.max_attempts, "folder never became visible");
        Err(DriveError::TimeoutError(format!(
            "folder '{}' not visible after {} attempts ({:?})",
            title,
            policy.max_attempts,
            policy.total_budget()
        )))
    }

    /// Fetch account information.
    pub async fn about(&self) -> Result<About> {
        let result = self.fetch_about().await;
        if let Err(e) = &result {
            warn!(error = %e, "failed to fetch account information");
        }
        result
    }

    async fn fetch_about(&self) -> Result<About> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/about", self.config.api_base))
            .bearer_auth(&token)
            .send()
            .await?;

        let about: AboutResponse = ensure_success(response).await?.json().await?;
        Ok(about.into())
    }

    /// Log user, root folder and quota details.
    pub async fn print_about(&self) -> Result<()> {
        let about = self.about().await?;

        info!("Current user name: {}", about.name);
        info!("Root folder ID: {}", about.root_folder_id);
        info!("Total quota (bytes): {}", about.quota.total_bytes);
        info!("Used quota (bytes): {}", about.quota.used_bytes);
        info!("Free quota (bytes): {}", about.quota.free_bytes());

        Ok(())
    }

    pub async fn quota(&self) -> Result<QuotaInfo> {
        Ok(self.about().await?.quota)
    }

    /// Whether the account has room for `candidate_size` more bytes.
    ///
    /// True iff the free quota is strictly greater than `candidate_size`, so
    /// `can_upload(0)` only checks that some space is left.
    pub async fn can_upload(&self, candidate_size: u64) -> Result<bool> {
        let quota = self.quota().await?;
        Ok(quota.free_bytes() > candidate_size)
    }
}

/// Turn a non-success response into a [`DriveError`].
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    Err(DriveError::from_response(status.as_u16(), error_body))
}

/// Build insert/update metadata for a local file.
async fn local_metadata(
    source: &Path,
    parent_id: &str,
    description: &str,
) -> Result<FileMetadataRequest> {
    let is_file = tokio::fs::metadata(source)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(DriveError::PreconditionFailed(format!(
            "File does not exist: {}",
            source.display()
        )));
    }

    let title = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DriveError::PreconditionFailed(format!("No file name in {}", source.display()))
        })?;

    Ok(FileMetadataRequest {
        title,
        description: description.to_string(),
        mime_type: guess_mime_type(source),
        parents: vec![ParentReference::new(parent_id)],
    })
}

/// MIME type from the file extension, `application/unknown` if unrecognised.
pub fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| UNKNOWN_MIME_TYPE.to_string())
}

/// Quote a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn app_folder_query(app_name: &str) -> String {
    format!(
        "title = '{}' and mimeType = '{}' and trashed = false",
        escape_query_value(app_name),
        FOLDER_MIME_TYPE
    )
}

fn single_folder(title: &str, mut folders: Vec<FileResource>) -> Result<String> {
    match folders.len() {
        0 => Err(DriveError::FileNotFound(format!("folder '{}'", title))),
        1 => Ok(folders.remove(0).id),
        count => {
            warn!(title, count, "duplicate application folders");
            Err(DriveError::AmbiguousFolder {
                title: title.to_string(),
                count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str) -> FileResource {
        FileResource {
            id: id.to_string(),
            title: "app".to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            description: None,
            parents: Vec::new(),
            download_url: None,
            file_size: None,
        }
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type(Path::new("notes.txt")), "text/plain");
        assert_eq!(guess_mime_type(Path::new("photo.PNG")), "image/png");
        assert_eq!(guess_mime_type(Path::new("archive.zzzz")), UNKNOWN_MIME_TYPE);
        assert_eq!(guess_mime_type(Path::new("Makefile")), UNKNOWN_MIME_TYPE);
    }

    #[test]
    fn test_escape_query_value() {
        assert_eq!(escape_query_value("plain"), "plain");
        assert_eq!(escape_query_value("O'Brien"), "O\\'Brien");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_app_folder_query() {
        assert_eq!(
            app_folder_query("it's"),
            "title = 'it\\'s' and mimeType = 'application/vnd.google-apps.folder' and trashed = false"
        );
    }

    #[test]
    fn test_single_folder() {
        assert_eq!(single_folder("app", vec![folder("f1")]).unwrap(), "f1");
        assert!(matches!(
            single_folder("app", vec![]),
            Err(DriveError::FileNotFound(_))
        ));
        assert!(matches!(
            single_folder("app", vec![folder("f1"), folder("f2")]),
            Err(DriveError::AmbiguousFolder { count: 2, .. })
        ));
    }

    #[test]
    fn test_listing_into_result() {
        let complete = FileListing {
            files: vec![folder("f1")],
            interrupted: None,
        };
        assert!(complete.is_complete());
        assert_eq!(complete.into_result().unwrap().len(), 1);

        let partial = FileListing {
            files: vec![folder("f1")],
            interrupted: Some(DriveError::FileNotFound("page".into())),
        };
        assert!(!partial.is_complete());
        assert!(partial.into_result().is_err());
    }

    #[tokio::test]
    async fn test_local_metadata_missing_file() {
        let result = local_metadata(Path::new("/definitely/not/here.txt"), "root", "d").await;
        assert!(matches!(result, Err(DriveError::PreconditionFailed(_))));
    }
}
