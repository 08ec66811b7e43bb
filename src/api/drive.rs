//! Implements the `Drive` trait with the Google Drive v3 REST API.

use crate::api::{Drive, DriveFile, SharedTokenProvider};
use crate::error::Res;
use anyhow::{bail, Context};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::trace;

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

pub(super) struct GoogleDrive {
    tokens: SharedTokenProvider,
    http: reqwest::Client,
}

impl GoogleDrive {
    pub(super) fn new(tokens: SharedTokenProvider) -> Self {
        Self {
            tokens,
            http: reqwest::Client::new(),
        }
    }

    /// Authenticates and sends `request`, then parses the JSON response as `T`.
    async fn send<T>(&mut self, request: RequestBuilder, what: &str) -> Res<T>
    where
        T: DeserializeOwned,
    {
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to send {what} request to Google Drive API"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Google Drive API {what} failed with status {status}: {body}");
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Google Drive API {what} response"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

/// Escapes a value for use inside a single-quoted string in a Drive search query.
fn escape_query_value(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn folder_query(parent_id: &str, name: &str) -> String {
    format!(
        "'{}' in parents and name = '{}' and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false",
        escape_query_value(parent_id),
        escape_query_value(name)
    )
}

#[async_trait::async_trait]
impl Drive for GoogleDrive {
    async fn parent_folder(&mut self, file_id: &str) -> Res<String> {
        trace!("parent_folder of {file_id}");
        let request = self
            .http
            .get(format!("{DRIVE_API}/{file_id}"))
            .query(&[("fields", "id,parents"), ("supportsAllDrives", "true")]);
        let file: FileResource = self.send(request, "get parents").await?;
        file.parents
            .into_iter()
            .next()
            .with_context(|| format!("File '{file_id}' has no parent folder"))
    }

    async fn find_folder(&mut self, parent_id: &str, name: &str) -> Res<Option<String>> {
        trace!("find_folder '{name}' in {parent_id}");
        let query = folder_query(parent_id, name);
        let request = self.http.get(DRIVE_API).query(&[
            ("q", query.as_str()),
            ("fields", "files(id)"),
            ("orderBy", "createdTime"),
            ("pageSize", "1"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        let list: FileList = self.send(request, "folder search").await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&mut self, parent_id: &str, name: &str) -> Res<String> {
        trace!("create_folder '{name}' in {parent_id}");
        let request = self
            .http
            .post(DRIVE_API)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id]
            }));
        let folder: FileResource = self.send(request, "create folder").await?;
        Ok(folder.id)
    }

    async fn create_file(
        &mut self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Res<DriveFile> {
        trace!("create_file '{name}' ({} bytes) in {parent_id}", data.len());
        // Create the file's metadata first, then upload its content.
        let request = self
            .http
            .post(DRIVE_API)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&json!({
                "name": name,
                "mimeType": mime_type,
                "parents": [parent_id]
            }));
        let created: FileResource = self.send(request, "create file").await?;

        let request = self
            .http
            .patch(format!("{DRIVE_UPLOAD_API}/{}", created.id))
            .query(&[
                ("uploadType", "media"),
                ("fields", "id,webViewLink"),
                ("supportsAllDrives", "true"),
            ])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(data);
        let uploaded: FileResource = self.send(request, "upload").await?;

        let link = uploaded
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", uploaded.id));
        Ok(DriveFile {
            id: uploaded.id,
            link,
        })
    }

    async fn share_with_anyone(&mut self, file_id: &str) -> Res<()> {
        trace!("share_with_anyone {file_id}");
        let request = self
            .http
            .post(format!("{DRIVE_API}/{file_id}/permissions"))
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&json!({ "role": "reader", "type": "anyone" }));
        let _: serde_json::Value = self.send(request, "share").await?;
        Ok(())
    }
}
