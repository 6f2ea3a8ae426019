//! Google Drive v3 客户端 - 文档来源

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ApiError;
use crate::infrastructure::ApiClient;
use crate::models::DocumentRef;
use crate::traits::DocumentStore;

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3/files";

pub struct DriveClient {
    api: ApiClient,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DocumentRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl DriveClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

/// Drive 查询语句
fn build_query(folder_id: &str, mime_type: &str, since: DateTime<Utc>) -> String {
    format!(
        "'{}' in parents and mimeType = '{}' and modifiedTime >= '{}' and trashed = false",
        folder_id.replace('\'', "\\'"),
        mime_type,
        since.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[async_trait]
impl DocumentStore for DriveClient {
    async fn list_modified_since(
        &self,
        folder_id: &str,
        mime_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DocumentRef>, ApiError> {
        let query = build_query(folder_id, mime_type, since);
        debug!("Drive 查询: {}", query);

        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.api.request(Method::GET, DRIVE_API_BASE).query(&[
                ("q", query.as_str()),
                (
                    "fields",
                    "nextPageToken,files(id,name,mimeType,modifiedTime,createdTime)",
                ),
                ("orderBy", "createdTime"),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: FileList = self.api.send_json_as(DRIVE_API_BASE, request).await?;
            documents.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn get_content(&self, document: &DocumentRef) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/{}", DRIVE_API_BASE, document.id);
        let request = self
            .api
            .request(Method::GET, &url)
            .query(&[("alt", "media")]);
        let response = self.api.send(&url, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::request_failed(&url, e))?;
        Ok(bytes.to_vec())
    }

    async fn rename(&self, document: &DocumentRef, new_name: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", DRIVE_API_BASE, document.id);
        let request = self
            .api
            .request(Method::PATCH, &url)
            .json(&json!({ "name": new_name }));
        self.api.send(&url, request).await?;
        Ok(())
    }
}
