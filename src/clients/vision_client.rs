//! Cloud Vision + Cloud Storage 客户端
//!
//! 只负责 HTTP 调用本身；上传 → 提交 → 轮询 → 汇总分片的流程在
//! `services::recognition` 中。

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::ApiError;
use crate::infrastructure::ApiClient;
use crate::traits::{OperationStatus, RecognitionTransport};

const VISION_API_BASE: &str = "https://vision.googleapis.com/v1";
const STORAGE_API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const STORAGE_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Vision API 客户端
pub struct VisionClient {
    api: ApiClient,
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct OperationHandle {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OperationBody {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

impl VisionClient {
    pub fn new(api: ApiClient, bucket: impl Into<String>) -> Self {
        Self {
            api,
            bucket: bucket.into(),
        }
    }

    fn object_media_url(&self, name: &str) -> Result<Url, ApiError> {
        let base = format!("{}/b/{}/o", STORAGE_API_BASE, self.bucket);
        let mut url = Url::parse(&base).map_err(|e| ApiError::malformed(&base, e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::malformed(&base, "无法拼接对象路径"))?
            .push(name);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

#[async_trait]
impl RecognitionTransport for VisionClient {
    async fn upload(
        &self,
        object_name: &str,
        content: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, ApiError> {
        let url = format!("{}/b/{}/o", STORAGE_UPLOAD_BASE, self.bucket);
        debug!("上传 {} ({} 字节)", object_name, content.len());

        let request = self
            .api
            .request(Method::POST, &url)
            .query(&[("uploadType", "media"), ("name", object_name)])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(content);
        self.api.send(&url, request).await?;

        Ok(self.object_uri(object_name))
    }

    async fn submit(
        &self,
        input_uri: &str,
        mime_type: &str,
        output_prefix: &str,
    ) -> Result<String, ApiError> {
        let url = format!("{}/files:asyncBatchAnnotate", VISION_API_BASE);
        let body = json!({
            "requests": [{
                "inputConfig": {
                    "gcsSource": { "uri": input_uri },
                    "mimeType": mime_type
                },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
                "outputConfig": {
                    "gcsDestination": { "uri": output_prefix },
                    "batchSize": 1
                }
            }]
        });

        let handle: OperationHandle = self
            .api
            .send_json_as(&url, self.api.request(Method::POST, &url).json(&body))
            .await?;

        handle
            .name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::malformed(&url, format!("无效的 operation 名称: {}", handle.name)))
    }

    async fn poll(&self, operation_id: &str) -> Result<OperationStatus, ApiError> {
        let url = format!("{}/operations/{}", VISION_API_BASE, operation_id);
        let body: OperationBody = self
            .api
            .send_json_as(&url, self.api.request(Method::GET, &url))
            .await?;

        let error = body.error.map(|e| {
            e.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string())
        });

        Ok(OperationStatus {
            done: body.done,
            error,
        })
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/b/{}/o", STORAGE_API_BASE, self.bucket);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .api
                .request(Method::GET, &url)
                .query(&[("prefix", prefix), ("fields", "items(name),nextPageToken")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ObjectList = self.api.send_json_as(&url, request).await?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn fetch_object(&self, name: &str) -> Result<JsonValue, ApiError> {
        let url = self.object_media_url(name)?;
        self.api
            .send_json(name, self.api.request(Method::GET, url.as_str()))
            .await
    }

    fn object_uri(&self, object_name: &str) -> String {
        format!("gs://{}/{}", self.bucket, object_name)
    }
}
