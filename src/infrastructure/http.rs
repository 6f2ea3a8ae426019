//! 带鉴权的 HTTP 客户端 - 基础设施层
//!
//! 持有唯一的 reqwest Client 和访问令牌，只暴露"发请求"的能力

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::ApiError;

/// 带 Bearer 令牌的 HTTP 客户端
///
/// 职责：
/// - 持有 reqwest Client 和令牌
/// - 非 2xx 状态统一转换为 `ApiError::BadStatus`
/// - 不认识文档 / 台账
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    token: String,
}

impl ApiClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
        }
    }

    /// 构建带鉴权头的请求
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(&self.token)
    }

    /// 发送请求，非成功状态返回错误
    pub async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::request_failed(endpoint, e))?;

        let status = response.status();
        debug!("{} -> {}", endpoint, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::BadStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// 发送请求并把响应解析为 JSON
    pub async fn send_json(&self, endpoint: &str, request: RequestBuilder) -> Result<JsonValue, ApiError> {
        self.send_json_as(endpoint, request).await
    }

    /// 发送请求并把响应反序列化为指定类型
    pub async fn send_json_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(endpoint, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::malformed(endpoint, e.to_string()))
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<JsonValue, ApiError> {
        self.send_json(url, self.request(Method::POST, url).json(body)).await
    }
}
