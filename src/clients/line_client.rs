//! LINE Messaging API 客户端 - 消息推送

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::infrastructure::ApiClient;
use crate::traits::MessageTransport;

const LINE_BROADCAST_URL: &str = "https://api.line.me/v2/bot/message/broadcast";

pub struct LineClient {
    api: ApiClient,
}

impl LineClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MessageTransport for LineClient {
    async fn broadcast(&self, text: &str) -> Result<(), ApiError> {
        let body = json!({
            "messages": [{ "type": "text", "text": text }]
        });
        self.api.post_json(LINE_BROADCAST_URL, &body).await?;
        info!("📣 LINE 广播已发送 ({} 字符)", text.chars().count());
        Ok(())
    }
}
