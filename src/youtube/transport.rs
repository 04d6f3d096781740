//! HTTPトランスポート
//!
//! クライアント本体は`Transport`トレイト越しに通信するため、
//! テストではスクリプト化したトランスポートに差し替えられる。

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};

use super::errors::TransportError;
use crate::config::ClientConfig;

/// リクエストヘッダー（名前, 値）
pub type Headers = Vec<(String, String)>;

/// GET / POST を行い、レスポンスボディ全体を返す
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<String, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<String, TransportError>;
}

/// reqwest による実装
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// 設定のUser-Agentとタイムアウトでクライアントを構築する
    ///
    /// # Errors
    /// HTTPクライアントのビルドに失敗した場合にエラーを返す
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client })
    }

    /// 構築済みの`reqwest::Client`を使う
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn apply_headers(request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
        headers
            .iter()
            .fold(request, |request, (name, value)| request.header(name.as_str(), value.as_str()))
    }

    async fn read_body(response: Response) -> Result<String, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("InnerTube request failed: {}", status);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<String, TransportError> {
        let request = Self::apply_headers(self.client.get(url), headers);
        let response = request.send().await?;
        Self::read_body(response).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<String, TransportError> {
        let request = Self::apply_headers(
            self.client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string()),
            headers,
        );
        let response = request.send().await?;
        Self::read_body(response).await
    }
}
