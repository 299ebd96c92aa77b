use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use storage::{BlobMeta, BlobStore};
use tracing::debug;

#[derive(Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub token: String,
    // 单个请求的上限，需小于提交超时，否则写 worker 会被挂起的服务卡住
    pub timeout: Duration,
}

/// HTTP Blob 服务：list 返回 blob 描述（含下载地址），get 先 list 再按 url 下载。
#[derive(Clone)]
pub struct RemoteBlobStore {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct ListResponse {
    blobs: Vec<RemoteBlob>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteBlob {
    pathname: String,
    url: String,
    size: u64,
    uploaded_at: DateTime<Utc>,
}

impl RemoteBlobStore {
    pub fn new(config: RemoteConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    async fn list_raw(&self, prefix: &str) -> anyhow::Result<Vec<RemoteBlob>> {
        let resp = self
            .client
            .get(&self.base_url)
            .bearer_auth(&self.token)
            .query(&[("prefix", prefix)])
            .send()
            .await
            .context("Blob list request failed")?
            .error_for_status()?;
        let body: ListResponse = resp.json().await.context("Malformed blob list response")?;
        Ok(body.blobs)
    }

    /// key 按路径段逐段编码，`/` 保留为分隔符
    fn blob_url(&self, key: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid blob service url: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Blob service url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(key.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for RemoteBlobStore {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobMeta>> {
        Ok(self
            .list_raw(prefix)
            .await?
            .into_iter()
            .map(|b| BlobMeta {
                key: b.pathname,
                size: b.size,
                uploaded_at: b.uploaded_at,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(blob) = self
            .list_raw(key)
            .await?
            .into_iter()
            .find(|b| b.pathname == key)
        else {
            return Ok(None);
        };

        debug!("Downloading blob {} from {}", key, blob.url);
        let resp = self
            .client
            .get(&blob.url)
            .send()
            .await
            .with_context(|| format!("Blob download failed: {}", key))?;
        // list 与下载之间 blob 可能被替换
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        let url = self.blob_url(key)?;
        self.client
            .put(url)
            .bearer_auth(&self.token)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1")
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .with_context(|| format!("Blob upload failed: {}", key))?
            .error_for_status()?;
        Ok(())
    }
}
