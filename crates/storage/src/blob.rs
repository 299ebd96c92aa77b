use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// 不透明的键值存储：list / get / put，put 总是覆盖。
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobMeta>>;

    /// key 不存在时返回 `Ok(None)`
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> anyhow::Result<()>;
}

struct MemoryBlob {
    data: Vec<u8>,
    uploaded_at: DateTime<Utc>,
}

/// 进程内存储，用于测试和临时运行
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<BTreeMap<String, MemoryBlob>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobMeta>> {
        let map = self.inner.read().await;
        Ok(map
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, b)| BlobMeta {
                key: k.clone(),
                size: b.data.len() as u64,
                uploaded_at: b.uploaded_at,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.inner.read().await.get(key).map(|b| b.data.clone()))
    }

    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> anyhow::Result<()> {
        self.inner.write().await.insert(
            key.to_string(),
            MemoryBlob {
                data,
                uploaded_at: Utc::now(),
            },
        );
        Ok(())
    }
}
