use anyhow::Context;
use chrono::{DateTime, Utc};
use domain::{tree, Collection, Comment, CommentError, InsertError, NewComment};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::blob::BlobStore;

pub const DEFAULT_COMMENTS_KEY: &str = "comments.json";
const CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] CommentError),
    #[error("parent comment not found: {0}")]
    ParentNotFound(String),
    #[error("failed to serialize comments: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("comment store unavailable: {0:#}")]
    Storage(anyhow::Error),
}

impl From<InsertError> for SubmitError {
    fn from(e: InsertError) -> Self {
        match e {
            InsertError::ParentNotFound(id) => SubmitError::ParentNotFound(id),
        }
    }
}

/// 整个评论集合作为一个 JSON 文档存放在单个 key 下。
///
/// 每次提交都是一次完整的 读-改-写：没有锁，没有版本号，最后写入者获胜。
#[derive(Clone)]
pub struct CommentRepo {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl CommentRepo {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 读取失败一律视为“还没有评论”，只记录日志。
    pub async fn fetch_all(&self) -> Collection {
        match self.try_fetch_all().await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(key = %self.key, "Failed to read comments, serving empty list: {:#}", e);
                Vec::new()
            }
        }
    }

    pub async fn try_fetch_all(&self) -> anyhow::Result<Collection> {
        let Some(bytes) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Malformed comment document at '{}'", self.key))
    }

    pub async fn submit(&self, req: NewComment) -> Result<Comment, SubmitError> {
        self.submit_at(req, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        req: NewComment,
        now: DateTime<Utc>,
    ) -> Result<Comment, SubmitError> {
        let comment = Comment::create(req.validate()?, now);

        // 写路径上读失败视为存储错误，不当作空集合
        let current = self.try_fetch_all().await.map_err(SubmitError::Storage)?;
        let next = tree::insert(&current, comment.clone())?;
        self.write(&next).await?;

        info!(
            id = %comment.id,
            parent = comment.parent_id.as_deref().unwrap_or("-"),
            total = tree::count(&next),
            "Comment saved"
        );
        Ok(comment)
    }

    /// 整体覆盖文档（导入用）
    pub async fn replace_all(&self, comments: &Collection) -> Result<(), SubmitError> {
        self.write(comments).await
    }

    async fn write(&self, comments: &Collection) -> Result<(), SubmitError> {
        let bytes = serde_json::to_vec_pretty(comments)?;
        self.store
            .put(&self.key, bytes, CONTENT_TYPE)
            .await
            .map_err(SubmitError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlobMeta, Db, MemoryStore};
    use async_trait::async_trait;

    fn repo() -> (CommentRepo, MemoryStore) {
        let store = MemoryStore::new();
        (
            CommentRepo::new(Arc::new(store.clone()), DEFAULT_COMMENTS_KEY),
            store,
        )
    }

    fn top(text: &str) -> NewComment {
        NewComment {
            comment: text.into(),
            ..Default::default()
        }
    }

    fn reply(text: &str, parent: &str) -> NewComment {
        NewComment {
            comment: text.into(),
            parent_id: Some(parent.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_store_then_first_comment() {
        let (repo, _) = repo();
        assert!(repo.fetch_all().await.is_empty());

        let created = repo
            .submit(NewComment {
                comment: "hi".into(),
                rating: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.parent_id, None);
        assert_eq!(created.rating, 5);
        assert_eq!(created.author, "Anonymous");
        assert!(!created.id.is_empty());

        let all = repo.fetch_all().await;
        assert_eq!(all, vec![created]);
    }

    #[tokio::test]
    async fn top_level_comments_keep_arrival_order() {
        let (repo, _) = repo();
        let a = repo.submit(top("first")).await.unwrap();
        let b = repo.submit(top("second")).await.unwrap();
        let ids: Vec<_> = repo.fetch_all().await.into_iter().map(|c| c.id).collect();
        assert_eq!(ids, [a.id, b.id]);
    }

    #[tokio::test]
    async fn replies_append_under_any_depth() {
        let (repo, _) = repo();
        let root = repo.submit(top("root")).await.unwrap();
        let child = repo.submit(reply("re", &root.id)).await.unwrap();
        let second = repo.submit(reply("re 2", &root.id)).await.unwrap();
        let grandchild = repo.submit(reply("re re", &child.id)).await.unwrap();

        let all = repo.fetch_all().await;
        assert_eq!(all.len(), 1);
        let replies = &all[0].replies;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, child.id);
        assert_eq!(replies[1].id, second.id);
        assert_eq!(replies[0].replies[0].id, grandchild.id);
        assert_eq!(replies[0].replies[0].parent_id.as_deref(), Some(child.id.as_str()));
    }

    #[tokio::test]
    async fn orphan_reply_is_rejected_without_writing() {
        let (repo, _) = repo();
        repo.submit(top("root")).await.unwrap();
        let before = repo.fetch_all().await;

        let err = repo.submit(reply("orphan", "doesnotexist")).await.unwrap_err();
        assert!(matches!(err, SubmitError::ParentNotFound(ref id) if id == "doesnotexist"));
        assert_eq!(repo.fetch_all().await, before);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let (repo, store) = repo();
        let err = repo.submit(top("   ")).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(CommentError::EmptyBody)));
        assert_eq!(store.get(DEFAULT_COMMENTS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_document_reads_as_empty() {
        let (repo, store) = repo();
        store
            .put(DEFAULT_COMMENTS_KEY, b"{not json".to_vec(), CONTENT_TYPE)
            .await
            .unwrap();
        assert!(repo.fetch_all().await.is_empty());
        assert!(repo.try_fetch_all().await.is_err());

        // 损坏的文档不会被静默覆盖
        assert!(matches!(
            repo.submit(top("hi")).await,
            Err(SubmitError::Storage(_))
        ));
        assert_eq!(
            store.get(DEFAULT_COMMENTS_KEY).await.unwrap(),
            Some(b"{not json".to_vec())
        );
    }

    #[tokio::test]
    async fn repeated_fetches_are_identical() {
        let (repo, _) = repo();
        let root = repo.submit(top("root")).await.unwrap();
        repo.submit(reply("re", &root.id)).await.unwrap();
        assert_eq!(repo.fetch_all().await, repo.fetch_all().await);
    }

    struct BrokenStore;

    #[async_trait]
    impl BlobStore for BrokenStore {
        async fn list(&self, _prefix: &str) -> anyhow::Result<Vec<BlobMeta>> {
            anyhow::bail!("unreachable")
        }
        async fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn put(&self, _key: &str, _data: Vec<u8>, _ct: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let repo = CommentRepo::new(Arc::new(BrokenStore), DEFAULT_COMMENTS_KEY);
        let err = repo.submit(top("hi")).await.unwrap_err();
        assert!(matches!(err, SubmitError::Storage(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn works_over_sqlite() {
        let db = Db::new("sqlite::memory:").await.unwrap();
        let repo = CommentRepo::new(Arc::new(db), "comments.json");
        let root = repo.submit(top("hi")).await.unwrap();
        repo.submit(reply("re", &root.id)).await.unwrap();

        let all = repo.fetch_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].replies.len(), 1);
        assert_eq!(all[0].replies[0].parent_id.as_deref(), Some(root.id.as_str()));
    }

    #[tokio::test]
    async fn replace_all_overwrites_document() {
        let (repo, _) = repo();
        repo.submit(top("old")).await.unwrap();
        let fresh = vec![Comment::create(top("imported").validate().unwrap(), Utc::now())];
        repo.replace_all(&fresh).await.unwrap();
        assert_eq!(repo.fetch_all().await, fresh);
    }
}
