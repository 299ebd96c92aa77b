use crate::{
    blob::{BlobMeta, BlobStore},
    models::SqlBlobMeta,
    Db,
};
use async_trait::async_trait;
use chrono::Utc;

#[async_trait]
impl BlobStore for Db {
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<BlobMeta>> {
        // 按字符前缀匹配，空前缀列出全部
        let rows = sqlx::query_as::<_, SqlBlobMeta>(
            r#"
            SELECT key, size, uploaded_at
            FROM blobs
            WHERE substr(key, 1, length(?)) = ?
            ORDER BY key ASC
            "#,
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let data = sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM blobs WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(data)
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        let size = data.len() as i64;
        sqlx::query(
            r#"
            INSERT INTO blobs (key, content_type, data, size, uploaded_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                content_type = excluded.content_type,
                data = excluded.data,
                size = excluded.size,
                uploaded_at = excluded.uploaded_at
            "#,
        )
        .bind(key)
        .bind(content_type)
        .bind(data)
        .bind(size)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sqlite_blobs_upsert_and_list() {
        let db = Db::new("sqlite::memory:").await.unwrap();
        assert_eq!(db.get("comments.json").await.unwrap(), None);

        db.put("comments.json", b"[]".to_vec(), "application/json").await.unwrap();
        db.put("comments.json", b"[ ]".to_vec(), "application/json").await.unwrap();
        db.put("drafts/1", b"x".to_vec(), "text/plain").await.unwrap();

        assert_eq!(db.get("comments.json").await.unwrap(), Some(b"[ ]".to_vec()));

        let all = db.list("").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].key, "comments.json");
        assert_eq!(all[0].size, 3);

        let drafts = db.list("drafts/").await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].key, "drafts/1");
    }
}
