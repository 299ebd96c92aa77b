use crate::blob::BlobMeta;
use chrono::{NaiveDateTime, TimeZone, Utc};
use sqlx::FromRow;

#[derive(FromRow)]
pub struct SqlBlobMeta {
    pub key: String,
    pub size: i64,
    pub uploaded_at: NaiveDateTime,
}

impl From<SqlBlobMeta> for BlobMeta {
    fn from(sql: SqlBlobMeta) -> Self {
        BlobMeta {
            key: sql.key,
            size: sql.size.max(0) as u64,
            uploaded_at: Utc.from_utc_datetime(&sql.uploaded_at),
        }
    }
}
