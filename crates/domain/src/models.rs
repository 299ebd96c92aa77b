use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ANONYMOUS: &str = "Anonymous";
pub const MAX_RATING: u8 = 5;

const ID_SUFFIX_LEN: usize = 11;
const ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 整个持久化状态：顶层评论的有序列表，回复嵌套在各自的 `replies` 中。
pub type Collection = Vec<Comment>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(rename = "name")]
    pub author: String,
    #[serde(rename = "comment")]
    pub body: String,
    #[serde(default, deserialize_with = "nullable_rating")]
    pub rating: u8,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub replies: Vec<Comment>,
    #[serde(with = "iso8601")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// 时间戳截断到毫秒，与持久化格式的精度一致
    pub fn create(valid: ValidComment, now: DateTime<Utc>) -> Self {
        let now = now.trunc_subsecs(3);
        Self {
            id: generate_id(now),
            author: valid.author,
            body: valid.body,
            rating: valid.rating,
            parent_id: valid.parent_id,
            replies: Vec::new(),
            created_at: now,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// POST 请求体，字段名与前端表单保持一致。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidComment {
    pub author: String,
    pub body: String,
    pub rating: u8,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    #[error("comment body must not be empty")]
    EmptyBody,
    #[error("rating must be between 0 and 5, got {0}")]
    RatingOutOfRange(u8),
}

impl NewComment {
    pub fn validate(self) -> Result<ValidComment, CommentError> {
        let body = self.comment.trim();
        if body.is_empty() {
            return Err(CommentError::EmptyBody);
        }

        let rating = self.rating.unwrap_or(0);
        if rating > MAX_RATING {
            return Err(CommentError::RatingOutOfRange(rating));
        }

        let author = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS)
            .to_string();

        // 空字符串的 parentId 等同于顶层评论
        let parent_id = self.parent_id.filter(|p| !p.trim().is_empty());

        Ok(ValidComment {
            author,
            body: body.to_string(),
            rating,
            parent_id,
        })
    }
}

/// 毫秒时间戳 + 随机 base36 后缀。尽力唯一，不保证高并发下无碰撞。
pub fn generate_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect();
    format!("{}{}", now.timestamp_millis(), suffix)
}

fn nullable_rating<'de, D: serde::Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    Ok(Option::<u8>::deserialize(d)?.unwrap_or(0))
}

pub(crate) mod iso8601 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
