use crate::models::{Collection, Comment};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("parent comment not found: {0}")]
    ParentNotFound(String),
}

/// 返回插入后的新集合，输入集合保持不变。
///
/// 顶层评论追加到末尾；回复按深度优先（先检查节点自身，再递归其回复，
/// 然后才是下一个兄弟节点）查找第一个 id 匹配的祖先，追加到它的 `replies` 末尾。
pub fn insert(collection: &[Comment], comment: Comment) -> Result<Collection, InsertError> {
    match comment.parent_id.clone() {
        None => {
            let mut next = collection.to_vec();
            next.push(comment);
            Ok(next)
        }
        Some(parent_id) => {
            insert_reply(collection, &parent_id, comment)
                .map_err(|_| InsertError::ParentNotFound(parent_id))
        }
    }
}

// 找不到时把 reply 原样交还给调用方
fn insert_reply(
    nodes: &[Comment],
    parent_id: &str,
    mut reply: Comment,
) -> Result<Vec<Comment>, Comment> {
    for (i, node) in nodes.iter().enumerate() {
        if node.id == parent_id {
            let mut next = nodes.to_vec();
            next[i].replies.push(reply);
            return Ok(next);
        }
        match insert_reply(&node.replies, parent_id, reply) {
            Ok(replies) => {
                let mut next = nodes.to_vec();
                next[i].replies = replies;
                return Ok(next);
            }
            Err(back) => reply = back,
        }
    }
    Err(reply)
}

pub fn find<'a>(collection: &'a [Comment], id: &str) -> Option<&'a Comment> {
    for node in collection {
        if node.id == id {
            return Some(node);
        }
        if let Some(hit) = find(&node.replies, id) {
            return Some(hit);
        }
    }
    None
}

pub fn contains_id(collection: &[Comment], id: &str) -> bool {
    find(collection, id).is_some()
}

pub fn count(collection: &[Comment]) -> usize {
    collection.iter().map(|c| 1 + count(&c.replies)).sum()
}
