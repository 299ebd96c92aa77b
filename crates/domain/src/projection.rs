use crate::models::Comment;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_MOBILE_BREAKPOINT: u32 = 768;

/// 单条评论的展示字段，不含 `replies`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub name: String,
    pub comment: String,
    pub rating: u8,
    pub parent_id: Option<String>,
    #[serde(serialize_with = "crate::models::iso8601::serialize")]
    pub created_at: DateTime<Utc>,
}

impl From<&Comment> for CommentView {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id.clone(),
            name: c.author.clone(),
            comment: c.body.clone(),
            rating: c.rating,
            parent_id: c.parent_id.clone(),
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub depth: usize,
    pub replies: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatEntry {
    #[serde(flatten)]
    pub comment: CommentView,
}

pub fn to_tree(collection: &[Comment]) -> Vec<TreeNode> {
    fn walk(nodes: &[Comment], depth: usize) -> Vec<TreeNode> {
        nodes
            .iter()
            .map(|c| TreeNode {
                comment: c.into(),
                depth,
                replies: walk(&c.replies, depth + 1),
            })
            .collect()
    }
    walk(collection, 0)
}

/// 先序遍历：每条评论后紧跟它的全部回复。
pub fn to_flat_pre_order(collection: &[Comment]) -> Vec<FlatEntry> {
    fn walk(nodes: &[Comment], out: &mut Vec<FlatEntry>) {
        for c in nodes {
            out.push(FlatEntry { comment: c.into() });
            walk(&c.replies, out);
        }
    }
    let mut out = Vec::new();
    walk(collection, &mut out);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    Mobile,
    Wide,
}

impl Viewport {
    pub fn classify(width: u32, breakpoint: u32) -> Self {
        if width < breakpoint {
            Viewport::Mobile
        } else {
            Viewport::Wide
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "comments", rename_all = "lowercase")]
pub enum Projection {
    Tree(Vec<TreeNode>),
    Flat(Vec<FlatEntry>),
}

impl Projection {
    pub fn for_viewport(collection: &[Comment], viewport: Viewport) -> Self {
        match viewport {
            Viewport::Wide => Projection::Tree(to_tree(collection)),
            Viewport::Mobile => Projection::Flat(to_flat_pre_order(collection)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Projection::Tree(nodes) => nodes.len(),
            Projection::Flat(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{count, fixtures::sample};

    #[test]
    fn flat_projection_is_pre_order_and_complete() {
        let tree = sample();
        let flat = to_flat_pre_order(&tree);
        let ids: Vec<_> = flat.iter().map(|e| e.comment.id.as_str()).collect();
        assert_eq!(ids, ["a", "a1", "a1x", "a2", "b"]);
        assert_eq!(flat.len(), count(&tree));
    }

    #[test]
    fn tree_projection_keeps_nesting_and_depth() {
        let nodes = to_tree(&sample());
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].depth, 0);
        assert_eq!(nodes[0].replies[0].comment.id, "a1");
        assert_eq!(nodes[0].replies[0].depth, 1);
        assert_eq!(nodes[0].replies[0].replies[0].depth, 2);
        assert!(nodes[1].replies.is_empty());
    }

    #[test]
    fn viewport_threshold_is_exclusive() {
        assert_eq!(Viewport::classify(767, DEFAULT_MOBILE_BREAKPOINT), Viewport::Mobile);
        assert_eq!(Viewport::classify(768, DEFAULT_MOBILE_BREAKPOINT), Viewport::Wide);
    }

    #[test]
    fn projection_follows_viewport() {
        let tree = sample();
        assert!(matches!(
            Projection::for_viewport(&tree, Viewport::Wide),
            Projection::Tree(ref n) if n.len() == 2
        ));
        assert!(matches!(
            Projection::for_viewport(&tree, Viewport::Mobile),
            Projection::Flat(ref e) if e.len() == 5
        ));
        assert!(Projection::for_viewport(&[], Viewport::Mobile).is_empty());
    }
}
