use anyhow::Context;
use domain::{tree, Collection};
use std::path::Path;
use storage::CommentRepo;
use tracing::info;

/// 把本地的 comments.json 整体上传到配置的存储，覆盖已有文档。
pub async fn import_file(repo: &CommentRepo, file: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let comments: Collection = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid comment collection", file.display()))?;

    repo.replace_all(&comments)
        .await
        .with_context(|| format!("Failed to upload to '{}'", repo.key()))?;

    let total = tree::count(&comments);
    info!(key = %repo.key(), total, "Imported comments from {}", file.display());
    Ok(total)
}
