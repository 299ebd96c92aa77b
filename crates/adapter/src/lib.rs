mod drivers;

pub use drivers::remote::{RemoteBlobStore, RemoteConfig};

use domain::{AppCommand, Comment};
use std::{path::PathBuf, sync::Arc};
use storage::{BlobStore, CommentRepo, Db, FsStore, MemoryStore, SubmitError};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// --- 信封模式核心定义 ---
pub struct CommandEnvelope {
    pub cmd: AppCommand,
    // 结果回传通道：API 层等待这个 Result
    pub resp: oneshot::Sender<Result<Comment, SubmitError>>,
}

#[derive(Clone)]
pub enum StoreConfig {
    Sqlite { url: String },
    File { dir: PathBuf },
    Remote(RemoteConfig),
    Memory,
}

pub async fn open_store(config: StoreConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config {
        StoreConfig::Sqlite { url } => {
            info!("Using SQLite blob store at {}", url);
            Arc::new(Db::new(&url).await?)
        }
        StoreConfig::File { dir } => {
            info!("Using file blob store under {}", dir.display());
            Arc::new(FsStore::new(dir))
        }
        StoreConfig::Remote(remote) => {
            info!("Using remote blob store at {}", remote.base_url);
            Arc::new(RemoteBlobStore::new(remote)?)
        }
        StoreConfig::Memory => {
            warn!("Using in-memory blob store, comments will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// 单个任务按顺序执行写命令。只能保证本进程内不互相覆盖，多进程之间仍是最后写入者获胜。
pub async fn start_with_cancel_token(
    repo: CommentRepo,
    mut rx_cmd: mpsc::Receiver<CommandEnvelope>,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    info!("Comment writer started for key '{}'", repo.key());

    loop {
        tokio::select! {
            cmd_opt = rx_cmd.recv() => {
                let Some(CommandEnvelope { cmd, resp }) = cmd_opt else {
                    break;
                };

                // 排队期间调用方已超时放弃，不再落盘
                if resp.is_closed() {
                    warn!("Caller gave up before the comment was written, skipping");
                    continue;
                }

                let result = match cmd {
                    AppCommand::SubmitComment(req) => repo.submit(req).await,
                };

                match &result {
                    Err(SubmitError::Storage(e)) => error!("Comment not saved: {:#}", e),
                    Err(SubmitError::Serialize(e)) => error!("Comment not saved: {}", e),
                    Err(e) => warn!("Comment rejected: {}", e),
                    Ok(_) => {}
                }

                // 写入过程中调用方也可能放弃
                let _ = resp.send(result);
            },
            _ = cancel_token.cancelled() => break,
        }
    }

    info!("Comment writer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::NewComment;
    use storage::DEFAULT_COMMENTS_KEY;

    async fn send(
        tx: &mpsc::Sender<CommandEnvelope>,
        req: NewComment,
    ) -> Result<Comment, SubmitError> {
        let (resp, rx) = oneshot::channel();
        tx.send(CommandEnvelope {
            cmd: AppCommand::SubmitComment(req),
            resp,
        })
        .await
        .unwrap();
        rx.await.unwrap()
    }

    fn top(text: &str) -> NewComment {
        NewComment {
            comment: text.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn worker_serializes_concurrent_submits() {
        let store = open_store(StoreConfig::Memory).await.unwrap();
        let repo = CommentRepo::new(store, DEFAULT_COMMENTS_KEY);
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(start_with_cancel_token(repo.clone(), rx, cancel.clone()));

        let root = send(&tx, top("root")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let tx = tx.clone();
            let parent = root.id.clone();
            handles.push(tokio::spawn(async move {
                send(
                    &tx,
                    NewComment {
                        comment: format!("reply {}", i),
                        parent_id: Some(parent),
                        ..Default::default()
                    },
                )
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // 进程内没有丢失更新
        let all = repo.fetch_all().await;
        assert_eq!(all[0].replies.len(), 8);

        cancel.cancel();
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn worker_reports_rejections() {
        let store = open_store(StoreConfig::Memory).await.unwrap();
        let repo = CommentRepo::new(store, DEFAULT_COMMENTS_KEY);
        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::spawn(start_with_cancel_token(repo, rx, CancellationToken::new()));

        let err = send(
            &tx,
            NewComment {
                comment: "orphan".into(),
                parent_id: Some("doesnotexist".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SubmitError::ParentNotFound(_)));

        // 发送端全部关闭后 worker 自行退出
        drop(tx);
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn abandoned_requests_are_not_written() {
        let store = open_store(StoreConfig::Memory).await.unwrap();
        let repo = CommentRepo::new(store, DEFAULT_COMMENTS_KEY);
        let (tx, rx) = mpsc::channel(4);

        // 调用方在 worker 取到命令前就放弃了
        let (resp, gone) = oneshot::channel();
        drop(gone);
        tx.send(CommandEnvelope {
            cmd: AppCommand::SubmitComment(top("abandoned")),
            resp,
        })
        .await
        .unwrap();

        let worker = tokio::spawn(start_with_cancel_token(
            repo.clone(),
            rx,
            CancellationToken::new(),
        ));
        let kept = send(&tx, top("kept")).await.unwrap();

        let all = repo.fetch_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, kept.id);

        drop(tx);
        worker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn opens_file_store() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("blobs");
        let store = open_store(StoreConfig::File { dir: dir.clone() }).await.unwrap();
        let repo = CommentRepo::new(store, DEFAULT_COMMENTS_KEY);
        repo.submit(top("on disk")).await.unwrap();
        assert!(dir.join(DEFAULT_COMMENTS_KEY).exists());
    }
}
