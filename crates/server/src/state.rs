use adapter::CommandEnvelope;
use axum::extract::FromRef;
use std::time::Duration;
use storage::CommentRepo;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    // 读路径直接走仓库，写路径经由 worker 串行化
    pub repo: CommentRepo,
    pub sender: mpsc::Sender<CommandEnvelope>,
    pub submit_timeout: Duration,
}

impl FromRef<AppState> for CommentRepo {
    fn from_ref(state: &AppState) -> Self {
        state.repo.clone()
    }
}
