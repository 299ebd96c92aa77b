use adapter::CommandEnvelope;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{projection::to_flat_pre_order, AppCommand, Comment, NewComment};
use serde::Deserialize;
use storage::{CommentRepo, SubmitError};
use tokio::sync::oneshot;

use crate::state::AppState;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.to_string() })))
}

#[derive(Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Tree,
    Flat,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub view: View,
}

/// 读失败时仓库已经降级为空列表，这里永远返回 200
pub async fn list_comments(
    State(repo): State<CommentRepo>,
    Query(query): Query<ListQuery>,
) -> Response {
    let comments = repo.fetch_all().await;
    match query.view {
        View::Tree => Json(comments).into_response(),
        View::Flat => Json(to_flat_pre_order(&comments)).into_response(),
    }
}

pub async fn post_comment(
    State(state): State<AppState>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> Result<Json<Comment>, ApiError> {
    let Json(payload) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;

    let (tx, rx) = oneshot::channel();
    let envelope = CommandEnvelope {
        cmd: AppCommand::SubmitComment(payload),
        resp: tx,
    };

    state.sender.send(envelope).await.map_err(|_| {
        api_error(StatusCode::SERVICE_UNAVAILABLE, "Comment writer is not running")
    })?;

    match tokio::time::timeout(state.submit_timeout, rx).await {
        Ok(Ok(Ok(comment))) => Ok(Json(comment)),
        Ok(Ok(Err(e))) => Err(submit_error(e)),
        Ok(Err(_)) => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Comment writer dropped the request",
        )),
        // worker 仍可能在之后写入成功
        Err(_) => Err(api_error(
            StatusCode::GATEWAY_TIMEOUT,
            "Timed out waiting for the comment store; the comment may or may not have been saved",
        )),
    }
}

fn submit_error(e: SubmitError) -> ApiError {
    match e {
        SubmitError::Invalid(e) => api_error(StatusCode::BAD_REQUEST, e),
        SubmitError::ParentNotFound(_) => api_error(StatusCode::NOT_FOUND, e),
        // 存储细节只写日志，不暴露给访客
        SubmitError::Serialize(_) | SubmitError::Storage(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save comment")
        }
    }
}
