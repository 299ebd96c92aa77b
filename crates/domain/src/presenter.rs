use std::collections::HashMap;

use thiserror::Error;

use crate::models::{Collection, CommentError, NewComment, MAX_RATING};
use crate::projection::{Projection, Viewport};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load comments.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded(Collection),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentForm {
    pub author: String,
    pub body: String,
    /// 0 表示未评分
    pub rating: u8,
    pub parent_id: Option<String>,
}

impl CommentForm {
    pub fn reply_to(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Default::default()
        }
    }

    pub fn to_request(&self) -> NewComment {
        let author = self.author.trim();
        NewComment {
            name: (!author.is_empty()).then(|| author.to_string()),
            comment: self.body.trim().to_string(),
            rating: (self.rating > 0).then_some(self.rating),
            parent_id: self.parent_id.clone(),
        }
    }

    fn clear(&mut self) {
        self.author.clear();
        self.body.clear();
        self.rating = 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error(transparent)]
    Invalid(#[from] CommentError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
}

/// idle → submitting → idle。成功清空表单，失败保留表单和错误信息。
#[derive(Debug, Clone, Default)]
pub struct SubmissionWidget {
    pub form: CommentForm,
    phase: Phase,
    error: Option<String>,
}

impl SubmissionWidget {
    pub fn new(form: CommentForm) -> Self {
        Self {
            form,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin(&mut self) -> Result<NewComment, FormError> {
        if self.phase == Phase::Submitting {
            return Err(FormError::AlreadySubmitting);
        }
        if self.form.body.trim().is_empty() {
            return Err(CommentError::EmptyBody.into());
        }
        if self.form.rating > MAX_RATING {
            return Err(CommentError::RatingOutOfRange(self.form.rating).into());
        }
        self.phase = Phase::Submitting;
        self.error = None;
        Ok(self.form.to_request())
    }

    pub fn succeed(&mut self) {
        self.phase = Phase::Idle;
        self.error = None;
        self.form.clear();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = Phase::Idle;
        self.error = Some(message.into());
    }
}

/// 每条评论下可展开的内联回复表单
#[derive(Debug, Default)]
pub struct ReplyToggles {
    open: HashMap<String, SubmissionWidget>,
}

impl ReplyToggles {
    /// 返回切换后该表单是否处于展开状态
    pub fn toggle(&mut self, comment_id: &str) -> bool {
        if self.open.remove(comment_id).is_some() {
            return false;
        }
        self.open.insert(
            comment_id.to_string(),
            SubmissionWidget::new(CommentForm::reply_to(comment_id)),
        );
        true
    }

    pub fn is_open(&self, comment_id: &str) -> bool {
        self.open.contains_key(comment_id)
    }

    pub fn widget_mut(&mut self, comment_id: &str) -> Option<&mut SubmissionWidget> {
        self.open.get_mut(comment_id)
    }
}

#[derive(Debug)]
pub struct Presenter {
    pub load: LoadState,
    pub composer: SubmissionWidget,
    pub replies: ReplyToggles,
    viewport: Viewport,
    breakpoint: u32,
}

impl Presenter {
    pub fn new(width: u32, breakpoint: u32) -> Self {
        Self {
            load: LoadState::Loading,
            composer: SubmissionWidget::default(),
            replies: ReplyToggles::default(),
            viewport: Viewport::classify(width, breakpoint),
            breakpoint,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn on_resize(&mut self, width: u32) {
        self.viewport = Viewport::classify(width, self.breakpoint);
    }

    /// 刷新时重新进入 loading；没有乐观插入，提交成功后必须重新拉取。
    pub fn reload(&mut self) {
        self.load = LoadState::Loading;
    }

    pub fn on_loaded<E>(&mut self, result: Result<Collection, E>) {
        self.load = match result {
            Ok(collection) => LoadState::Loaded(collection),
            Err(_) => LoadState::Failed(LOAD_FAILED_MESSAGE.to_string()),
        };
    }

    pub fn view(&self) -> Option<Projection> {
        match &self.load {
            LoadState::Loaded(collection) => {
                Some(Projection::for_viewport(collection, self.viewport))
            }
            _ => None,
        }
    }
}
