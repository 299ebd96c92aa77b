use crate::models::NewComment;

#[derive(Debug)]
pub enum AppCommand {
    SubmitComment(NewComment),
}
