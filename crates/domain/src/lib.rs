mod commands;
mod models;
pub mod presenter;
pub mod projection;
pub mod tree;

pub use commands::AppCommand;
pub use models::{
    generate_id, Collection, Comment, CommentError, NewComment, ValidComment, ANONYMOUS,
    MAX_RATING,
};
pub use projection::{FlatEntry, Projection, TreeNode, Viewport};
pub use tree::InsertError;
