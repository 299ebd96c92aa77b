mod blobs;
pub mod comments;
