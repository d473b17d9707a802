//! Blob store backend implementations.

pub mod local;

#[cfg(feature = "aws")]
pub mod s3;
