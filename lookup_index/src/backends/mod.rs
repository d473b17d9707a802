pub mod file;

#[cfg(feature = "aws")]
pub mod dynamodb;
