use std::fmt;

use blob_store::BlobError;
use data_model::ErrorKind;
use lookup_index::LookupError;

pub type BundleResult<T> = Result<T, BundleError>;

/// Failures of the bundling pipeline. Each maps onto one [`ErrorKind`].
#[derive(Debug)]
pub enum BundleError {
    Index(LookupError),

    /// The referenced object does not exist.
    ObjectNotFound { object_ref: String, source: BlobError },

    /// The object store failed while reading an object.
    ObjectStore { object_ref: String, source: BlobError },

    /// Local staging storage could not be created or written.
    Staging { source: std::io::Error },

    /// Nothing was staged, so there is nothing to archive.
    EmptyArchive,

    Archive { source: anyhow::Error },

    /// The artifact could not be stored, or its presence not confirmed.
    Publish { uri: String, source: BlobError },

    /// An access URL could not be minted for a stored object.
    Signing { uri: String, source: BlobError },

    Cancelled,
}

impl BundleError {
    /// Classify an object store read failure.
    pub fn from_read(object_ref: &str, source: BlobError) -> Self {
        if source.is_not_found() {
            BundleError::ObjectNotFound {
                object_ref: object_ref.to_string(),
                source,
            }
        } else {
            BundleError::ObjectStore {
                object_ref: object_ref.to_string(),
                source,
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BundleError::Index(LookupError::Unavailable { .. }) => ErrorKind::IndexUnavailable,
            BundleError::Index(LookupError::MalformedRecord { .. }) => ErrorKind::MalformedRecord,
            BundleError::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            BundleError::ObjectStore { .. } => ErrorKind::ObjectStoreError,
            BundleError::Staging { .. } => ErrorKind::StagingError,
            BundleError::EmptyArchive => ErrorKind::EmptyArchiveError,
            BundleError::Archive { .. } => ErrorKind::ArchiveError,
            BundleError::Publish { .. } => ErrorKind::PublishError,
            BundleError::Signing { .. } => ErrorKind::SigningError,
            BundleError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleError::Index(e) => write!(f, "{}", e),
            BundleError::ObjectNotFound { object_ref, .. } => {
                write!(f, "object {} not found", object_ref)
            }
            BundleError::ObjectStore { object_ref, source } => {
                write!(f, "failed to fetch {}: {}", object_ref, source)
            }
            BundleError::Staging { source } => write!(f, "staging error: {}", source),
            BundleError::EmptyArchive => write!(f, "no staged objects to archive"),
            BundleError::Archive { source } => write!(f, "failed to build archive: {:#}", source),
            BundleError::Publish { uri, source } => {
                write!(f, "failed to publish {}: {}", uri, source)
            }
            BundleError::Signing { uri, source } => {
                write!(f, "failed to mint access url for {}: {}", uri, source)
            }
            BundleError::Cancelled => write!(f, "run cancelled"),
        }
    }
}

impl std::error::Error for BundleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BundleError::Index(e) => Some(e),
            BundleError::ObjectNotFound { source, .. }
            | BundleError::ObjectStore { source, .. }
            | BundleError::Publish { source, .. }
            | BundleError::Signing { source, .. } => Some(source),
            BundleError::Staging { source } => Some(source),
            BundleError::Archive { source } => Some(source.as_ref()),
            BundleError::EmptyArchive | BundleError::Cancelled => None,
        }
    }
}

impl From<LookupError> for BundleError {
    fn from(err: LookupError) -> Self {
        BundleError::Index(err)
    }
}

impl From<zip::result::ZipError> for BundleError {
    fn from(err: zip::result::ZipError) -> Self {
        BundleError::Archive {
            source: anyhow::Error::from(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_errors_are_classified() {
        let err = BundleError::from_read(
            "a.pdf",
            BlobError::NotFound {
                uri: "mem://a.pdf".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::ObjectNotFound);

        let err = BundleError::from_read(
            "a.pdf",
            BlobError::NetworkError {
                source: anyhow::anyhow!("reset"),
            },
        );
        assert_eq!(err.kind(), ErrorKind::ObjectStoreError);
        assert_eq!(err.to_string(), "failed to fetch a.pdf: Network error: reset");
    }
}
