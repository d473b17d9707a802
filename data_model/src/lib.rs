use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use strum::{AsRefStr, Display as StrumDisplay};

/// A row from the lookup table: one object tagged for bundling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LookupRecord {
    pub id: String,
    pub tag: String,
    /// Object store reference, either a full URI or a key relative to the
    /// configured storage root.
    pub object_ref: String,
}

impl LookupRecord {
    pub fn new(id: impl Into<String>, tag: impl Into<String>, object_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            object_ref: object_ref.into(),
        }
    }

    /// Final path segment of the object reference, if it names a file.
    pub fn basename(&self) -> Option<&str> {
        let trimmed = self.object_ref.trim_end_matches('/');
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        match name {
            "" | "." | ".." => None,
            name => Some(name),
        }
    }
}

impl Display for LookupRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.object_ref)
    }
}

/// One entry inside a published archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub size_bytes: u64,
}

/// Time-limited read capability for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// What was published for a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub name: String,
    pub uri: String,
    pub size_bytes: u64,
    pub manifest: Vec<ManifestEntry>,
}

/// Pipeline stage a run was in when it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, AsRefStr)]
pub enum Stage {
    Querying,
    Fetching,
    Archiving,
    Publishing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, StrumDisplay, AsRefStr)]
pub enum ErrorKind {
    IndexUnavailable,
    MalformedRecord,
    ObjectNotFound,
    ObjectStoreError,
    StagingError,
    EmptyArchiveError,
    ArchiveError,
    PublishError,
    SigningError,
    /// Informational: some records were skipped in an otherwise published run.
    PartialFetchFailure,
    Cancelled,
    Internal,
}

/// A record whose blob could not be staged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailure {
    pub object_ref: String,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// Result of one orchestration run, handed to the trigger layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Published {
        grant: AccessGrant,
        /// Absent when an existing object was shared without bundling.
        artifact: Option<ArtifactSummary>,
        partial_failures: Vec<FetchFailure>,
    },
    NoItems,
    Failed {
        stage: Stage,
        error_kind: ErrorKind,
        message: String,
    },
}

impl RunOutcome {
    pub fn failed(stage: Stage, error_kind: ErrorKind, message: impl Into<String>) -> Self {
        RunOutcome::Failed {
            stage,
            error_kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            RunOutcome::Published { grant, .. } => Some(&grant.url),
            _ => None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeBody<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<&'a DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<&'a ArtifactSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    partial_failures: Option<&'a [FetchFailure]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

impl<'a> OutcomeBody<'a> {
    fn empty(success: bool) -> Self {
        Self {
            success,
            url: None,
            expires_at: None,
            artifact: None,
            partial_failures: None,
            no_items: None,
            stage: None,
            error_kind: None,
            message: None,
        }
    }
}

impl Serialize for RunOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            RunOutcome::Published {
                grant,
                artifact,
                partial_failures,
            } => OutcomeBody {
                url: Some(&grant.url),
                expires_at: Some(&grant.expires_at),
                artifact: artifact.as_ref(),
                partial_failures: (!partial_failures.is_empty())
                    .then_some(partial_failures.as_slice()),
                ..OutcomeBody::empty(true)
            },
            RunOutcome::NoItems => OutcomeBody {
                no_items: Some(true),
                ..OutcomeBody::empty(true)
            },
            RunOutcome::Failed {
                stage,
                error_kind,
                message,
            } => OutcomeBody {
                stage: Some(*stage),
                error_kind: Some(*error_kind),
                message: Some(message),
                ..OutcomeBody::empty(false)
            },
        };
        body.serialize(serializer)
    }
}
