use std::fmt;

pub type LookupResult<T> = Result<T, LookupError>;

#[derive(Debug)]
pub enum LookupError {
    /// The backing query could not be executed (network, service or I/O
    /// failure).
    Unavailable { source: anyhow::Error },

    /// A matching row is missing a required attribute.
    MalformedRecord { reason: String },
}

impl LookupError {
    pub fn unavailable(source: impl Into<anyhow::Error>) -> Self {
        LookupError::Unavailable {
            source: source.into(),
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::Unavailable { source } => {
                write!(f, "lookup index unavailable: {:#}", source)
            }
            LookupError::MalformedRecord { reason } => {
                write!(f, "malformed lookup record: {}", reason)
            }
        }
    }
}

impl std::error::Error for LookupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LookupError::Unavailable { source } => Some(source.as_ref()),
            LookupError::MalformedRecord { .. } => None,
        }
    }
}
