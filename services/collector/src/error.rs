use thiserror::Error;

/// Low-level failure while talking to one of the origins.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("No download URL received from API")]
    MissingDownloadUrl,
    #[error("unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// What a fail-loud fetch was after, for user-facing messages.
#[derive(Debug, Clone, Copy)]
pub struct Subject {
    /// Service named in connectivity messages
    pub origin: &'static str,
    /// Sentence-initial form, e.g. "Status details bestand"
    pub title: &'static str,
    /// Inline form, e.g. "status details bestand"
    pub noun: &'static str,
}

pub const STATUS_DETAILS: Subject = Subject {
    origin: "S3",
    title: "Status details bestand",
    noun: "status details bestand",
};

pub const VALIDATIELIJST: Subject = Subject {
    origin: "GitHub",
    title: "Validatielijst bestand",
    noun: "validatielijst bestand",
};

/// Failure as shown to dashboard users.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Kan geen verbinding maken met {origin}. Controleer de netwerkverbinding.")]
    Connectivity {
        origin: &'static str,
        #[source]
        source: FetchError,
    },
    #[error("{title} niet gevonden voor: {name}")]
    NotFound { title: &'static str, name: String },
    #[error("Geen toegang tot het {noun}. Controleer de permissies.")]
    AccessDenied { noun: &'static str },
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl SourceError {
    /// Map network failures, 404 and 403 onto user-facing messages; pass the rest through.
    pub fn translate(err: FetchError, subject: Subject, name: &str) -> Self {
        match err {
            FetchError::Network { .. } => SourceError::Connectivity {
                origin: subject.origin,
                source: err,
            },
            FetchError::Status { status: 404, .. } => SourceError::NotFound {
                title: subject.title,
                name: name.to_string(),
            },
            FetchError::Status { status: 403, .. } => SourceError::AccessDenied { noun: subject.noun },
            other => SourceError::Fetch(other),
        }
    }
}
