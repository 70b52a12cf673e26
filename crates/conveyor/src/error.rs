use std::path::PathBuf;
use thiserror::Error;

/// Control-flow sentinel observed at pipeline checkpoints.
///
/// Not a user-facing failure: a pipeline that unwinds with one of these
/// settles the job silently (cancelled or paused) instead of reporting an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    Paused,
}

#[derive(Error, Debug)]
pub enum ConveyorError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Failures reported by external collaborators (blob storage, remote
/// functions, record stores). The message is whatever the remote surfaced.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Upload of '{path}' failed: {message}")]
    Upload { path: String, message: String },

    #[error("Remote function '{name}' failed: {message}")]
    Function { name: String, message: String },

    #[error("Record store operation failed: {0}")]
    Record(String),

    #[error("Taxonomy store operation failed: {0}")]
    Taxonomy(String),

    #[error("Malformed remote response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Input is not valid UTF-8")]
    NotUtf8,

    #[error("CSV input has no header row")]
    EmptyCsv,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object or array of objects, found {0}")]
    UnexpectedJsonShape(String),

    #[error("Failed to open workbook: {0}")]
    Workbook(String),

    #[error("Workbook contains no worksheet")]
    MissingWorksheet,
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to create snapshot directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why a single pipeline run did not reach success.
///
/// `Interrupted` is control flow, not failure — the dispatch handler matches
/// it first and settles the job without an error message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("interrupted")]
    Interrupted(Interrupt),

    #[error("No organization/store identity is bound")]
    MissingIdentity,

    #[error("Unsupported file type")]
    UnsupportedType,

    #[error("Source bytes are no longer available")]
    MissingBytes,

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Remote processing failed: {0}")]
    RemoteReported(String),

    #[error("Gave up waiting for remote processing after {attempts} attempts")]
    PollTimeout { attempts: u32 },
}

impl From<Interrupt> for PipelineError {
    fn from(interrupt: Interrupt) -> Self {
        PipelineError::Interrupted(interrupt)
    }
}

pub type Result<T> = std::result::Result<T, ConveyorError>;
