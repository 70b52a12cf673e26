pub mod broadcast;
pub mod clock;
pub mod config;
pub mod control;
pub mod detect;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod parse;
pub mod persist;
pub mod pipeline;
pub mod registry;
pub mod remote;
pub mod sanitize;

pub use broadcast::{JobProgressEvent, ProgressBroadcaster};
pub use clock::{InstantSleeper, Sleeper, TokioSleeper};
pub use config::{Identity, OrchestratorConfig};
pub use control::ControlState;
pub use detect::{detect, FileKind, ACCEPTED_EXTENSIONS};
pub use error::{
    ConveyorError, Interrupt, ParseError, PersistError, PipelineError, RemoteError, Result,
};
pub use job::{JobStatus, SourceFile, UploadJob};
pub use orchestrator::{Collaborators, Orchestrator};
pub use persist::{
    default_snapshot_dir, JsonSnapshotStore, MemorySnapshotStore, PersistedJobRecord,
    SnapshotStore,
};
pub use registry::JobRegistry;
