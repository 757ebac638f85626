//! runlog-core: modelo de eventos del ciclo de vida y parsers puros (sin I/O).
pub mod errors;
pub mod event;
pub mod status;

pub use errors::ParseError;
pub use event::{
    DebugDag, ErrorEvent, EventKind, EventRecord, GroupError, GroupInfo, JobError, JobFinished,
    JobInfo, JobStarted, Progress, ResourcesInfo, RuleGraph, RunEvent, RunInfo, ShellCmd,
    WorkflowStarted,
};
pub use status::{JobStatus, Status};
